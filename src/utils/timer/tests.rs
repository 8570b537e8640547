use std::{
    pin::pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::Wake,
    thread,
};

use super::*;

struct CountingWake {
    count: AtomicUsize,
}

impl CountingWake {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            count: AtomicUsize::new(0),
        })
    }
    fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Wake for CountingWake {
    fn wake(self: Arc<Self>) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

fn wait_until(timeout: Duration, mut f: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    f()
}

#[test]
fn sleep_completes_after_duration() {
    let start = Instant::now();
    futures::executor::block_on(sleep(Duration::from_millis(20)));
    assert!(start.elapsed() >= Duration::from_millis(20));
}

#[test]
fn zero_sleep_is_ready_immediately() {
    let mut fut = pin!(sleep(Duration::ZERO));
    let waker = Waker::from(CountingWake::new());
    let mut cx = Context::from_waker(&waker);
    assert!(fut.as_mut().poll(&mut cx).is_ready());
}

#[test]
fn wakes_latest_waker() {
    let mut fut = pin!(sleep(Duration::from_millis(30)));
    let first = CountingWake::new();
    let second = CountingWake::new();
    let w0 = Waker::from(first.clone());
    let w1 = Waker::from(second.clone());

    assert!(fut.as_mut().poll(&mut Context::from_waker(&w0)).is_pending());
    assert!(fut.as_mut().poll(&mut Context::from_waker(&w1)).is_pending());

    assert!(wait_until(Duration::from_millis(500), || second.count() >= 1));
    assert_eq!(first.count(), 0);
}

#[test]
fn dropped_sleep_is_never_woken() {
    let counter = CountingWake::new();
    {
        let mut fut = pin!(sleep(Duration::from_millis(10)));
        let w = Waker::from(counter.clone());
        assert!(fut.as_mut().poll(&mut Context::from_waker(&w)).is_pending());
    }
    thread::sleep(Duration::from_millis(50));
    assert_eq!(counter.count(), 0);
}
