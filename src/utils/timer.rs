use std::{
    collections::BTreeMap,
    future::Future,
    pin::Pin,
    sync::{Condvar, LazyLock, Mutex, MutexGuard},
    task::{Context, Poll, Waker},
    time::{Duration, Instant},
};

use slabmap::SlabMap;

#[cfg(test)]
mod tests;

static SLEEP_REGISTRY: LazyLock<SleepRegistry> = LazyLock::new(|| SleepRegistry {
    queue: Mutex::new(SleepQueue::new()),
    condvar: Condvar::new(),
});

struct SleepRegistry {
    queue: Mutex<SleepQueue>,
    condvar: Condvar,
}
impl SleepRegistry {
    fn lock(&self) -> MutexGuard<'_, SleepQueue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
    fn run_worker(&self) {
        let mut wakes = Vec::new();
        let mut queue = self.lock();
        loop {
            let now = Instant::now();
            queue.take_expired(now, &mut wakes);
            if !wakes.is_empty() {
                drop(queue);
                for waker in wakes.drain(..) {
                    waker.wake();
                }
                queue = self.lock();
                continue;
            }
            queue = match queue.deadlines.first_key_value() {
                Some((&(instant, _), _)) => {
                    let wait = instant.saturating_duration_since(now);
                    self.condvar
                        .wait_timeout(queue, wait)
                        .unwrap_or_else(|e| e.into_inner())
                        .0
                }
                None => self
                    .condvar
                    .wait(queue)
                    .unwrap_or_else(|e| e.into_inner()),
            };
        }
    }
}

struct SleepQueue {
    next_seq: u64,
    deadlines: BTreeMap<(Instant, u64), usize>,
    entries: SlabMap<Entry>,
    thread_running: bool,
}

struct Entry {
    waker: Option<Waker>,
    deadline: (Instant, u64),
    is_expired: bool,
}

impl SleepQueue {
    fn new() -> Self {
        Self {
            next_seq: 0,
            deadlines: BTreeMap::new(),
            entries: SlabMap::new(),
            thread_running: false,
        }
    }
    fn insert(&mut self, instant: Instant, condvar: &Condvar) -> usize {
        if !self.thread_running {
            self.thread_running = true;
            std::thread::spawn(|| SLEEP_REGISTRY.run_worker());
        }
        let deadline = (instant, self.next_seq);
        self.next_seq += 1;
        let is_first = self
            .deadlines
            .first_key_value()
            .is_none_or(|(first, _)| deadline < *first);
        let id = self.entries.insert(Entry {
            waker: None,
            deadline,
            is_expired: false,
        });
        self.deadlines.insert(deadline, id);
        if is_first {
            condvar.notify_one();
        }
        id
    }
    fn take_expired(&mut self, now: Instant, wakes: &mut Vec<Waker>) {
        while let Some(entry) = self.deadlines.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let id = entry.remove();
            let e = &mut self.entries[id];
            e.is_expired = true;
            wakes.extend(e.waker.take());
        }
    }
    fn poll(&mut self, id: usize, cx: &Context) -> Poll<()> {
        let e = &mut self.entries[id];
        if e.is_expired {
            Poll::Ready(())
        } else {
            match &mut e.waker {
                Some(waker) => waker.clone_from(cx.waker()),
                None => e.waker = Some(cx.waker().clone()),
            }
            Poll::Pending
        }
    }
    fn remove(&mut self, id: usize) {
        if let Some(e) = self.entries.remove(id) {
            self.deadlines.remove(&e.deadline);
        }
    }
}

struct Sleep {
    id: Option<usize>,
}

impl Future for Sleep {
    type Output = ();
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(id) = this.id else {
            return Poll::Ready(());
        };
        let poll = SLEEP_REGISTRY.lock().poll(id, cx);
        if poll.is_ready() {
            SLEEP_REGISTRY.lock().remove(id);
            this.id = None;
        }
        poll
    }
}
impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            SLEEP_REGISTRY.lock().remove(id);
        }
    }
}

/// Completes after `duration` has elapsed.
///
/// Deadlines are tracked by a single background thread, so this works on any executor.
pub async fn sleep(duration: Duration) {
    if duration > Duration::ZERO {
        let instant = Instant::now() + duration;
        let id = SLEEP_REGISTRY
            .lock()
            .insert(instant, &SLEEP_REGISTRY.condvar);
        Sleep { id: Some(id) }.await
    }
}
