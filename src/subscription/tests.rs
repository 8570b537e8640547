use super::*;
use assert_call::{CallRecorder, call};
use std::cell::Cell;

fn on_unsubscribe(rc: Rc<Cell<i32>>) {
    call!("{}", rc.get());
}

#[test]
fn from_fn_calls_on_drop() {
    let mut cr = CallRecorder::new();
    {
        let _s = Subscription::from_fn(|| call!("drop"));
    }
    cr.verify("drop");
}

#[test]
fn unsubscribe_is_idempotent() {
    let mut cr = CallRecorder::new();
    let mut s = Subscription::from_fn(|| call!("end"));
    assert!(!s.is_closed());
    s.unsubscribe();
    cr.verify("end");
    assert!(s.is_closed());

    s.unsubscribe();
    drop(s);
    cr.verify(());
}

#[test]
fn from_weak_fn_calls_when_alive() {
    let mut cr = CallRecorder::new();
    let rc = Rc::new(Cell::new(9));
    let weak = Rc::downgrade(&rc);
    {
        let _s = Subscription::from_weak_fn(weak, on_unsubscribe);
    }
    cr.verify("9");
}

#[test]
fn from_weak_fn_noop_when_dead() {
    let mut cr = CallRecorder::new();
    let rc = Rc::new(Cell::new(1));
    let weak = Rc::downgrade(&rc);
    drop(rc);
    {
        let _s = Subscription::from_weak_fn(weak, on_unsubscribe);
    }
    cr.verify(());
}

#[test]
fn detach_never_ends() {
    let mut cr = CallRecorder::new();
    Subscription::from_fn(|| call!("end")).detach();
    cr.verify(());
}

#[test]
fn detach_collected_never_ends_children() {
    let mut cr = CallRecorder::new();
    let s: Subscription = (0..2)
        .map(|i| Subscription::from_fn(move || call!("end {i}")))
        .collect();
    s.detach();
    cr.verify(());
}

#[test]
fn detach_keeps_owned_values_alive() {
    struct OnDrop;
    impl Drop for OnDrop {
        fn drop(&mut self) {
            call!("drop");
        }
    }

    let mut cr = CallRecorder::new();
    let owned = OnDrop;
    let s: Subscription = [
        Subscription::from_fn(move || drop(owned)),
        Subscription::empty(),
    ]
    .into_iter()
    .collect();
    s.detach();
    cr.verify(());
}

#[test]
fn collected_ends_all_in_order() {
    let mut cr = CallRecorder::new();
    let mut s: Subscription = (0..3)
        .map(|i| Subscription::from_fn(move || call!("end {i}")))
        .collect();
    cr.verify(());
    s.unsubscribe();
    cr.verify(["end 0", "end 1", "end 2"]);
}

#[test]
fn empty_is_closed() {
    assert!(Subscription::empty().is_closed());
    assert_eq!(format!("{:?}", Subscription::empty()), "Subscription(<closed>)");
    assert_eq!(
        format!("{:?}", Subscription::from_fn(|| {})),
        "Subscription(<active>)"
    );
}
