use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::Rc,
};

use crate::Subscription;


/// Ordered callback registry.
///
/// Callbacks run in registration order. Each entry carries a closed flag that is
/// checked right before every call, so an entry removed while a notification is
/// in progress is never called again.
pub(crate) struct Listeners<T: ?Sized + 'static> {
    next_id: usize,
    entries: BTreeMap<usize, Rc<Listener<T>>>,
}

pub(crate) struct Listener<T: ?Sized + 'static> {
    f: Box<dyn Fn(&T)>,
    closed: Cell<bool>,
}
impl<T: ?Sized + 'static> Listener<T> {
    pub fn call(&self, value: &T) {
        if !self.closed.get() {
            (self.f)(value)
        }
    }
}

impl<T: ?Sized + 'static> Listeners<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: BTreeMap::new(),
        }
    }
    pub fn insert(&mut self, f: impl Fn(&T) + 'static) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            id,
            Rc::new(Listener {
                f: Box::new(f),
                closed: Cell::new(false),
            }),
        );
        id
    }

    /// Close and remove an entry.
    ///
    /// The removed entry is returned so that the caller can drop it after releasing its borrow.
    #[must_use]
    pub fn remove(&mut self, id: usize) -> Option<Rc<Listener<T>>> {
        let entry = self.entries.remove(&id)?;
        entry.closed.set(true);
        Some(entry)
    }

    #[must_use]
    pub fn clear(&mut self) -> Vec<Rc<Listener<T>>> {
        let entries: Vec<_> = std::mem::take(&mut self.entries).into_values().collect();
        for entry in &entries {
            entry.closed.set(true);
        }
        entries
    }
    pub fn get(&self, id: usize) -> Option<Rc<Listener<T>>> {
        self.entries.get(&id).cloned()
    }
    pub fn snapshot(&self) -> Vec<Rc<Listener<T>>> {
        self.entries.values().cloned().collect()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

pub(crate) type SharedListeners<T> = Rc<RefCell<Listeners<T>>>;

pub(crate) fn new_shared<T: ?Sized + 'static>() -> SharedListeners<T> {
    Rc::new(RefCell::new(Listeners::new()))
}

/// Call every registered callback with `value`.
///
/// The registry is not borrowed while callbacks run, so a callback may subscribe or unsubscribe.
pub(crate) fn notify<T: ?Sized + 'static>(listeners: &RefCell<Listeners<T>>, value: &T) {
    let entries = listeners.borrow().snapshot();
    for entry in entries {
        entry.call(value);
    }
}

pub(crate) fn subscription<T: ?Sized + 'static>(
    listeners: &SharedListeners<T>,
    id: usize,
) -> Subscription {
    Subscription::from_weak_fn(Rc::downgrade(listeners), move |this| {
        let entry = this.borrow_mut().remove(id);
        drop(entry);
    })
}
