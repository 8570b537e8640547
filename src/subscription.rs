use std::{
    mem::{forget, take},
    rc::{Rc, Weak},
};

#[cfg(test)]
mod tests;

/// Handle that ends a registration when it is unsubscribed or dropped.
///
/// Ending is idempotent: the teardown runs at most once, whichever of
/// [`unsubscribe`](Self::unsubscribe) or `drop` comes first.
#[derive(Default)]
#[must_use]
pub struct Subscription(RawSubscription);

impl Subscription {
    pub fn empty() -> Self {
        Subscription(RawSubscription::Empty)
    }
    pub fn from_fn(f: impl FnOnce() + 'static) -> Self {
        Subscription(RawSubscription::Fn(Box::new(f)))
    }
    pub fn from_weak_fn<T: 'static>(
        this: Weak<T>,
        unsubscribe: impl Fn(Rc<T>) + Copy + 'static,
    ) -> Self {
        Subscription(RawSubscription::Fn(Box::new(move || {
            if let Some(this) = this.upgrade() {
                unsubscribe(this)
            }
        })))
    }

    /// End the registration now.
    ///
    /// Calling this on an already ended subscription does nothing.
    pub fn unsubscribe(&mut self) {
        match take(&mut self.0) {
            RawSubscription::Empty => {}
            RawSubscription::Fn(f) => f(),
            RawSubscription::Many(subs) => drop(subs),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.0, RawSubscription::Empty)
    }

    /// Keep the registration alive for as long as its source lives.
    ///
    /// The teardown never runs, and everything it owns is kept alive.
    pub fn detach(mut self) {
        match take(&mut self.0) {
            RawSubscription::Empty => {}
            RawSubscription::Fn(f) => forget(f),
            RawSubscription::Many(subs) => subs.into_iter().for_each(Subscription::detach),
        }
    }
}
impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
impl FromIterator<Subscription> for Subscription {
    fn from_iter<I: IntoIterator<Item = Subscription>>(iter: I) -> Self {
        Subscription(RawSubscription::Many(iter.into_iter().collect()))
    }
}
impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_closed() {
            write!(f, "Subscription(<closed>)")
        } else {
            write!(f, "Subscription(<active>)")
        }
    }
}

#[derive(Default)]
enum RawSubscription {
    #[default]
    Empty,
    Fn(Box<dyn FnOnce() + 'static>),
    Many(Vec<Subscription>),
}
