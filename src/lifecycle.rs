//! Binding asynchronous producers to the lifetime of a consumer.
//!
//! Two ways of ending delivery are supported and behave the same from the consumer's side:
//!
//! - explicit handle: [`Producer::subscribe`] returns a [`Subscription`] that the consumer
//!   unsubscribes (or drops) at the end of its life.
//! - termination signal: the consumer owns a [`Lifetime`] and passes its [`Termination`] to
//!   [`Producer::subscribe_until`] or [`Termination::guard`]. Delivery stops for good once the
//!   lifetime ends.
//!
//! Either way, ending is idempotent and nothing is delivered after it, even if the producer
//! keeps emitting.
use std::{
    cell::{Cell, RefCell},
    future::{poll_fn, Future},
    mem::take,
    rc::Rc,
    task::{Poll, Waker},
};

use derive_ex::derive_ex;
use futures::pin_mut;
use slabmap::SlabMap;

use crate::{
    core::spawn_local,
    listeners::{self, SharedListeners},
    Subscription,
};


/// Token representing "this consumer is still alive".
///
/// Owned by exactly one consumer. Terminating it, explicitly or by dropping it, is the single
/// signal that ends every registration bound to its [`Termination`].
#[must_use]
pub struct Lifetime(Rc<TerminationNode>);

impl Lifetime {
    pub fn new() -> Self {
        Self(Rc::new(TerminationNode {
            is_fired: Cell::new(false),
            callbacks: listeners::new_shared(),
            wakers: RefCell::new(SlabMap::new()),
            held: RefCell::new(Vec::new()),
        }))
    }

    /// Returns a read-only view of this lifetime's end.
    pub fn signal(&self) -> Termination {
        Termination(self.0.clone())
    }

    /// End this lifetime.
    ///
    /// Terminating an already terminated lifetime does nothing.
    pub fn terminate(&self) {
        self.0.fire();
    }

    pub fn is_terminated(&self) -> bool {
        self.0.is_fired.get()
    }

    /// End `subscription` together with this lifetime.
    ///
    /// If the lifetime has already ended, `subscription` ends immediately.
    pub fn hold(&self, subscription: Subscription) {
        if self.is_terminated() {
            drop(subscription);
        } else {
            self.0.held.borrow_mut().push(subscription);
        }
    }
}
impl Default for Lifetime {
    fn default() -> Self {
        Self::new()
    }
}
impl Drop for Lifetime {
    fn drop(&mut self) {
        self.0.fire();
    }
}
impl std::fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifetime")
            .field("is_terminated", &self.is_terminated())
            .finish()
    }
}

/// One-shot signal fired when a [`Lifetime`] ends.
#[derive(Clone)]
pub struct Termination(Rc<TerminationNode>);

impl Termination {
    pub fn is_fired(&self) -> bool {
        self.0.is_fired.get()
    }

    /// Call `f` once when the signal fires.
    ///
    /// If the signal has already fired, `f` is called immediately.
    pub fn on_fire(&self, f: impl FnOnce() + 'static) -> Subscription {
        if self.is_fired() {
            f();
            return Subscription::empty();
        }
        let f = RefCell::new(Some(f));
        let id = self.0.callbacks.borrow_mut().insert(move |_| {
            let f = f.borrow_mut().take();
            if let Some(f) = f {
                f()
            }
        });
        listeners::subscription(&self.0.callbacks, id)
    }

    /// Completes when the signal fires.
    pub async fn fired(&self) {
        let mut key = WakerKeyGuard::new(self);
        poll_fn(|cx| {
            if self.is_fired() {
                return Poll::Ready(());
            }
            let mut wakers = self.0.wakers.borrow_mut();
            if let Some(key) = key.key {
                wakers[key].clone_from(cx.waker());
            } else {
                key.key = Some(wakers.insert(cx.waker().clone()));
            }
            Poll::Pending
        })
        .await
    }

    /// Run `fut` until it completes or the signal fires, whichever comes first.
    ///
    /// Returns `None` if the signal fired first. The signal is checked before `fut` on every
    /// poll, so a value produced after termination is never returned.
    pub async fn guard<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        let fired = self.fired();
        pin_mut!(fut);
        pin_mut!(fired);
        poll_fn(|cx| {
            if fired.as_mut().poll(cx).is_ready() {
                return Poll::Ready(None);
            }
            fut.as_mut().poll(cx).map(Some)
        })
        .await
    }
}
impl std::fmt::Debug for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Termination")
            .field("is_fired", &self.is_fired())
            .finish()
    }
}

struct TerminationNode {
    is_fired: Cell<bool>,
    callbacks: SharedListeners<()>,
    wakers: RefCell<SlabMap<Waker>>,
    held: RefCell<Vec<Subscription>>,
}
impl TerminationNode {
    fn fire(&self) {
        if self.is_fired.replace(true) {
            return;
        }
        tracing::trace!("lifetime terminated");
        let wakers = take(&mut *self.wakers.borrow_mut());
        for (_, waker) in wakers {
            waker.wake();
        }
        listeners::notify(&self.callbacks, &());
        let entries = self.callbacks.borrow_mut().clear();
        drop(entries);
        let held = take(&mut *self.held.borrow_mut());
        drop(held);
    }
}

struct WakerKeyGuard<'a> {
    termination: &'a Termination,
    key: Option<usize>,
}
impl<'a> WakerKeyGuard<'a> {
    fn new(termination: &'a Termination) -> Self {
        Self {
            termination,
            key: None,
        }
    }
}
impl Drop for WakerKeyGuard<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key {
            self.termination.0.wakers.borrow_mut().remove(key);
        }
    }
}

/// A notification pushed by a [`Producer`].
///
/// `Error` and `Complete` are terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification<T> {
    Next(T),
    Error(String),
    Complete,
}
impl<T> Notification<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Next(_))
    }
}

/// Hot push-based notification source shared by any number of subscribers.
#[derive_ex(Clone, bound())]
pub struct Producer<T: 'static>(Rc<ProducerNode<T>>);

struct ProducerNode<T: 'static> {
    listeners: SharedListeners<Notification<T>>,
    is_finished: Cell<bool>,
    until: RefCell<SlabMap<Subscription>>,
}

impl<T: 'static> Producer<T> {
    pub fn new() -> Self {
        Self(Rc::new(ProducerNode {
            listeners: listeners::new_shared(),
            is_finished: Cell::new(false),
            until: RefCell::new(SlabMap::new()),
        }))
    }

    /// Create a producer that emits the outcome of `fut` once and then finishes.
    ///
    /// `fut` is spawned on the current [`Runtime`](crate::core::Runtime) and keeps running even
    /// if every subscriber has left; its outcome is then discarded.
    pub fn from_future<E: std::fmt::Display>(
        fut: impl Future<Output = Result<T, E>> + 'static,
    ) -> Self {
        let this = Self::new();
        let node = Rc::downgrade(&this.0);
        spawn_local(async move {
            let result = fut.await;
            if let Some(node) = node.upgrade() {
                let this = Producer(node);
                match result {
                    Ok(value) => {
                        this.emit(value);
                        this.complete();
                    }
                    Err(e) => this.fail(e.to_string()),
                }
            }
        });
        this
    }

    pub fn emit(&self, value: T) {
        self.push(Notification::Next(value));
    }
    pub fn fail(&self, message: impl Into<String>) {
        self.push(Notification::Error(message.into()));
    }
    pub fn complete(&self) {
        self.push(Notification::Complete);
    }

    fn push(&self, n: Notification<T>) {
        if self.0.is_finished.get() {
            return;
        }
        let is_terminal = n.is_terminal();
        if is_terminal {
            self.0.is_finished.set(true);
        }
        listeners::notify(&self.0.listeners, &n);
        if is_terminal {
            let entries = self.0.listeners.borrow_mut().clear();
            drop(entries);
            let until = take(&mut *self.0.until.borrow_mut());
            drop(until);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.0.is_finished.get()
    }
    pub fn subscriber_count(&self) -> usize {
        self.0.listeners.borrow().len()
    }

    /// Subscribe with an explicit handle.
    ///
    /// Nothing is delivered once the returned [`Subscription`] has ended.
    pub fn subscribe(&self, f: impl Fn(&Notification<T>) + 'static) -> Subscription {
        if self.is_finished() {
            return Subscription::empty();
        }
        let id = self.0.listeners.borrow_mut().insert(f);
        listeners::subscription(&self.0.listeners, id)
    }

    /// Subscribe until `until` fires.
    ///
    /// The registration on `until` is released as soon as either side ends.
    pub fn subscribe_until(&self, f: impl Fn(&Notification<T>) + 'static, until: &Termination) {
        if until.is_fired() {
            return;
        }
        let s = self.subscribe(f);
        if s.is_closed() {
            return;
        }
        let node = Rc::downgrade(&self.0);
        let key = Rc::new(Cell::new(None));
        let on_fire = until.on_fire({
            let key = key.clone();
            move || {
                drop(s);
                if let (Some(node), Some(key)) = (node.upgrade(), key.get()) {
                    let on_fire = node.until.borrow_mut().remove(key);
                    drop(on_fire);
                }
            }
        });
        key.set(Some(self.0.until.borrow_mut().insert(on_fire)));
    }
}
impl<T: 'static> Default for Producer<T> {
    fn default() -> Self {
        Self::new()
    }
}
