use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;

use crate::{
    listeners::{self, SharedListeners},
    Action, Reducer, Subscription,
};


/// Owner of one feature slice's state.
///
/// Every dispatched action is reduced synchronously, then state subscribers are notified in
/// subscription order, then the action is published on the [`ActionBus`] for effects.
#[derive_ex(Clone, bound())]
pub struct Store<R: Reducer>(Rc<StoreNode<R>>);

impl<R: Reducer> Store<R> {
    pub fn new(initial: R::State) -> Self {
        let initial = Rc::new(initial);
        Self(Rc::new(StoreNode {
            state: RefCell::new(initial.clone()),
            initial,
            subscribers: listeners::new_shared(),
            actions: ActionBus::new(),
            pending: RefCell::new(VecDeque::new()),
            is_dispatching: Cell::new(false),
        }))
    }

    /// Returns the current snapshot.
    pub fn state(&self) -> Rc<R::State> {
        self.0.state.borrow().clone()
    }

    /// Reduce `action` into a new state and notify subscribers.
    ///
    /// When called from inside a notification, the action is queued and applied after the
    /// current one has been fully delivered, so nobody observes a half-applied dispatch.
    pub fn dispatch(&self, action: R::Action) {
        self.0.dispatch(action)
    }

    /// Register `f`, which is called immediately with the current state and then after every reduction.
    pub fn subscribe(&self, f: impl Fn(&R::State) + 'static) -> Subscription {
        let id = self.0.subscribers.borrow_mut().insert(f);
        let entry = self.0.subscribers.borrow().get(id);
        if let Some(entry) = entry {
            entry.call(&self.state());
        }
        listeners::subscription(&self.0.subscribers, id)
    }

    /// Returns the stream of dispatched actions.
    pub fn actions(&self) -> ActionBus<R::Action> {
        self.0.actions.clone()
    }

    /// Returns a handle that dispatches into this store for as long as it exists.
    pub fn dispatcher(&self) -> Dispatcher<R::Action> {
        let node: Weak<StoreNode<R>> = Rc::downgrade(&self.0);
        Dispatcher::from_fn(move |action| match node.upgrade() {
            Some(node) => {
                node.dispatch(action);
                true
            }
            None => false,
        })
    }

    /// Restore the initial state and notify subscribers.
    pub fn reset(&self) {
        tracing::debug!("reset store");
        self.0.pending.borrow_mut().clear();
        let initial = self.0.initial.clone();
        *self.0.state.borrow_mut() = initial.clone();
        listeners::notify(&self.0.subscribers, &*initial);
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.subscribers.borrow().len()
    }
}

struct StoreNode<R: Reducer> {
    initial: Rc<R::State>,
    state: RefCell<Rc<R::State>>,
    subscribers: SharedListeners<R::State>,
    actions: ActionBus<R::Action>,
    pending: RefCell<VecDeque<R::Action>>,
    is_dispatching: Cell<bool>,
}
impl<R: Reducer> StoreNode<R> {
    fn dispatch(&self, action: R::Action) {
        self.pending.borrow_mut().push_back(action);
        if self.is_dispatching.replace(true) {
            tracing::trace!("dispatch queued behind the current one");
            return;
        }
        let _guard = DispatchGuard(&self.is_dispatching);
        loop {
            let action = self.pending.borrow_mut().pop_front();
            let Some(action) = action else {
                break;
            };
            self.apply(&action);
        }
    }
    fn apply(&self, action: &R::Action) {
        let kind = action.kind();
        tracing::debug!(feature = kind.feature(), action = kind.name(), "dispatch");
        let current = R::State::clone(&self.state.borrow());
        let next = Rc::new(R::reduce(current, action));
        *self.state.borrow_mut() = next.clone();
        listeners::notify(&self.subscribers, &*next);
        self.actions.publish(action);
    }
}

struct DispatchGuard<'a>(&'a Cell<bool>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Stream of actions dispatched through a [`Store`].
///
/// Effects and other observers subscribe here, independently of the store's state subscribers.
/// Only the store publishes, after the action has been reduced.
#[derive_ex(Clone, bound())]
pub struct ActionBus<A: 'static>(SharedListeners<A>);

impl<A: 'static> ActionBus<A> {
    pub(crate) fn new() -> Self {
        Self(listeners::new_shared())
    }
    pub fn subscribe(&self, f: impl Fn(&A) + 'static) -> Subscription {
        let id = self.0.borrow_mut().insert(f);
        listeners::subscription(&self.0, id)
    }
    pub(crate) fn publish(&self, action: &A) {
        listeners::notify(&self.0, action)
    }
    pub fn subscriber_count(&self) -> usize {
        self.0.borrow().len()
    }
}

/// Weak dispatch handle handed to effects.
#[derive_ex(Clone, bound())]
pub struct Dispatcher<A: 'static>(Rc<dyn Fn(A) -> bool>);

impl<A: 'static> Dispatcher<A> {
    pub fn from_fn(f: impl Fn(A) -> bool + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Dispatch `action`.
    ///
    /// Returns `false` if the target no longer exists; the action is then dropped.
    pub fn dispatch(&self, action: A) -> bool {
        (self.0)(action)
    }
}
