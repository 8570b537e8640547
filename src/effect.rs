use std::{cell::RefCell, fmt, future::Future, mem::replace, rc::Rc, time::Duration};

use futures::future::LocalBoxFuture;
use parse_display::Display;
use serde::{Deserialize, Serialize};

use crate::{
    core::{spawn_local, spawn_local_scoped},
    lifecycle::{Lifetime, Termination},
    store::Dispatcher,
    utils::timer::sleep,
    Action, Reducer, Store, Subscription,
};


/// How an effect treats a trigger that arrives while an earlier operation is still running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display(style = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Concurrency {
    /// Every trigger runs independently. Results are applied in completion order.
    #[default]
    Merge,
    /// A new trigger aborts the operation still running for the previous one.
    Switch,
}

/// Per-binding settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectOptions {
    /// Wait before starting the operation, in milliseconds.
    pub delay_ms: u64,
    pub concurrency: Concurrency,
}
impl EffectOptions {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = delay.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }
    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// What an effect gets to work with while it runs.
pub struct EffectContext<A: 'static> {
    dispatcher: Dispatcher<A>,
    termination: Termination,
}
impl<A: 'static> EffectContext<A> {
    pub fn new(dispatcher: Dispatcher<A>, termination: Termination) -> Self {
        Self {
            dispatcher,
            termination,
        }
    }
    pub fn dispatcher(&self) -> &Dispatcher<A> {
        &self.dispatcher
    }

    /// Fires when the runner that owns this context stops.
    pub fn termination(&self) -> &Termination {
        &self.termination
    }
}

/// Side effect observing the action stream.
///
/// Implementations must not block: asynchronous work is spawned and its outcome dispatched later.
pub trait Effect<A: Action> {
    fn on_action(&self, action: &A, cx: &EffectContext<A>);
}

type Operation<P, T, E> = Rc<dyn Fn(P) -> LocalBoxFuture<'static, Result<T, E>>>;

/// Static declaration binding a trigger to an asynchronous operation and its outcome actions.
pub struct EffectBinding<A: 'static, P: 'static, T: 'static, E: 'static> {
    name: &'static str,
    trigger: Box<dyn Fn(&A) -> Option<P>>,
    operation: Operation<P, T, E>,
    on_success: Rc<dyn Fn(T) -> A>,
    on_failure: Rc<dyn Fn(String) -> A>,
    options: EffectOptions,
    in_flight: RefCell<Subscription>,
}

impl<A, P, T, E> EffectBinding<A, P, T, E>
where
    A: Action,
    P: 'static,
    T: 'static,
    E: fmt::Display + 'static,
{
    /// Create a binding.
    ///
    /// `trigger` selects the actions this effect reacts to and extracts the operation's input.
    pub fn new<Fut>(
        name: &'static str,
        trigger: impl Fn(&A) -> Option<P> + 'static,
        operation: impl Fn(P) -> Fut + 'static,
        on_success: impl Fn(T) -> A + 'static,
        on_failure: impl Fn(String) -> A + 'static,
    ) -> Self
    where
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        Self {
            name,
            trigger: Box::new(trigger),
            operation: Rc::new(move |p| Box::pin(operation(p))),
            on_success: Rc::new(on_success),
            on_failure: Rc::new(on_failure),
            options: EffectOptions::default(),
            in_flight: RefCell::new(Subscription::empty()),
        }
    }
    pub fn with_options(mut self, options: EffectOptions) -> Self {
        self.options = options;
        self
    }
    pub fn name(&self) -> &'static str {
        self.name
    }
    pub fn options(&self) -> &EffectOptions {
        &self.options
    }
}

impl<A, P, T, E> Effect<A> for EffectBinding<A, P, T, E>
where
    A: Action,
    P: 'static,
    T: 'static,
    E: fmt::Display + 'static,
{
    fn on_action(&self, action: &A, cx: &EffectContext<A>) {
        let Some(payload) = (self.trigger)(action) else {
            return;
        };
        let name = self.name;
        tracing::debug!(effect = name, trigger = %action.kind(), "effect started");

        let delay = self.options.delay();
        let operation = self.operation.clone();
        let on_success = self.on_success.clone();
        let on_failure = self.on_failure.clone();
        let dispatcher = cx.dispatcher.clone();
        let termination = cx.termination.clone();
        let task = async move {
            let result = termination
                .guard(async move {
                    sleep(delay).await;
                    operation(payload).await
                })
                .await;
            let Some(result) = result else {
                tracing::trace!(effect = name, "effect result discarded");
                return;
            };
            let action = match result {
                Ok(value) => on_success(value),
                Err(e) => {
                    let message = e.to_string();
                    tracing::warn!(effect = name, error = %message, "effect failed");
                    on_failure(message)
                }
            };
            tracing::debug!(effect = name, outcome = %action.kind(), "effect finished");
            dispatcher.dispatch(action);
        };
        match self.options.concurrency {
            Concurrency::Merge => spawn_local(task),
            Concurrency::Switch => {
                let old = replace(&mut *self.in_flight.borrow_mut(), spawn_local_scoped(task));
                drop(old);
            }
        }
    }
}

/// Runs a set of effects against a store's action stream.
pub struct EffectRunner<R: Reducer> {
    store: Store<R>,
    effects: Vec<Box<dyn Effect<R::Action>>>,
}

impl<R: Reducer> EffectRunner<R> {
    pub fn new(store: &Store<R>) -> Self {
        Self {
            store: store.clone(),
            effects: Vec::new(),
        }
    }

    pub fn with(mut self, effect: impl Effect<R::Action> + 'static) -> Self {
        self.effects.push(Box::new(effect));
        self
    }

    /// Start observing dispatched actions.
    ///
    /// Once the returned [`Subscription`] ends, no more triggers are observed and the results of
    /// operations still in flight are discarded.
    pub fn start(self) -> Subscription {
        let lifetime = Lifetime::new();
        let cx = EffectContext::new(self.store.dispatcher(), lifetime.signal());
        let effects = self.effects;
        let actions = self.store.actions().subscribe(move |action| {
            for effect in &effects {
                effect.on_action(action, &cx);
            }
        });
        [actions, Subscription::from_fn(move || lifetime.terminate())]
            .into_iter()
            .collect()
    }
}
