use parse_display::Display;


/// Identifies the kind of an [`Action`], e.g. `[FlightBooking] LoadFlights`.
#[derive(Clone, Copy, Display, Debug, PartialEq, Eq, Hash)]
#[display("[{feature}] {name}")]
pub struct ActionKind {
    feature: &'static str,
    name: &'static str,
}
impl ActionKind {
    pub const fn new(feature: &'static str, name: &'static str) -> Self {
        Self { feature, name }
    }
    pub fn feature(&self) -> &'static str {
        self.feature
    }
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Immutable message describing an intent or an outcome.
pub trait Action: Clone + 'static {
    fn kind(&self) -> ActionKind;
}

/// Pure state transition.
///
/// The reducer is the only place where state changes. Actions it does not handle must
/// return the input state unchanged.
pub trait Reducer: 'static {
    type State: Clone + 'static;
    type Action: Action;

    fn reduce(state: Self::State, action: &Self::Action) -> Self::State;
}

/// Apply a history of actions to `state` in order.
pub fn replay<'a, R: Reducer>(
    state: R::State,
    actions: impl IntoIterator<Item = &'a R::Action>,
) -> R::State {
    actions.into_iter().fold(state, R::reduce)
}
