//! Flight search feature: state, actions, reducer and the load effect.

use std::{collections::BTreeSet, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::{
    effect::{EffectBinding, EffectOptions},
    Action, ActionKind, Reducer,
};

mod service;

pub use service::*;


pub type FlightId = u32;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flight {
    pub id: FlightId,
    #[serde(alias = "from")]
    pub origin: String,
    #[serde(alias = "to")]
    pub destination: String,
    /// ISO 8601 departure time.
    #[serde(alias = "date")]
    pub timestamp: String,
    #[serde(default, alias = "delayed")]
    pub flagged: bool,
}
impl Flight {
    pub fn new(
        id: FlightId,
        origin: impl Into<String>,
        destination: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id,
            origin: origin.into(),
            destination: destination.into(),
            timestamp: timestamp.into(),
            flagged: false,
        }
    }
    pub fn with_flagged(self, flagged: bool) -> Self {
        Self { flagged, ..self }
    }
}

/// Query parameters of a flight search.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightQuery {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub urgent: bool,
}

pub const FEATURE: &str = "FlightBooking";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlightAction {
    LoadFlights { from: String, to: String, urgent: bool },
    LoadFlightsSucceeded { flights: Vec<Flight> },
    LoadFlightsFailed { message: String },
    UpdateFlight { flight: Flight },
}
impl FlightAction {
    pub fn load(from: impl Into<String>, to: impl Into<String>, urgent: bool) -> Self {
        FlightAction::LoadFlights {
            from: from.into(),
            to: to.into(),
            urgent,
        }
    }
    fn query(&self) -> Option<FlightQuery> {
        match self {
            FlightAction::LoadFlights { from, to, urgent } => Some(FlightQuery {
                from: from.clone(),
                to: to.clone(),
                urgent: *urgent,
            }),
            _ => None,
        }
    }
}
impl Action for FlightAction {
    fn kind(&self) -> ActionKind {
        let name = match self {
            FlightAction::LoadFlights { .. } => "LoadFlights",
            FlightAction::LoadFlightsSucceeded { .. } => "LoadFlightsSucceeded",
            FlightAction::LoadFlightsFailed { .. } => "LoadFlightsFailed",
            FlightAction::UpdateFlight { .. } => "UpdateFlight",
        };
        ActionKind::new(FEATURE, name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlightState {
    flights: Vec<Flight>,
    is_loading: bool,
    error_message: String,
    excluded: BTreeSet<FlightId>,
}
impl FlightState {
    /// Empty state hiding the flights in `excluded` from [`visible_flights`](Self::visible_flights).
    pub fn new(excluded: impl IntoIterator<Item = FlightId>) -> Self {
        Self {
            flights: Vec::new(),
            is_loading: false,
            error_message: String::new(),
            excluded: excluded.into_iter().collect(),
        }
    }

    /// Every loaded flight, in result order.
    pub fn flights(&self) -> &[Flight] {
        &self.flights
    }

    /// Loaded flights minus the exclusion set.
    pub fn visible_flights(&self) -> impl Iterator<Item = &Flight> {
        self.flights
            .iter()
            .filter(|f| !self.excluded.contains(&f.id))
    }
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Description of the last failed load, or `""`.
    pub fn error_message(&self) -> &str {
        &self.error_message
    }
    pub fn excluded(&self) -> &BTreeSet<FlightId> {
        &self.excluded
    }
}
impl Default for FlightState {
    fn default() -> Self {
        Self::new([3])
    }
}

pub struct FlightReducer;

impl Reducer for FlightReducer {
    type State = FlightState;
    type Action = FlightAction;

    fn reduce(state: FlightState, action: &FlightAction) -> FlightState {
        match action {
            FlightAction::LoadFlights { .. } => FlightState {
                flights: Vec::new(),
                is_loading: true,
                error_message: String::new(),
                ..state
            },
            FlightAction::LoadFlightsSucceeded { flights } => FlightState {
                flights: unique_by_id(flights),
                is_loading: false,
                error_message: String::new(),
                ..state
            },
            FlightAction::LoadFlightsFailed { message } => FlightState {
                is_loading: false,
                error_message: message.clone(),
                ..state
            },
            FlightAction::UpdateFlight { flight } => {
                let mut state = state;
                if let Some(f) = state.flights.iter_mut().find(|f| f.id == flight.id) {
                    *f = flight.clone();
                }
                state
            }
        }
    }
}

fn unique_by_id(flights: &[Flight]) -> Vec<Flight> {
    let mut ids = BTreeSet::new();
    flights
        .iter()
        .filter(|f| ids.insert(f.id))
        .cloned()
        .collect()
}

/// Effect answering [`FlightAction::LoadFlights`] with the result of [`FlightService::find`].
pub fn load_flights_effect(
    service: Rc<dyn FlightService>,
    options: EffectOptions,
) -> EffectBinding<FlightAction, FlightQuery, Vec<Flight>, TransportError> {
    EffectBinding::new(
        "load_flights",
        FlightAction::query,
        move |q: FlightQuery| service.find(&q.from, &q.to, q.urgent),
        |flights| FlightAction::LoadFlightsSucceeded { flights },
        |message| FlightAction::LoadFlightsFailed { message },
    )
    .with_options(options)
}
