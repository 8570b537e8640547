use std::{
    cell::{Cell, RefCell},
    collections::BTreeSet,
    time::Duration,
};

use futures::future::LocalBoxFuture;
use parse_display::Display;

use super::Flight;
use crate::utils::timer::sleep;

/// Failure of a data-access call.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display("{message}")]
pub struct TransportError {
    message: String,
}
impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
    pub fn message(&self) -> &str {
        &self.message
    }
}
impl std::error::Error for TransportError {}

/// Data-access capability used by the flight search.
pub trait FlightService {
    fn find(
        &self,
        from: &str,
        to: &str,
        urgent: bool,
    ) -> LocalBoxFuture<'static, Result<Vec<Flight>, TransportError>>;

    /// Names of every known airport.
    fn find_all(&self) -> LocalBoxFuture<'static, Result<Vec<String>, TransportError>>;
}

/// [`FlightService`] over a fixed list of flights.
///
/// Lookups complete after [`latency`](Self::with_latency), except urgent ones which complete on
/// the next poll. Origin and destination match case-insensitively; an empty query matches all.
#[derive(Debug, Default)]
pub struct InMemoryFlightService {
    flights: Vec<Flight>,
    latency: Duration,
    failure: RefCell<Option<TransportError>>,
    calls: Cell<usize>,
}

impl InMemoryFlightService {
    pub fn new(flights: impl IntoIterator<Item = Flight>) -> Self {
        Self {
            flights: flights.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Service preloaded with a handful of flights out of Hamburg and Graz.
    pub fn sample() -> Self {
        Self::new([
            Flight::new(1, "Hamburg", "Berlin", "2025-02-01T17:00+01:00"),
            Flight::new(2, "Hamburg", "Frankfurt", "2025-02-01T17:30+01:00"),
            Flight::new(3, "Hamburg", "Mallorca", "2025-02-01T17:45+01:00"),
            Flight::new(4, "Graz", "Hamburg", "2025-02-02T07:15+01:00"),
            Flight::new(5, "Graz", "Hamburg", "2025-02-02T12:40+01:00"),
            Flight::new(6, "Graz", "Hamburg", "2025-02-02T19:05+01:00"),
        ])
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        Self { latency, ..self }
    }

    /// Make every following call fail with `error`, or succeed again with `None`.
    pub fn set_failure(&self, error: Option<TransportError>) {
        *self.failure.borrow_mut() = error;
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    fn respond<T: 'static>(
        &self,
        result: T,
        urgent: bool,
    ) -> LocalBoxFuture<'static, Result<T, TransportError>> {
        self.calls.set(self.calls.get() + 1);
        let result = match self.failure.borrow().clone() {
            Some(e) => Err(e),
            None => Ok(result),
        };
        let latency = if urgent { Duration::ZERO } else { self.latency };
        Box::pin(async move {
            sleep(latency).await;
            result
        })
    }
}

fn matches(query: &str, value: &str) -> bool {
    query.is_empty() || query.eq_ignore_ascii_case(value)
}

impl FlightService for InMemoryFlightService {
    fn find(
        &self,
        from: &str,
        to: &str,
        urgent: bool,
    ) -> LocalBoxFuture<'static, Result<Vec<Flight>, TransportError>> {
        let flights = self
            .flights
            .iter()
            .filter(|f| matches(from, &f.origin) && matches(to, &f.destination))
            .cloned()
            .collect();
        tracing::debug!(from, to, urgent, "find flights");
        self.respond(flights, urgent)
    }

    fn find_all(&self) -> LocalBoxFuture<'static, Result<Vec<String>, TransportError>> {
        let airports: BTreeSet<_> = self
            .flights
            .iter()
            .flat_map(|f| [f.origin.clone(), f.destination.clone()])
            .collect();
        self.respond(airports.into_iter().collect(), false)
    }
}
