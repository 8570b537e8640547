use std::{cell::RefCell, rc::Rc};

use actionflow::{
    core::Runtime,
    effect::{Concurrency, EffectOptions, EffectRunner},
    flight_booking::{
        load_flights_effect, Flight, FlightAction, FlightReducer, FlightService, FlightState,
        InMemoryFlightService, TransportError,
    },
    Store, Subscription,
};
use futures::{channel::oneshot, future::LocalBoxFuture};

type Reply = oneshot::Sender<Result<Vec<Flight>, TransportError>>;

/// Service whose lookups complete only when the test answers them.
#[derive(Default)]
struct ManualService {
    pending: RefCell<Vec<(String, Reply)>>,
}
impl ManualService {
    fn answer(&self, from: &str, result: Result<Vec<Flight>, TransportError>) {
        let mut pending = self.pending.borrow_mut();
        let index = pending
            .iter()
            .position(|(f, _)| f == from)
            .expect("no pending lookup");
        let (_, tx) = pending.remove(index);
        let _ = tx.send(result);
    }
}
impl FlightService for ManualService {
    fn find(
        &self,
        from: &str,
        _to: &str,
        _urgent: bool,
    ) -> LocalBoxFuture<'static, Result<Vec<Flight>, TransportError>> {
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().push((from.to_string(), tx));
        Box::pin(async move {
            rx.await
                .unwrap_or_else(|_| Err(TransportError::new("canceled")))
        })
    }
    fn find_all(&self) -> LocalBoxFuture<'static, Result<Vec<String>, TransportError>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

fn flights(from: &str) -> Vec<Flight> {
    (1..=3)
        .map(|id| Flight::new(id, from, "Hamburg", "2025-02-02T07:15+01:00"))
        .collect()
}

fn setup(
    service: Rc<dyn FlightService>,
    options: EffectOptions,
) -> (Store<FlightReducer>, Subscription) {
    let store = Store::<FlightReducer>::new(FlightState::new([]));
    let runner = EffectRunner::new(&store)
        .with(load_flights_effect(service, options))
        .start();
    (store, runner)
}

#[test]
fn search_loads_flights() {
    let mut rt = Runtime::new();
    let service = Rc::new(ManualService::default());
    let (store, _runner) = setup(service.clone(), EffectOptions::default());
    assert_eq!(*store.state(), FlightState::new([]));

    store.dispatch(FlightAction::load("Graz", "Hamburg", false));
    let state = store.state();
    assert!(state.flights().is_empty());
    assert!(state.is_loading());
    assert_eq!(state.error_message(), "");

    rt.update();
    service.answer("Graz", Ok(flights("Graz")));
    rt.update();
    let state = store.state();
    assert_eq!(state.flights(), flights("Graz"));
    assert!(!state.is_loading());
    assert_eq!(state.error_message(), "");
}

#[test]
fn network_error_keeps_flights() {
    let mut rt = Runtime::new();
    let service = Rc::new(ManualService::default());
    let (store, _runner) = setup(service.clone(), EffectOptions::default());

    store.dispatch(FlightAction::load("Graz", "Hamburg", false));
    store.dispatch(FlightAction::load("Vienna", "Hamburg", false));
    rt.update();
    service.answer("Graz", Ok(flights("Graz")));
    rt.update();

    service.answer("Vienna", Err(TransportError::new("network error")));
    rt.update();
    let state = store.state();
    assert_eq!(state.error_message(), "network error");
    assert_eq!(state.flights(), flights("Graz"));
    assert!(!state.is_loading());
}

#[test]
fn failing_service_sets_error() {
    let mut rt = Runtime::new();
    let service = Rc::new(InMemoryFlightService::sample());
    service.set_failure(Some(TransportError::new("network error")));
    let (store, _runner) = setup(service.clone(), EffectOptions::default());

    store.dispatch(FlightAction::load("Graz", "Hamburg", false));
    rt.run_until_idle();
    let state = store.state();
    assert_eq!(state.error_message(), "network error");
    assert!(state.flights().is_empty());
    assert!(!state.is_loading());
}

#[test]
fn overlapping_searches_last_resolved_wins() {
    let mut rt = Runtime::new();
    let service = Rc::new(ManualService::default());
    let (store, _runner) = setup(service.clone(), EffectOptions::default());

    store.dispatch(FlightAction::load("Graz", "Hamburg", false));
    store.dispatch(FlightAction::load("Vienna", "Hamburg", false));
    rt.update();

    service.answer("Vienna", Ok(flights("Vienna")));
    rt.update();
    assert_eq!(store.state().flights(), flights("Vienna"));

    service.answer("Graz", Ok(flights("Graz")));
    rt.update();
    assert_eq!(store.state().flights(), flights("Graz"));
}

#[test]
fn overlapping_searches_with_switch_keep_latest() {
    let mut rt = Runtime::new();
    let service = Rc::new(ManualService::default());
    let options = EffectOptions::default().with_concurrency(Concurrency::Switch);
    let (store, _runner) = setup(service.clone(), options);

    store.dispatch(FlightAction::load("Graz", "Hamburg", false));
    rt.update();
    store.dispatch(FlightAction::load("Vienna", "Hamburg", false));
    rt.update();

    service.answer("Vienna", Ok(flights("Vienna")));
    service.answer("Graz", Ok(flights("Graz")));
    rt.update();
    assert_eq!(store.state().flights(), flights("Vienna"));
}

#[test]
fn update_flight_after_search() {
    let mut rt = Runtime::new();
    let service = Rc::new(InMemoryFlightService::sample());
    let (store, _runner) = setup(service, EffectOptions::default());

    store.dispatch(FlightAction::load("hamburg", "", false));
    rt.run_until_idle();
    let flight = store.state().flights()[0].clone().with_flagged(true);

    let update = FlightAction::UpdateFlight {
        flight: flight.clone(),
    };
    store.dispatch(update.clone());
    let once = store.state();
    store.dispatch(update);
    assert_eq!(store.state(), once);
    assert_eq!(once.flights()[0], flight);
}

#[test]
fn urgent_search_skips_latency() {
    let mut rt = Runtime::new();
    let service = Rc::new(
        InMemoryFlightService::sample().with_latency(std::time::Duration::from_secs(60)),
    );
    let (store, _runner) = setup(service, EffectOptions::default());

    store.dispatch(FlightAction::load("Graz", "Hamburg", true));
    rt.update();
    assert!(!store.state().is_loading());
    assert_eq!(store.state().flights().len(), 3);
}
