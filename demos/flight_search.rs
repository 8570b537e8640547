//! Search flights, flag one, and page through the results.
//!
//! Run with `RUST_LOG=actionflow=debug cargo run --example flight_search` to see the pipeline.

use std::{rc::Rc, time::Duration};

use actionflow::{
    airport::AirportPanel,
    channel::SyncChannel,
    core::{spawn_action, Runtime},
    effect::{Concurrency, EffectOptions, EffectRunner},
    flight_booking::{load_flights_effect, FlightAction, FlightReducer, FlightState, InMemoryFlightService},
    Store,
};
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut rt = Runtime::new();
    let service = Rc::new(InMemoryFlightService::sample().with_latency(Duration::from_millis(200)));

    let store = Store::<FlightReducer>::new(FlightState::default());
    let options = EffectOptions::default()
        .with_delay(Duration::from_millis(300))
        .with_concurrency(Concurrency::Switch);
    let _effects = EffectRunner::new(&store)
        .with(load_flights_effect(service.clone(), options))
        .start();
    let _view = store.subscribe(|s| {
        let visible: Vec<_> = s.visible_flights().map(|f| f.id).collect();
        println!(
            "loading={} error={:?} flights={} visible={visible:?}",
            s.is_loading(),
            s.error_message(),
            s.flights().len()
        );
    });

    let mut airports = AirportPanel::start(&*service, Duration::from_millis(100));

    store.dispatch(FlightAction::load("Hamburg", "", false));
    rt.run_until_idle();
    println!("airports: {:?}", airports.by_handle().airports);
    airports.end();

    // A click on the first row, handled on the next turn.
    if let Some(first) = store.state().flights().first() {
        let store = store.clone();
        let flight = first.clone().with_flagged(true);
        spawn_action(move || store.dispatch(FlightAction::UpdateFlight { flight }));
    }
    rt.update();

    let tabs = SyncChannel::new(store.state().flights().len());
    let (pager, tab_host) = tabs.peers();
    let _tabs_view = tab_host.subscribe(|s| println!("tab host shows {s}"));
    while pager.next() {}
    pager.prev();
}
