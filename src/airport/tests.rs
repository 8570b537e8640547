use super::*;
use crate::{core::Runtime, flight_booking::InMemoryFlightService, flight_booking::TransportError};

fn airports(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn both_views_start_loading() {
    let producer = Producer::new();
    let panel = AirportPanel::from_producer(&producer);
    assert_eq!(panel.by_handle(), AirportView::default());
    assert_eq!(panel.by_signal(), AirportView::default());
    assert!(panel.by_handle().is_loading);
    assert_eq!(producer.subscriber_count(), 2);
}

#[test]
fn both_views_receive_value() {
    let producer = Producer::new();
    let panel = AirportPanel::from_producer(&producer);
    producer.emit(airports(&["Graz", "Hamburg"]));

    let expected = AirportView {
        airports: airports(&["Graz", "Hamburg"]),
        is_loading: false,
        error: None,
    };
    assert_eq!(panel.by_handle(), expected);
    assert_eq!(panel.by_signal(), expected);
}

#[test]
fn nothing_is_delivered_after_end() {
    let producer = Producer::new();
    let mut panel = AirportPanel::from_producer(&producer);
    panel.end();
    assert!(panel.is_ended());
    assert_eq!(producer.subscriber_count(), 0);

    producer.emit(airports(&["Graz"]));
    assert_eq!(panel.by_handle(), AirportView::default());
    assert_eq!(panel.by_signal(), AirportView::default());

    panel.end();
}

#[test]
fn drop_releases_subscribers() {
    let producer = Producer::<Vec<String>>::new();
    let panel = AirportPanel::from_producer(&producer);
    drop(panel);
    assert_eq!(producer.subscriber_count(), 0);
}

#[test]
fn error_stops_loading() {
    let producer = Producer::new();
    let panel = AirportPanel::from_producer(&producer);
    producer.fail("503 Service Unavailable");

    let view = panel.by_signal();
    assert!(!view.is_loading);
    assert_eq!(view.error.as_deref(), Some("503 Service Unavailable"));
    assert_eq!(panel.by_handle(), view);
}

#[test]
fn start_loads_from_service() {
    let mut rt = Runtime::new();
    let service = InMemoryFlightService::sample();
    let panel = AirportPanel::start(&service, Duration::from_millis(10));
    rt.update();
    assert!(panel.by_handle().is_loading);

    rt.run_until_idle();
    assert_eq!(
        panel.by_handle().airports,
        airports(&["Berlin", "Frankfurt", "Graz", "Hamburg", "Mallorca"])
    );
    assert_eq!(panel.by_signal(), panel.by_handle());
    assert!(panel.producer().is_finished());
}

#[test]
fn start_then_end_discards_result() {
    let mut rt = Runtime::new();
    let service = InMemoryFlightService::sample();
    service.set_failure(Some(TransportError::new("offline")));
    let mut panel = AirportPanel::start(&service, Duration::from_millis(10));
    panel.end();

    rt.run_until_idle();
    assert!(panel.producer().is_finished());
    assert_eq!(panel.by_handle(), AirportView::default());
    assert_eq!(panel.by_signal(), AirportView::default());
}
