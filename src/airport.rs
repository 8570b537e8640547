//! Airport list consumer demonstrating both ways of ending a subscription.

use std::{cell::RefCell, rc::Rc, time::Duration};

use crate::{
    flight_booking::FlightService,
    lifecycle::{Lifetime, Notification, Producer},
    utils::timer::sleep,
    Subscription,
};

#[cfg(test)]
mod tests;

/// What one half of an [`AirportPanel`] has received so far.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AirportView {
    pub airports: Vec<String>,
    pub is_loading: bool,
    pub error: Option<String>,
}
impl Default for AirportView {
    fn default() -> Self {
        Self {
            airports: Vec::new(),
            is_loading: true,
            error: None,
        }
    }
}
impl AirportView {
    fn apply(&mut self, n: &Notification<Vec<String>>, strategy: &str) {
        match n {
            Notification::Next(airports) => {
                tracing::debug!(strategy, count = airports.len(), "airports loaded");
                self.airports = airports.clone();
                self.is_loading = false;
            }
            Notification::Error(e) => {
                tracing::warn!(strategy, error = %e, "airports failed");
                self.error = Some(e.clone());
                self.is_loading = false;
            }
            Notification::Complete => tracing::trace!(strategy, "airports completed"),
        }
    }
}

/// Consumer of a shared airport list.
///
/// One view is fed through an explicit [`Subscription`], the other until a [`Lifetime`] ends.
/// [`end`](Self::end), or dropping the panel, stops both.
pub struct AirportPanel {
    producer: Producer<Vec<String>>,
    subscription: Subscription,
    lifetime: Lifetime,
    by_handle: Rc<RefCell<AirportView>>,
    by_signal: Rc<RefCell<AirportView>>,
}

impl AirportPanel {
    /// Load the airport list from `service` after `delay` and show it in both views.
    pub fn start(service: &dyn FlightService, delay: Duration) -> Self {
        let airports = service.find_all();
        Self::from_producer(&Producer::from_future(async move {
            sleep(delay).await;
            airports.await
        }))
    }

    pub fn from_producer(producer: &Producer<Vec<String>>) -> Self {
        let by_handle = Rc::new(RefCell::new(AirportView::default()));
        let by_signal = Rc::new(RefCell::new(AirportView::default()));
        let lifetime = Lifetime::new();

        let subscription = producer.subscribe({
            let view = by_handle.clone();
            move |n| view.borrow_mut().apply(n, "handle")
        });
        producer.subscribe_until(
            {
                let view = by_signal.clone();
                move |n| view.borrow_mut().apply(n, "signal")
            },
            &lifetime.signal(),
        );
        Self {
            producer: producer.clone(),
            subscription,
            lifetime,
            by_handle,
            by_signal,
        }
    }

    /// View fed through the explicit handle.
    pub fn by_handle(&self) -> AirportView {
        self.by_handle.borrow().clone()
    }

    /// View fed until the termination signal.
    pub fn by_signal(&self) -> AirportView {
        self.by_signal.borrow().clone()
    }

    /// Source both views are fed from.
    pub fn producer(&self) -> &Producer<Vec<String>> {
        &self.producer
    }

    /// Stop both views. Calling this again does nothing.
    pub fn end(&mut self) {
        self.subscription.unsubscribe();
        self.lifetime.terminate();
    }
    pub fn is_ended(&self) -> bool {
        self.lifetime.is_terminated()
    }
}
