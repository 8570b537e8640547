//! Unidirectional state pipeline for single-threaded applications.
//!
//! Actions are reduced into state by a [`Store`], effects turn actions into asynchronous work whose
//! outcome is dispatched back, and [`lifecycle`] ties asynchronous producers to the lifetime of
//! their consumers.
pub mod airport;
pub mod channel;
pub mod core;
pub mod effect;
pub mod flight_booking;
pub mod lifecycle;
mod listeners;
mod reducer;
pub mod store;
mod subscription;
pub mod utils;

pub use reducer::*;
pub use store::{ActionBus, Dispatcher, Store};
pub use subscription::*;
