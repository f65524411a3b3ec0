//! Accepting connections and bounding how many are served at once.

pub mod dispatcher;
pub mod gate;
pub mod listener;

pub use dispatcher::{Acceptor, Dispatcher};
pub use gate::{AdmissionGate, AdmissionSlot};
