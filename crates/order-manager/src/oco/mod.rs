//! OCO domain types: legs, sets, requests

mod leg;
mod request;
mod set;

pub use leg::{Applied, LegKind, LegObservation, LegStatus, OrderLeg};
pub use request::OcoRequest;
pub use set::{OcoOrderSet, OcoOutcome, OcoStatus, RaceInconsistency};
