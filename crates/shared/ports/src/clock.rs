use oco_core::Timestamp;

/// Source of "now" for set and leg timestamps
///
/// The manager never reads the wall clock directly, so tests can pin
/// observation times with a manually advanced clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}
