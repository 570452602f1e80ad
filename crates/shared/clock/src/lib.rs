//! OCO Clock Infrastructure
//!
//! Provides time sources for production and tests:
//!
//! - [`SystemClock`]: wall-clock UTC time
//! - [`ManualClock`]: frozen time that only moves when told to, for
//!   deterministic ordering of status observations in tests
//!
//! ## Usage
//!
//! ```ignore
//! use oco_clock::{ManualClock, Clock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::new(start);
//! let t0 = clock.now();
//! clock.advance(Duration::seconds(3));
//! assert!(clock.now() > t0);
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use oco_ports::Clock;
