//! OCO Order Manager
//!
//! The Order Manager sits between the CLI and the exchange gateway,
//! emulating a one-cancels-other order the venue does not offer natively:
//! - **Order Record Store**: passive registry of OCO sets, indexed by group
//!   id, leg id and exchange order id
//! - **OCO Lifecycle Manager**: submits both legs, monitors them, cancels the
//!   survivor when one fills, and surfaces races and inconclusive states
//! - **Single-Order Passthrough**: one-call market/limit/stop-limit orders
//!
//! ## Architecture
//!
//! ```text
//! CLI ──► OcoManager::place_oco ──────────────────────────────┐
//!                                                             │
//!              ┌──────────────────────────────────────────────▼──┐
//!              │                 OCO Lifecycle Manager            │
//!              │  validate ─► submit TP ║ submit SL (join)        │
//!              │                 │ both accepted   │ any failed   │
//!              │                 ▼                 ▼              │
//!              │        monitor task (1 per set)   rollback       │
//!              │        poll ─► evaluate ─► cancel sibling        │
//!              └───────┬──────────────────────────────┬──────────┘
//!                      │ snapshots                    │ submit / status / cancel
//!                      ▼                              ▼
//!             Order Record Store             ExchangeGateway (port)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oco_order_manager::{ManagerConfig, OcoManager, OcoRequest};
//!
//! let manager = OcoManager::new(gateway, clock, ManagerConfig::default());
//! let request = OcoRequest::new("BTCUSDT", Side::Sell, dec!(0.01), dec!(70000), dec!(65000));
//!
//! let set = manager.place_oco(request).await?;
//! let done = manager.wait_for_outcome(set.group_id).await?;
//! println!("{}", done.outcome());
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod oco;
pub mod passthrough;
pub mod retry;
pub mod store;

// Re-export main types
pub use config::ManagerConfig;
pub use error::{Error, Result};
pub use manager::{LegCancelOutcome, LegCancelReport, OcoManager};
pub use oco::{
    LegKind, LegObservation, LegStatus, OcoOrderSet, OcoOutcome, OcoRequest, OcoStatus, OrderLeg,
    RaceInconsistency,
};
pub use passthrough::{OrderPassthrough, default_limit_price};
pub use retry::RetryPolicy;
pub use store::OrderRecordStore;
