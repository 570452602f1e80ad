//! The compound order and its set-level state machine

use log::info;
use oco_core::{Quantity, Side, Symbol, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::leg::{LegKind, LegStatus, OrderLeg};
use super::request::OcoRequest;
use crate::error::{Error, Result};

/// Overall status of an OCO set
///
/// ```text
/// Initializing ──► Active ──► Resolved | Cancelled
///      │             │
///      ▼             ▼
///   Failed ◄─ ReconciliationRequired ──(reconcile)──► Active | Resolved | Cancelled
/// ```
/// A set parked in `ReconciliationRequired` by an unfinished rollback can
/// only end in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OcoStatus {
    Initializing,
    Active,
    Resolved,
    Cancelled,
    Failed,
    ReconciliationRequired,
}

impl OcoStatus {
    /// No further polling or mutation happens in a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OcoStatus::Resolved | OcoStatus::Cancelled | OcoStatus::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OcoStatus::Initializing => "INITIALIZING",
            OcoStatus::Active => "ACTIVE",
            OcoStatus::Resolved => "RESOLVED",
            OcoStatus::Cancelled => "CANCELLED",
            OcoStatus::Failed => "FAILED",
            OcoStatus::ReconciliationRequired => "RECONCILIATION_REQUIRED",
        }
    }

    fn can_transition_to(&self, next: OcoStatus) -> bool {
        use OcoStatus::*;
        match (self, next) {
            (Initializing, Active | Failed | ReconciliationRequired) => true,
            (Active, Resolved | Cancelled | ReconciliationRequired) => true,
            (ReconciliationRequired, Active | Resolved | Cancelled | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OcoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Both legs filled: the position was closed twice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceInconsistency {
    pub detected_at: Timestamp,
    pub take_profit_filled_at: Option<Timestamp>,
    pub stop_loss_filled_at: Option<Timestamp>,
    pub detail: String,
}

/// What the operator sees once monitoring is over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OcoOutcome {
    InProgress,
    Resolved(LegKind),
    RaceInconsistency(LegKind),
    ReconciliationRequired,
    Failed,
    Cancelled,
}

impl fmt::Display for OcoOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcoOutcome::InProgress => write!(f, "in progress"),
            OcoOutcome::Resolved(kind) => write!(f, "resolved by {kind}"),
            OcoOutcome::RaceInconsistency(kind) => {
                write!(f, "RACE: both legs executed ({kind} recorded as winner)")
            }
            OcoOutcome::ReconciliationRequired => write!(f, "reconciliation required"),
            OcoOutcome::Failed => write!(f, "failed"),
            OcoOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A take-profit/stop-loss pair protecting one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcoOrderSet {
    pub group_id: Uuid,
    pub symbol: Symbol,
    /// Closing side shared by both legs
    pub side: Side,
    pub quantity: Quantity,
    pub take_profit: OrderLeg,
    pub stop_loss: OrderLeg,
    pub status: OcoStatus,
    /// Winning leg, set when the set resolves
    pub resolution: Option<LegKind>,
    pub race: Option<RaceInconsistency>,
    /// Leg lost to an external cancel or rejection while active
    pub degraded: Option<LegKind>,
    /// Submission failed and a leg could not be confirmed rolled back
    #[serde(default)]
    pub rollback_pending: bool,
    pub notes: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl OcoOrderSet {
    pub fn new(request: &OcoRequest, reduce_only: bool, now: Timestamp) -> Self {
        Self {
            group_id: Uuid::new_v4(),
            symbol: request.symbol.clone(),
            side: request.side,
            quantity: request.quantity,
            take_profit: OrderLeg::take_profit(
                &request.symbol,
                request.side,
                request.quantity,
                request.take_profit,
                reduce_only,
            ),
            stop_loss: OrderLeg::stop_loss(
                &request.symbol,
                request.side,
                request.quantity,
                request.stop_loss,
                reduce_only,
            ),
            status: OcoStatus::Initializing,
            resolution: None,
            race: None,
            degraded: None,
            rollback_pending: false,
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn leg(&self, kind: LegKind) -> &OrderLeg {
        match kind {
            LegKind::TakeProfit => &self.take_profit,
            LegKind::StopLoss => &self.stop_loss,
        }
    }

    pub fn leg_mut(&mut self, kind: LegKind) -> &mut OrderLeg {
        match kind {
            LegKind::TakeProfit => &mut self.take_profit,
            LegKind::StopLoss => &mut self.stop_loss,
        }
    }

    pub fn legs(&self) -> [&OrderLeg; 2] {
        [&self.take_profit, &self.stop_loss]
    }

    pub fn filled_legs(&self) -> Vec<LegKind> {
        self.legs()
            .into_iter()
            .filter(|leg| leg.status == LegStatus::Filled)
            .map(|leg| leg.kind)
            .collect()
    }

    /// Move the set to `next`, refusing transitions the state machine forbids
    pub fn transition(&mut self, next: OcoStatus, now: Timestamp) -> Result<()> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(Error::InvariantViolation(format!(
                "OCO {} cannot move from {} to {}",
                self.group_id, self.status, next
            )));
        }
        info!("OCO {}: {} -> {}", self.group_id, self.status, next);
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Resolve with `winner` filled; legs are expected to be terminal already
    pub fn resolve(&mut self, winner: LegKind, now: Timestamp) -> Result<()> {
        self.transition(OcoStatus::Resolved, now)?;
        self.resolution = Some(winner);
        Ok(())
    }

    pub fn note(&mut self, note: impl Into<String>, now: Timestamp) {
        self.notes.push(note.into());
        self.updated_at = now;
    }

    /// User-facing projection of the status
    pub fn outcome(&self) -> OcoOutcome {
        match self.status {
            OcoStatus::Initializing | OcoStatus::Active => OcoOutcome::InProgress,
            OcoStatus::Resolved => {
                let winner = self.resolution.unwrap_or(LegKind::TakeProfit);
                if self.race.is_some() {
                    OcoOutcome::RaceInconsistency(winner)
                } else {
                    OcoOutcome::Resolved(winner)
                }
            }
            OcoStatus::ReconciliationRequired => OcoOutcome::ReconciliationRequired,
            OcoStatus::Failed => OcoOutcome::Failed,
            OcoStatus::Cancelled => OcoOutcome::Cancelled,
        }
    }
}
