//! Leg cancellation, shared by sibling cancels, rollback and user cancels

use log::{error, info, warn};
use oco_core::Timestamp;
use oco_ports::GatewayError;
use serde::{Deserialize, Serialize};

use super::OcoManager;
use crate::error::Result;
use crate::oco::{
    LegKind, LegObservation, LegStatus, OcoOrderSet, OcoStatus, OrderLeg, RaceInconsistency,
};

/// How one leg reacted to a user cancel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LegCancelOutcome {
    Cancelled,
    /// Nothing to cancel; the leg had already reached this status
    AlreadyTerminal(LegStatus),
    /// The leg never received an exchange order id
    NotSubmitted,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegCancelReport {
    pub kind: LegKind,
    pub exchange_order_id: Option<String>,
    pub outcome: LegCancelOutcome,
}

/// Result of driving one live leg towards cancellation
#[derive(Debug, Clone)]
pub(crate) enum CancelAttempt {
    /// The leg is terminal on the exchange: cancelled by us, or already
    /// filled/cancelled/rejected when the cancel arrived
    Settled(LegObservation),
    /// Cancel refused while the exchange still shows the order open
    Refused {
        observation: LegObservation,
        error: GatewayError,
    },
    Inconclusive(GatewayError),
}

impl OcoManager {
    /// Cancel a leg; when the exchange refuses, confirm the leg's real state
    pub(crate) async fn cancel_leg(&self, leg: &OrderLeg) -> CancelAttempt {
        let Some(id) = leg.exchange_order_id.as_deref() else {
            return CancelAttempt::Inconclusive(GatewayError::OrderNotFound(format!(
                "{} leg has no exchange order id",
                leg.kind
            )));
        };

        let label = format!("cancel {} leg {}", leg.kind, id);
        let refused = match self
            .retry
            .run(&label, || self.gateway.cancel_order(&leg.symbol, id))
            .await
        {
            Ok(ack) => {
                info!("{} leg {} cancel acknowledged ({})", leg.kind, id, ack.status);
                return CancelAttempt::Settled(LegObservation::from_cancel_ack(
                    &ack,
                    self.clock.now(),
                ));
            }
            Err(err) if err.is_transient() => return CancelAttempt::Inconclusive(err),
            Err(err) => err,
        };

        info!("{} refused ({}), confirming order state", label, refused);
        let label = format!("confirm {} leg {}", leg.kind, id);
        match self
            .retry
            .poll(&label, || self.gateway.get_order_status(&leg.symbol, id))
            .await
        {
            Ok(report) => {
                let observation = LegObservation::from_report(&report, self.clock.now());
                if observation.status.is_terminal() {
                    CancelAttempt::Settled(observation)
                } else {
                    CancelAttempt::Refused {
                        observation,
                        error: refused,
                    }
                }
            }
            Err(err) => CancelAttempt::Inconclusive(err),
        }
    }

    /// User cancellation of a whole set; each leg is handled independently
    pub(crate) async fn cancel_set(&self, set: &mut OcoOrderSet) -> Result<Vec<LegCancelReport>> {
        if set.status.is_terminal() {
            info!("OCO {}: already {}, nothing to cancel", set.group_id, set.status);
            return Ok(set.legs().into_iter().map(terminal_report).collect());
        }

        info!("OCO {}: cancelling both legs", set.group_id);
        for kind in [LegKind::TakeProfit, LegKind::StopLoss] {
            if set.leg(kind).is_live() {
                set.leg_mut(kind).cancel_requested = true;
            }
        }

        let (tp, sl) = tokio::join!(
            self.cancel_for_user(&set.take_profit),
            self.cancel_for_user(&set.stop_loss)
        );

        let mut reports = Vec::with_capacity(2);
        for (kind, attempt) in [(LegKind::TakeProfit, tp), (LegKind::StopLoss, sl)] {
            let outcome = match attempt {
                None => terminal_report(set.leg(kind)).outcome,
                Some(CancelAttempt::Settled(observation)) => {
                    set.leg_mut(kind).apply_observation(&observation);
                    match observation.status {
                        LegStatus::Cancelled => LegCancelOutcome::Cancelled,
                        status => LegCancelOutcome::AlreadyTerminal(status),
                    }
                }
                Some(CancelAttempt::Refused { observation, error }) => {
                    set.leg_mut(kind).apply_observation(&observation);
                    LegCancelOutcome::Failed(error.to_string())
                }
                Some(CancelAttempt::Inconclusive(err)) => LegCancelOutcome::Failed(err.to_string()),
            };
            if let LegCancelOutcome::Failed(reason) = &outcome {
                warn!("OCO {}: {} leg cancel failed: {}", set.group_id, kind, reason);
            }
            reports.push(LegCancelReport {
                kind,
                exchange_order_id: set.leg(kind).exchange_order_id.clone(),
                outcome,
            });
        }

        let now = self.clock.now();
        if set.rollback_pending {
            // A set that never became active ends failed, not cancelled
            if set.legs().iter().all(|leg| leg.is_terminal()) {
                set.rollback_pending = false;
                set.note("rollback completed by user cancel", now);
                set.transition(OcoStatus::Failed, now)?;
            }
            return Ok(reports);
        }
        match set.filled_legs().as_slice() {
            [_, _] => {
                let winner = record_race(set, None, now);
                set.resolve(winner, now)?;
            }
            [winner] => {
                info!(
                    "OCO {}: {} leg filled before the cancel",
                    set.group_id, winner
                );
                set.resolve(*winner, now)?;
            }
            _ if set.legs().iter().any(|leg| !leg.is_terminal()) => {
                set.note("user cancel left a leg in an unknown state", now);
                set.transition(OcoStatus::ReconciliationRequired, now)?;
            }
            _ => {
                set.note("cancelled by user", now);
                set.transition(OcoStatus::Cancelled, now)?;
            }
        }
        Ok(reports)
    }

    async fn cancel_for_user(&self, leg: &OrderLeg) -> Option<CancelAttempt> {
        if leg.is_live() {
            Some(self.cancel_leg(leg).await)
        } else {
            None
        }
    }
}

fn terminal_report(leg: &OrderLeg) -> LegCancelReport {
    LegCancelReport {
        kind: leg.kind,
        exchange_order_id: leg.exchange_order_id.clone(),
        outcome: match leg.exchange_order_id {
            None if !leg.is_terminal() => LegCancelOutcome::NotSubmitted,
            _ => LegCancelOutcome::AlreadyTerminal(leg.status),
        },
    }
}

/// Flag a both-filled set; returns the leg recorded as the winner
///
/// Without an explicit winner the leg with the earlier exchange update time
/// wins, falling back to take-profit.
pub(crate) fn record_race(
    set: &mut OcoOrderSet,
    winner: Option<LegKind>,
    now: Timestamp,
) -> LegKind {
    let tp_at = set.take_profit.exchange_updated_at;
    let sl_at = set.stop_loss.exchange_updated_at;
    let winner = winner.unwrap_or(match (tp_at, sl_at) {
        (Some(tp), Some(sl)) if sl < tp => LegKind::StopLoss,
        _ => LegKind::TakeProfit,
    });

    let detail = format!(
        "both legs filled: take-profit {} @ {:?}, stop-loss {} @ {:?}",
        set.take_profit.filled_quantity,
        set.take_profit.avg_price,
        set.stop_loss.filled_quantity,
        set.stop_loss.avg_price
    );
    error!(
        "OCO {}: RACE - {}; verify the {} position",
        set.group_id, detail, set.symbol
    );
    set.race = Some(RaceInconsistency {
        detected_at: now,
        take_profit_filled_at: tp_at,
        stop_loss_filled_at: sl_at,
        detail: detail.clone(),
    });
    set.note(detail, now);
    winner
}

/// Flag a set whose losing leg filled partly before it was cancelled
///
/// The position was closed by more than its size, so the set is reported
/// like a race even though only one leg filled completely.
pub(crate) fn record_partial_overfill(set: &mut OcoOrderSet, winner: LegKind, now: Timestamp) {
    let loser = set.leg(winner.sibling());
    let detail = format!(
        "{} leg filled {} after {} leg had already filled {} of {}",
        winner,
        set.leg(winner).filled_quantity,
        loser.kind,
        loser.filled_quantity,
        loser.quantity
    );
    error!(
        "OCO {}: OVERFILL - {}; verify the {} position",
        set.group_id, detail, set.symbol
    );
    set.race = Some(RaceInconsistency {
        detected_at: now,
        take_profit_filled_at: set.take_profit.exchange_updated_at,
        stop_loss_filled_at: set.stop_loss.exchange_updated_at,
        detail: detail.clone(),
    });
    set.note(detail, now);
}
