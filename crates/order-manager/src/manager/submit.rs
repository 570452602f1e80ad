//! Leg submission and rollback

use log::{error, info, warn};
use oco_core::{OrderStatus, Timestamp};
use oco_ports::{GatewayError, OrderAck};
use rust_decimal::Decimal;
use tokio::time::sleep;

use super::OcoManager;
use super::cancel::CancelAttempt;
use crate::error::Result;
use crate::oco::{LegKind, LegObservation, LegStatus, OcoOrderSet, OcoStatus, OrderLeg};

/// Venue code for a reused client order id
const DUPLICATE_CLIENT_ID: i64 = -4116;

#[derive(Debug, Clone)]
pub(crate) enum SubmitOutcome {
    Accepted(OrderAck),
    /// Definitively refused by the exchange
    Rejected(GatewayError),
    /// Could not tell whether the order landed
    Inconclusive(GatewayError),
}

impl OcoManager {
    /// Submit one leg, retrying inconclusive attempts
    ///
    /// Before every retry the exchange is asked whether an order with the
    /// leg's client id already exists, and that order is adopted instead of
    /// submitting a second one.
    pub(crate) async fn submit_leg(&self, leg: &OrderLeg) -> SubmitOutcome {
        let request = leg.to_request();
        let mut last_err = GatewayError::Timeout;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                sleep(self.retry.delay(attempt - 1, &last_err)).await;
                match self
                    .retry
                    .once(
                        self.gateway
                            .find_order_by_client_id(&leg.symbol, &leg.client_order_id),
                    )
                    .await
                {
                    Ok(Some(report)) => {
                        info!(
                            "{} leg {} found on exchange as {}, adopting",
                            leg.kind, leg.client_order_id, report.exchange_order_id
                        );
                        return SubmitOutcome::Accepted(OrderAck {
                            exchange_order_id: report.exchange_order_id,
                            client_order_id: report.client_order_id,
                            status: report.status,
                        });
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(
                            "{} leg {} lookup inconclusive: {}",
                            leg.kind, leg.client_order_id, err
                        );
                        last_err = err;
                        continue;
                    }
                }
            }

            match self.retry.once(self.gateway.submit_order(&request)).await {
                Ok(ack) => {
                    info!(
                        "{} leg {} accepted as {}",
                        leg.kind, leg.client_order_id, ack.exchange_order_id
                    );
                    return SubmitOutcome::Accepted(ack);
                }
                Err(err) if err.is_transient() => {
                    warn!(
                        "{} leg {} submit attempt {} inconclusive: {}",
                        leg.kind,
                        leg.client_order_id,
                        attempt + 1,
                        err
                    );
                    last_err = err;
                }
                // An earlier attempt landed after all
                Err(GatewayError::Rejected { code, message })
                    if attempt > 0 && code == DUPLICATE_CLIENT_ID =>
                {
                    last_err = GatewayError::Rejected { code, message };
                }
                Err(err) => {
                    error!("{} leg {} rejected: {}", leg.kind, leg.client_order_id, err);
                    return SubmitOutcome::Rejected(err);
                }
            }
        }

        SubmitOutcome::Inconclusive(last_err)
    }

    /// Submit both legs concurrently and settle the set's initial status
    pub(crate) async fn submit_legs(&self, set: &mut OcoOrderSet) -> Result<()> {
        let (tp, sl) = tokio::join!(
            self.submit_leg(&set.take_profit),
            self.submit_leg(&set.stop_loss)
        );

        let now = self.clock.now();
        record_submission(set, LegKind::TakeProfit, &tp, now)?;
        record_submission(set, LegKind::StopLoss, &sl, now)?;

        let both_accepted = matches!(
            (&tp, &sl),
            (SubmitOutcome::Accepted(_), SubmitOutcome::Accepted(_))
        );
        if both_accepted {
            set.transition(OcoStatus::Active, now)?;
            Ok(())
        } else {
            self.rollback(set, [tp, sl]).await
        }
    }

    /// Undo a half-placed set so no unmonitored leg stays live
    async fn rollback(&self, set: &mut OcoOrderSet, outcomes: [SubmitOutcome; 2]) -> Result<()> {
        warn!("OCO {}: submission failed, rolling back", set.group_id);
        let mut unresolved = Vec::new();

        for (kind, outcome) in [LegKind::TakeProfit, LegKind::StopLoss]
            .into_iter()
            .zip(outcomes)
        {
            match outcome {
                SubmitOutcome::Rejected(_) => continue,
                SubmitOutcome::Accepted(_) => {}
                SubmitOutcome::Inconclusive(_) => {
                    if !self.locate_leg(set, kind).await? {
                        unresolved.push(kind);
                        continue;
                    }
                }
            }
            if !self.retire_leg(set, kind).await {
                unresolved.push(kind);
            }
        }

        finish_rollback(set, &unresolved, self.clock.now())
    }

    /// Finish a rollback that an earlier pass could not confirm
    ///
    /// Called by reconciliation once both legs' exchange state is known
    /// again. Whatever is still live is cancelled; the set never becomes
    /// `Active`.
    pub(crate) async fn resume_rollback(&self, set: &mut OcoOrderSet) -> Result<()> {
        info!("OCO {}: resuming interrupted rollback", set.group_id);
        let mut unresolved = Vec::new();
        for kind in [LegKind::TakeProfit, LegKind::StopLoss] {
            if !self.retire_leg(set, kind).await {
                unresolved.push(kind);
            }
        }
        finish_rollback(set, &unresolved, self.clock.now())
    }

    /// Cancel one leg of a failed set; returns whether the leg is settled
    async fn retire_leg(&self, set: &mut OcoOrderSet, kind: LegKind) -> bool {
        if !set.leg(kind).is_live() {
            if set.leg(kind).status == LegStatus::Filled {
                set.note(format!("{kind} leg filled before rollback"), self.clock.now());
            }
            return true;
        }

        set.leg_mut(kind).cancel_requested = true;
        let attempt = self.cancel_leg(set.leg(kind)).await;
        let now = self.clock.now();
        match attempt {
            CancelAttempt::Settled(observation) => {
                set.leg_mut(kind).apply_observation(&observation);
                info!(
                    "OCO {}: rolled back {} leg ({})",
                    set.group_id,
                    kind,
                    set.leg(kind).status
                );
                if observation.status == LegStatus::Filled {
                    set.note(format!("{kind} leg filled before rollback"), now);
                }
                true
            }
            CancelAttempt::Refused { observation, error } => {
                set.leg_mut(kind).apply_observation(&observation);
                error!(
                    "OCO {}: rollback of {} leg refused: {}",
                    set.group_id, kind, error
                );
                false
            }
            CancelAttempt::Inconclusive(err) => {
                error!(
                    "OCO {}: rollback of {} leg inconclusive: {}",
                    set.group_id, kind, err
                );
                false
            }
        }
    }

    /// Best-effort lookup of a leg whose submission was inconclusive;
    /// returns whether its exchange state is now known
    async fn locate_leg(&self, set: &mut OcoOrderSet, kind: LegKind) -> Result<bool> {
        let leg = set.leg(kind);
        let label = format!("lookup {} leg {}", kind, leg.client_order_id);
        let found = self
            .retry
            .run(&label, || {
                self.gateway
                    .find_order_by_client_id(&leg.symbol, &leg.client_order_id)
            })
            .await;

        let now = self.clock.now();
        match found {
            Ok(Some(report)) => {
                let leg = set.leg_mut(kind);
                leg.assign_exchange_id(&report.exchange_order_id)?;
                leg.apply_observation(&LegObservation::from_report(&report, now));
                Ok(true)
            }
            Ok(None) => {
                set.leg_mut(kind)
                    .apply_observation(&LegObservation::absent(now));
                set.note(format!("{kind} leg never reached the exchange"), now);
                Ok(true)
            }
            Err(err) => {
                warn!("OCO {}: {} leg lookup failed: {}", set.group_id, kind, err);
                Ok(false)
            }
        }
    }
}

fn finish_rollback(set: &mut OcoOrderSet, unresolved: &[LegKind], now: Timestamp) -> Result<()> {
    if unresolved.is_empty() {
        set.rollback_pending = false;
        return set.transition(OcoStatus::Failed, now);
    }
    for kind in unresolved {
        set.note(format!("{kind} leg may still be live after rollback"), now);
    }
    set.rollback_pending = true;
    set.transition(OcoStatus::ReconciliationRequired, now)
}

fn record_submission(
    set: &mut OcoOrderSet,
    kind: LegKind,
    outcome: &SubmitOutcome,
    now: Timestamp,
) -> Result<()> {
    match outcome {
        SubmitOutcome::Accepted(ack) => {
            let leg = set.leg_mut(kind);
            leg.assign_exchange_id(&ack.exchange_order_id)?;
            let filled_quantity = if ack.status == OrderStatus::Filled {
                leg.quantity
            } else {
                Decimal::ZERO
            };
            leg.apply_observation(&LegObservation {
                status: ack.status.into(),
                filled_quantity,
                avg_price: None,
                exchange_updated_at: None,
                observed_at: now,
            });
        }
        SubmitOutcome::Rejected(err) => {
            set.leg_mut(kind).apply_observation(&LegObservation {
                status: LegStatus::Rejected,
                filled_quantity: Decimal::ZERO,
                avg_price: None,
                exchange_updated_at: None,
                observed_at: now,
            });
            set.note(format!("{kind} leg rejected: {err}"), now);
        }
        SubmitOutcome::Inconclusive(err) => {
            set.leg_mut(kind).mark_unknown();
            set.note(format!("{kind} leg submission inconclusive: {err}"), now);
        }
    }
    Ok(())
}
