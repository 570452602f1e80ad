//! Per-set monitoring task

use log::{error, info, warn};
use oco_ports::{GatewayResult, OrderReport};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep};

use super::cancel::{CancelAttempt, record_partial_overfill, record_race};
use super::{MonitorCommand, MonitorHandle, OcoManager};
use crate::error::Result;
use crate::oco::{Applied, LegKind, LegObservation, LegStatus, OcoOrderSet, OcoStatus, OrderLeg};

const COMMAND_BUFFER: usize = 4;

/// Owns one active set until it leaves `Active`
struct Monitor {
    manager: OcoManager,
    set: OcoOrderSet,
    commands: mpsc::Receiver<MonitorCommand>,
    snapshots: watch::Sender<OcoOrderSet>,
    /// Consecutive polls per leg that produced no definitive status
    inconclusive: HashMap<LegKind, u32>,
    deadline: Option<Instant>,
}

impl OcoManager {
    pub(super) fn spawn_monitor(&self, set: OcoOrderSet) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(set.clone());
        self.monitors.insert(
            set.group_id,
            MonitorHandle {
                commands: command_tx,
                snapshots: snapshot_rx,
            },
        );

        let monitor = Monitor {
            manager: self.clone(),
            set,
            commands: command_rx,
            snapshots: snapshot_tx,
            inconclusive: HashMap::new(),
            deadline: self.config.monitor_deadline.map(|d| Instant::now() + d),
        };
        tokio::spawn(monitor.run());
    }

    async fn observe_leg(&self, leg: &OrderLeg) -> Option<GatewayResult<OrderReport>> {
        if leg.is_terminal() {
            return None;
        }
        let id = leg.exchange_order_id.as_deref()?;
        let label = format!("status {} leg {}", leg.kind, id);
        Some(
            self.retry
                .poll(&label, || self.gateway.get_order_status(&leg.symbol, id))
                .await,
        )
    }

    /// Apply the monitoring rules to an `Active` set once
    ///
    /// - one leg filled: cancel the sibling, then resolve (or flag the race
    ///   when the sibling filled too, even partly)
    /// - both legs filled: race, earlier exchange update wins
    /// - one leg cancelled or rejected externally: degraded, keep going
    /// - both legs gone without a fill: cancelled
    pub(crate) async fn evaluate(&self, set: &mut OcoOrderSet) -> Result<()> {
        if set.status != OcoStatus::Active {
            return Ok(());
        }
        let now = self.clock.now();

        match set.filled_legs().as_slice() {
            [_, _] => {
                let winner = record_race(set, None, now);
                set.resolve(winner, now)?;
            }
            [winner] => {
                let winner = *winner;
                self.settle_winner(set, winner).await?;
            }
            _ => {
                let lost: Vec<LegKind> = set
                    .legs()
                    .into_iter()
                    .filter(|leg| {
                        matches!(leg.status, LegStatus::Cancelled | LegStatus::Rejected)
                    })
                    .map(|leg| leg.kind)
                    .collect();

                match lost.as_slice() {
                    [_, _] => {
                        warn!(
                            "OCO {}: both legs cancelled or rejected without a fill",
                            set.group_id
                        );
                        set.note("both legs ended without a fill", now);
                        set.transition(OcoStatus::Cancelled, now)?;
                    }
                    [kind] if set.degraded.is_none() => {
                        let kind = *kind;
                        let leg = set.leg(kind);
                        warn!(
                            "OCO {}: {} leg {} {} outside this client; {} leg keeps protecting the position",
                            set.group_id,
                            kind,
                            leg.exchange_order_id.as_deref().unwrap_or("-"),
                            leg.status,
                            kind.sibling()
                        );
                        let note = format!("degraded: {} leg {}", kind, leg.status);
                        set.degraded = Some(kind);
                        set.note(note, now);
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// One leg filled: drive the sibling out and settle the set
    async fn settle_winner(&self, set: &mut OcoOrderSet, winner: LegKind) -> Result<()> {
        let sibling = winner.sibling();
        info!(
            "OCO {}: {} leg filled {} @ {:?}",
            set.group_id,
            winner,
            set.leg(winner).filled_quantity,
            set.leg(winner).avg_price
        );

        if set.leg(sibling).is_live() {
            set.leg_mut(sibling).cancel_requested = true;
            match self.cancel_leg(set.leg(sibling)).await {
                CancelAttempt::Settled(observation) => {
                    set.leg_mut(sibling).apply_observation(&observation);
                }
                CancelAttempt::Refused { observation, error } => {
                    warn!(
                        "OCO {}: cancel of {} leg refused while still open: {}",
                        set.group_id, sibling, error
                    );
                    set.leg_mut(sibling).apply_observation(&observation);
                }
                CancelAttempt::Inconclusive(err) => {
                    warn!(
                        "OCO {}: cancel of {} leg inconclusive: {}",
                        set.group_id, sibling, err
                    );
                }
            }
        }

        let now = self.clock.now();
        match set.leg(sibling).status {
            LegStatus::Filled => {
                record_race(set, Some(winner), now);
                set.resolve(winner, now)?;
            }
            LegStatus::Cancelled | LegStatus::Rejected => {
                if set.leg(sibling).filled_quantity > Decimal::ZERO {
                    record_partial_overfill(set, winner, now);
                }
                set.resolve(winner, now)?;
                info!(
                    "OCO {}: resolved by {} leg, {} leg {}",
                    set.group_id,
                    winner,
                    sibling,
                    set.leg(sibling).status
                );
            }
            status => {
                error!(
                    "OCO {}: {} leg filled but {} leg is {}; needs reconciliation",
                    set.group_id, winner, sibling, status
                );
                set.resolution = Some(winner);
                set.note(
                    format!("{winner} leg filled, {sibling} leg state unknown after cancel"),
                    now,
                );
                set.transition(OcoStatus::ReconciliationRequired, now)?;
            }
        }
        Ok(())
    }
}

impl Monitor {
    async fn run(mut self) {
        let group_id = self.set.group_id;
        let poll_interval = self.manager.config.poll_interval;
        info!("OCO {}: monitoring every {:?}", group_id, poll_interval);

        // Legs can fill on arrival; settle those before the first wait
        self.evaluate().await;

        while self.set.status == OcoStatus::Active {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(MonitorCommand::Cancel { reply }) => {
                        let reports = self.manager.cancel_set(&mut self.set).await;
                        self.publish();
                        let _ = reply.send(reports);
                    }
                    None => break,
                },
                _ = sleep(poll_interval) => self.tick().await,
            }
        }

        self.manager.monitors.remove(&group_id);
        info!("OCO {}: monitoring stopped, outcome {}", group_id, self.set.outcome());
    }

    async fn tick(&mut self) {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            warn!("OCO {}: monitor deadline elapsed", self.set.group_id);
            self.give_up("monitor deadline elapsed without an outcome".to_string());
            self.publish();
            return;
        }

        let (tp, sl) = tokio::join!(
            self.manager.observe_leg(&self.set.take_profit),
            self.manager.observe_leg(&self.set.stop_loss)
        );

        let now = self.manager.clock.now();
        for (kind, polled) in [(LegKind::TakeProfit, tp), (LegKind::StopLoss, sl)] {
            match polled {
                None => {}
                Some(Ok(report)) => {
                    self.inconclusive.remove(&kind);
                    let observation = LegObservation::from_report(&report, now);
                    let leg = self.set.leg_mut(kind);
                    if leg.apply_observation(&observation) == Applied::Changed {
                        info!(
                            "OCO {}: {} leg {} -> {}",
                            self.set.group_id, kind, report.exchange_order_id, observation.status
                        );
                    }
                }
                Some(Err(err)) => {
                    let count = self.inconclusive.entry(kind).or_insert(0);
                    *count += 1;
                    warn!(
                        "OCO {}: {} leg poll inconclusive ({}/{}): {}",
                        self.set.group_id,
                        kind,
                        count,
                        self.manager.config.max_inconclusive_polls,
                        err
                    );
                }
            }
        }

        self.evaluate().await;

        if self.set.status == OcoStatus::Active {
            let limit = self.manager.config.max_inconclusive_polls;
            let exhausted = [LegKind::TakeProfit, LegKind::StopLoss]
                .into_iter()
                .find(|kind| self.inconclusive.get(kind).copied().unwrap_or(0) >= limit);
            if let Some(kind) = exhausted {
                self.give_up(format!(
                    "no definitive status for {kind} leg after {limit} polls"
                ));
            }
        }
        self.publish();
    }

    async fn evaluate(&mut self) {
        if let Err(err) = self.manager.evaluate(&mut self.set).await {
            error!("OCO {}: {}", self.set.group_id, err);
            self.give_up(err.to_string());
        }
        self.publish();
    }

    /// Stop monitoring without guessing; legs keep their last-known state
    fn give_up(&mut self, reason: String) {
        let now = self.manager.clock.now();
        self.set.note(reason, now);
        if let Err(err) = self
            .set
            .transition(OcoStatus::ReconciliationRequired, now)
        {
            error!("OCO {}: {}", self.set.group_id, err);
        }
    }

    /// Store first, then notify subscribers
    fn publish(&self) {
        if let Err(err) = self.manager.store.update(self.set.clone()) {
            error!("OCO {}: failed to store snapshot: {}", self.set.group_id, err);
        }
        self.snapshots.send_replace(self.set.clone());
    }
}
