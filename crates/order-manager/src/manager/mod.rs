//! OCO Lifecycle Manager
//!
//! Places a take-profit/stop-loss pair, then hands the set to a dedicated
//! monitor task that polls both legs until exactly one outcome is reached.
//!
//! ```text
//! place_oco ──► validate ──► submit both legs (join) ──► Active ──► spawn monitor
//!                                    │                                  │
//!                                    └─ failure ─► rollback ─► Failed   │ poll / cancel cmd
//!                                                                       ▼
//!                            store ◄── snapshot ◄── Resolved | Cancelled | ReconciliationRequired
//! ```
//!
//! The monitor task is the single writer of an active set. Callers read
//! snapshots from the [`OrderRecordStore`] or subscribe to the monitor's
//! watch channel; user cancellation is sent to the monitor as a command.

mod cancel;
mod monitor;
mod submit;

pub use cancel::{LegCancelOutcome, LegCancelReport};

use dashmap::DashMap;
use log::{info, warn};
use oco_ports::{Clock, ExchangeGateway, GatewayError, OrderReport};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

use crate::config::ManagerConfig;
use crate::error::Result;
use crate::oco::{LegObservation, OcoOrderSet, OcoRequest, OcoStatus, OrderLeg};
use crate::retry::RetryPolicy;
use crate::store::OrderRecordStore;

pub(crate) enum MonitorCommand {
    Cancel {
        reply: oneshot::Sender<Result<Vec<LegCancelReport>>>,
    },
}

#[derive(Clone)]
struct MonitorHandle {
    commands: mpsc::Sender<MonitorCommand>,
    snapshots: watch::Receiver<OcoOrderSet>,
}

/// What the exchange says about a leg during reconciliation
enum Refresh {
    Skipped,
    Observed(OrderReport),
    Absent,
    Inconclusive(GatewayError),
}

#[derive(Clone)]
pub struct OcoManager {
    gateway: Arc<dyn ExchangeGateway>,
    clock: Arc<dyn Clock>,
    store: Arc<OrderRecordStore>,
    config: ManagerConfig,
    retry: RetryPolicy,
    monitors: Arc<DashMap<Uuid, MonitorHandle>>,
}

impl OcoManager {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        clock: Arc<dyn Clock>,
        config: ManagerConfig,
    ) -> Self {
        Self::with_store(gateway, clock, Arc::new(OrderRecordStore::new()), config)
    }

    /// Build a manager over an existing (e.g. loaded) store
    pub fn with_store(
        gateway: Arc<dyn ExchangeGateway>,
        clock: Arc<dyn Clock>,
        store: Arc<OrderRecordStore>,
        config: ManagerConfig,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            gateway,
            clock,
            store,
            config,
            retry,
            monitors: Arc::new(DashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<OrderRecordStore> {
        &self.store
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Validate, submit both legs and start monitoring
    ///
    /// Invalid requests fail before any gateway call. A submission failure
    /// is not an error: the returned snapshot is `Failed` (or
    /// `ReconciliationRequired` when the rollback itself was inconclusive).
    pub async fn place_oco(&self, request: OcoRequest) -> Result<OcoOrderSet> {
        request.validate()?;

        let mut set = OcoOrderSet::new(&request, self.config.reduce_only_legs, self.clock.now());
        let group_id = self.store.register(set.clone())?;
        info!(
            "OCO {}: placing {} {} {} TP {} / SL {}",
            group_id,
            request.side,
            request.quantity,
            request.symbol,
            request.take_profit,
            request.stop_loss
        );

        self.submit_legs(&mut set).await?;
        self.store.update(set.clone())?;

        if set.status == OcoStatus::Active {
            self.spawn_monitor(set.clone());
        }
        Ok(set)
    }

    /// Latest snapshot of a set
    pub fn get_oco_status(&self, group_id: Uuid) -> Result<OcoOrderSet> {
        self.store.lookup_by_group_id(group_id)
    }

    /// All sets this manager knows about, oldest first
    pub fn list(&self) -> Vec<OcoOrderSet> {
        self.store.all()
    }

    pub fn is_monitoring(&self, group_id: Uuid) -> bool {
        self.monitors.contains_key(&group_id)
    }

    /// Live snapshots of a monitored set; `None` when no monitor runs
    pub fn subscribe(&self, group_id: Uuid) -> Option<watch::Receiver<OcoOrderSet>> {
        self.monitors
            .get(&group_id)
            .map(|handle| handle.snapshots.clone())
    }

    /// Wait until the set leaves `Active`, then return its snapshot
    pub async fn wait_for_outcome(&self, group_id: Uuid) -> Result<OcoOrderSet> {
        if let Some(mut snapshots) = self.subscribe(group_id) {
            // An error means the monitor exited, after writing its final state
            let _ = snapshots
                .wait_for(|set| set.status != OcoStatus::Active)
                .await;
        }
        self.get_oco_status(group_id)
    }

    /// Cancel both legs of a set, each independently
    ///
    /// A monitored set is cancelled by its monitor task; otherwise the
    /// caller's task does the work. Terminal sets are reported without
    /// touching the exchange.
    pub async fn cancel_oco(&self, group_id: Uuid) -> Result<Vec<LegCancelReport>> {
        let handle = self.monitors.get(&group_id).map(|h| h.clone());
        if let Some(handle) = handle {
            let (reply, response) = oneshot::channel();
            if handle
                .commands
                .send(MonitorCommand::Cancel { reply })
                .await
                .is_ok()
            {
                if let Ok(reports) = response.await {
                    return reports;
                }
            }
            info!("OCO {}: monitor finished before the cancel was handled", group_id);
        }

        let mut set = self.store.lookup_by_group_id(group_id)?;
        let reports = self.cancel_set(&mut set).await?;
        self.store.update(set)?;
        Ok(reports)
    }

    /// Re-derive a set's state from the exchange
    ///
    /// Used for `ReconciliationRequired` sets and for sets loaded from disk
    /// with no running monitor. Both legs are re-queried (by exchange id, or
    /// by client id when the exchange id was never learned), the monitoring
    /// rules are applied once, and monitoring restarts if the set is still
    /// live. A set whose rollback never completed is rolled back instead and
    /// ends `Failed`.
    pub async fn reconcile(&self, group_id: Uuid) -> Result<OcoOrderSet> {
        let mut set = self.store.lookup_by_group_id(group_id)?;
        if set.status.is_terminal() || self.is_monitoring(group_id) {
            return Ok(set);
        }
        info!("OCO {}: reconciling {} against the exchange", group_id, set.status);

        let (tp, sl) = tokio::join!(
            self.refresh_leg(&set.take_profit),
            self.refresh_leg(&set.stop_loss)
        );

        let now = self.clock.now();
        let mut inconclusive = Vec::new();
        for (kind, refresh) in [
            (set.take_profit.kind, tp),
            (set.stop_loss.kind, sl),
        ] {
            match refresh {
                Refresh::Skipped => {}
                Refresh::Observed(report) => {
                    let leg = set.leg_mut(kind);
                    leg.assign_exchange_id(&report.exchange_order_id)?;
                    leg.apply_observation(&LegObservation::from_report(&report, now));
                }
                Refresh::Absent => {
                    set.leg_mut(kind)
                        .apply_observation(&LegObservation::absent(now));
                    set.note(format!("{kind} leg not found on the exchange"), now);
                }
                Refresh::Inconclusive(err) => {
                    warn!("OCO {}: {} leg still inconclusive: {}", group_id, kind, err);
                    inconclusive.push(kind);
                }
            }
        }

        if !inconclusive.is_empty() {
            if set.status != OcoStatus::ReconciliationRequired {
                set.transition(OcoStatus::ReconciliationRequired, now)?;
            }
            set.note("reconciliation inconclusive", now);
            self.store.update(set.clone())?;
            return Ok(set);
        }

        if set.rollback_pending {
            self.resume_rollback(&mut set).await?;
            self.store.update(set.clone())?;
            info!("OCO {}: reconciled to {}", group_id, set.outcome());
            return Ok(set);
        }

        set.transition(OcoStatus::Active, now)?;
        self.evaluate(&mut set).await?;
        self.store.update(set.clone())?;

        if set.status == OcoStatus::Active {
            self.spawn_monitor(set.clone());
        }
        info!("OCO {}: reconciled to {}", group_id, set.outcome());
        Ok(set)
    }

    /// Reconcile every non-terminal set that has no running monitor
    pub async fn reconcile_all(&self) -> Vec<Result<OcoOrderSet>> {
        let pending: Vec<Uuid> = self
            .store
            .all()
            .into_iter()
            .filter(|set| !set.status.is_terminal() && !self.is_monitoring(set.group_id))
            .map(|set| set.group_id)
            .collect();

        let mut results = Vec::with_capacity(pending.len());
        for group_id in pending {
            results.push(self.reconcile(group_id).await);
        }
        results
    }

    async fn refresh_leg(&self, leg: &OrderLeg) -> Refresh {
        if leg.is_terminal() {
            return Refresh::Skipped;
        }
        match leg.exchange_order_id.as_deref() {
            Some(id) => {
                let label = format!("status {} leg {}", leg.kind, id);
                match self
                    .retry
                    .poll(&label, || self.gateway.get_order_status(&leg.symbol, id))
                    .await
                {
                    Ok(report) => Refresh::Observed(report),
                    Err(err) => Refresh::Inconclusive(err),
                }
            }
            None => {
                let label = format!("lookup {} leg {}", leg.kind, leg.client_order_id);
                match self
                    .retry
                    .run(&label, || {
                        self.gateway
                            .find_order_by_client_id(&leg.symbol, &leg.client_order_id)
                    })
                    .await
                {
                    Ok(Some(report)) => Refresh::Observed(report),
                    Ok(None) => Refresh::Absent,
                    Err(err) => Refresh::Inconclusive(err),
                }
            }
        }
    }
}
