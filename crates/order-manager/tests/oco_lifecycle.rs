//! OCO lifecycle integration tests
//!
//! Drives the manager against the in-memory venue:
//! 1. Placement, fills and sibling cancellation
//! 2. Submission failures and rollback
//! 3. Races, external cancels and inconclusive polling
//! 4. User cancellation, persistence and reconciliation
//!
//! The in-memory venue never fills partially, so the overfill case runs
//! against a small scripted gateway at the bottom of the file.

use async_trait::async_trait;
use chrono::Utc;
use oco_clock::{Clock, ManualClock, SystemClock};
use oco_core::{
    AssetBalance, OrderRequest, OrderStatus, OrderType, PositionSnapshot, Price, Side,
};
use oco_gateway::{FaultRule, SimFault, SimOperation, SimulatedExchange};
use oco_ports::{CancelAck, ExchangeGateway, GatewayError, GatewayResult, OrderAck, OrderReport};
use oco_order_manager::{
    Error, LegCancelOutcome, LegKind, LegStatus, ManagerConfig, OcoManager, OcoOutcome,
    OcoRequest, OcoStatus, OrderRecordStore,
};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const SYMBOL: &str = "BTCUSDT";

fn config() -> ManagerConfig {
    ManagerConfig {
        poll_interval: Duration::from_secs(1),
        call_timeout: Duration::from_secs(2),
        max_retries: 3,
        retry_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_secs(1),
        max_inconclusive_polls: 3,
        ..ManagerConfig::default()
    }
}

fn venue() -> Arc<SimulatedExchange> {
    Arc::new(
        SimulatedExchange::new()
            .with_price(SYMBOL, dec!(67000))
            .with_position(SYMBOL, dec!(0.01), dec!(66000)),
    )
}

fn setup_with(config: ManagerConfig) -> (Arc<SimulatedExchange>, OcoManager) {
    let _ = env_logger::try_init();
    let sim = venue();
    let manager = OcoManager::new(sim.clone(), Arc::new(SystemClock::new()), config);
    (sim, manager)
}

fn setup() -> (Arc<SimulatedExchange>, OcoManager) {
    setup_with(config())
}

/// Close a long 0.01 BTC: take profit at 70000, stop out at 65000
fn long_exit() -> OcoRequest {
    OcoRequest::new(SYMBOL, Side::Sell, dec!(0.01), dec!(70000), dec!(65000))
}

fn exchange_id(id: &Option<String>) -> String {
    id.clone().expect("leg has an exchange id")
}

// ============================================================================
// Placement and resolution
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_take_profit_fill_resolves_and_cancels_stop_loss() {
    let (sim, manager) = setup();

    let set = manager.place_oco(long_exit()).await.unwrap();
    assert_eq!(set.status, OcoStatus::Active);
    assert_eq!(set.take_profit.status, LegStatus::Open);
    assert_eq!(set.stop_loss.status, LegStatus::Open);
    assert_eq!(sim.live_orders().len(), 2);
    assert!(manager.is_monitoring(set.group_id));

    sim.set_price(SYMBOL, dec!(70100));
    let done = manager.wait_for_outcome(set.group_id).await.unwrap();

    assert_eq!(done.status, OcoStatus::Resolved);
    assert_eq!(done.outcome(), OcoOutcome::Resolved(LegKind::TakeProfit));
    assert_eq!(done.resolution, Some(LegKind::TakeProfit));
    assert_eq!(done.take_profit.status, LegStatus::Filled);
    assert_eq!(done.take_profit.avg_price, Some(dec!(70000)));
    assert_eq!(done.stop_loss.status, LegStatus::Cancelled);
    assert!(done.race.is_none());
    assert!(sim.live_orders().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_loss_fill_resolves() {
    let (sim, manager) = setup();
    let set = manager.place_oco(long_exit()).await.unwrap();

    sim.set_price(SYMBOL, dec!(64800));
    let done = manager.wait_for_outcome(set.group_id).await.unwrap();

    assert_eq!(done.outcome(), OcoOutcome::Resolved(LegKind::StopLoss));
    assert_eq!(done.take_profit.status, LegStatus::Cancelled);
    assert!(done.take_profit.cancel_requested);
    let position = sim.get_position(SYMBOL).await.unwrap();
    assert!(position.is_flat());
}

#[tokio::test(start_paused = true)]
async fn test_resolved_snapshot_is_stable() {
    let (sim, manager) = setup();
    let set = manager.place_oco(long_exit()).await.unwrap();
    sim.set_price(SYMBOL, dec!(70100));
    manager.wait_for_outcome(set.group_id).await.unwrap();

    let first = manager.get_oco_status(set.group_id).unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    let second = manager.get_oco_status(set.group_id).unwrap();
    let third = manager.get_oco_status(set.group_id).unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert!(!manager.is_monitoring(set.group_id));
}

#[tokio::test(start_paused = true)]
async fn test_timestamps_come_from_the_injected_clock() {
    let _ = env_logger::try_init();
    let sim = venue();
    let clock = ManualClock::starting_now();
    let manager = OcoManager::new(sim.clone(), clock.clone(), config());

    let set = manager.place_oco(long_exit()).await.unwrap();
    assert_eq!(set.created_at, clock.now());

    clock.advance(chrono::Duration::seconds(30));
    sim.set_price(SYMBOL, dec!(70100));
    let done = manager.wait_for_outcome(set.group_id).await.unwrap();

    assert_eq!(done.created_at, set.created_at);
    assert_eq!(done.updated_at, clock.now());
    assert_eq!(done.take_profit.last_observed_at, Some(clock.now()));
}

#[tokio::test(start_paused = true)]
async fn test_order_visibility_lag_is_tolerated() {
    let (sim, manager) = setup();
    sim.set_visibility_lag(2);

    let set = manager.place_oco(long_exit()).await.unwrap();
    sim.set_price(SYMBOL, dec!(70100));
    let done = manager.wait_for_outcome(set.group_id).await.unwrap();

    assert_eq!(done.outcome(), OcoOutcome::Resolved(LegKind::TakeProfit));
}

#[tokio::test(start_paused = true)]
async fn test_independent_sets_on_one_symbol() {
    let (sim, manager) = setup();
    let near = manager.place_oco(long_exit()).await.unwrap();
    let far = manager
        .place_oco(OcoRequest::new(
            SYMBOL,
            Side::Sell,
            dec!(0.005),
            dec!(72000),
            dec!(60000),
        ))
        .await
        .unwrap();

    sim.set_price(SYMBOL, dec!(70100));
    let done = manager.wait_for_outcome(near.group_id).await.unwrap();
    assert_eq!(done.outcome(), OcoOutcome::Resolved(LegKind::TakeProfit));

    let still_open = manager.get_oco_status(far.group_id).unwrap();
    assert_eq!(still_open.status, OcoStatus::Active);
    assert_eq!(sim.live_orders().len(), 2);
    assert_eq!(manager.list().len(), 2);
}

// ============================================================================
// Validation and submission failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_inverted_prices_rejected_before_any_call() {
    let (sim, manager) = setup();

    let request = OcoRequest::new(SYMBOL, Side::Sell, dec!(0.01), dec!(64000), dec!(65000));
    let err = manager.place_oco(request).await.unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(sim.total_calls(), 0);
    assert!(manager.store().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_loss_submit_timeout_rolls_back_take_profit() {
    let (sim, manager) = setup();
    sim.inject(
        FaultRule::new(SimOperation::Submit, SimFault::Timeout)
            .for_order_type(OrderType::StopMarket),
    );

    let set = manager.place_oco(long_exit()).await.unwrap();

    assert_eq!(set.status, OcoStatus::Failed);
    assert_eq!(set.outcome(), OcoOutcome::Failed);
    assert_eq!(set.take_profit.status, LegStatus::Cancelled);
    assert!(set.take_profit.cancel_requested);
    assert!(set.stop_loss.exchange_order_id.is_none());
    assert!(sim.live_orders().is_empty());
    // one take-profit submit, first stop-loss submit plus three retries
    assert_eq!(sim.calls(SimOperation::Submit), 5);
    assert!(!manager.is_monitoring(set.group_id));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_take_profit_rolls_back_stop_loss() {
    let (sim, manager) = setup();
    sim.inject(
        FaultRule::new(
            SimOperation::Submit,
            SimFault::Reject("ReduceOnly Order is rejected.".to_string()),
        )
        .for_order_type(OrderType::Limit),
    );

    let set = manager.place_oco(long_exit()).await.unwrap();

    assert_eq!(set.status, OcoStatus::Failed);
    assert_eq!(set.take_profit.status, LegStatus::Rejected);
    assert_eq!(set.stop_loss.status, LegStatus::Cancelled);
    assert!(sim.live_orders().is_empty());
    assert_eq!(sim.calls(SimOperation::Submit), 2);
}

#[tokio::test(start_paused = true)]
async fn test_lost_submit_response_adopts_existing_order() {
    let (sim, manager) = setup();
    sim.inject(
        FaultRule::new(SimOperation::Submit, SimFault::TimeoutAfterAccept)
            .for_order_type(OrderType::StopMarket)
            .times(1),
    );

    let set = manager.place_oco(long_exit()).await.unwrap();

    assert_eq!(set.status, OcoStatus::Active);
    assert_eq!(sim.orders().len(), 2);
    let sl_id = exchange_id(&set.stop_loss.exchange_order_id);
    assert_eq!(
        sim.order_id_for_client(&set.stop_loss.client_order_id),
        Some(sl_id)
    );
    assert_eq!(sim.calls(SimOperation::FindByClientId), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_finishes_interrupted_rollback() {
    let (sim, manager) = setup();
    sim.inject(
        FaultRule::new(
            SimOperation::Submit,
            SimFault::Reject("Order would immediately trigger.".to_string()),
        )
        .for_order_type(OrderType::StopMarket),
    );
    sim.inject(
        FaultRule::new(SimOperation::Cancel, SimFault::ServerError)
            .for_order_type(OrderType::Limit),
    );

    let set = manager.place_oco(long_exit()).await.unwrap();
    assert_eq!(set.status, OcoStatus::ReconciliationRequired);
    assert!(set.rollback_pending);
    assert_eq!(set.take_profit.status, LegStatus::Open);
    assert_eq!(set.stop_loss.status, LegStatus::Rejected);
    assert_eq!(sim.live_orders().len(), 1);
    assert!(!manager.is_monitoring(set.group_id));

    sim.clear_faults();
    let reconciled = manager.reconcile(set.group_id).await.unwrap();

    // The surviving leg is cancelled, never monitored as a one-legged set
    assert_eq!(reconciled.status, OcoStatus::Failed);
    assert_eq!(reconciled.outcome(), OcoOutcome::Failed);
    assert!(!reconciled.rollback_pending);
    assert!(reconciled.degraded.is_none());
    assert_eq!(reconciled.take_profit.status, LegStatus::Cancelled);
    assert!(sim.live_orders().is_empty());
    assert!(!manager.is_monitoring(set.group_id));
    assert_eq!(manager.get_oco_status(set.group_id).unwrap(), reconciled);
}

#[tokio::test(start_paused = true)]
async fn test_user_cancel_completes_interrupted_rollback() {
    let (sim, manager) = setup();
    sim.inject(
        FaultRule::new(
            SimOperation::Submit,
            SimFault::Reject("Order would immediately trigger.".to_string()),
        )
        .for_order_type(OrderType::StopMarket),
    );
    sim.inject(
        FaultRule::new(SimOperation::Cancel, SimFault::ServerError)
            .for_order_type(OrderType::Limit),
    );
    let set = manager.place_oco(long_exit()).await.unwrap();
    assert!(set.rollback_pending);

    sim.clear_faults();
    let reports = manager.cancel_oco(set.group_id).await.unwrap();

    assert_eq!(reports[0].outcome, LegCancelOutcome::Cancelled);
    assert_eq!(
        reports[1].outcome,
        LegCancelOutcome::AlreadyTerminal(LegStatus::Rejected)
    );
    let done = manager.get_oco_status(set.group_id).unwrap();
    assert_eq!(done.status, OcoStatus::Failed);
    assert!(sim.live_orders().is_empty());
}

// ============================================================================
// Races, external changes, inconclusive polling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_sibling_fill_during_cancel_reports_race() {
    let (sim, manager) = setup();
    sim.inject(
        FaultRule::new(SimOperation::Cancel, SimFault::FillBeforeCancel)
            .for_order_type(OrderType::StopMarket)
            .times(1),
    );
    let set = manager.place_oco(long_exit()).await.unwrap();

    sim.set_price(SYMBOL, dec!(70100));
    let done = manager.wait_for_outcome(set.group_id).await.unwrap();

    assert_eq!(done.status, OcoStatus::Resolved);
    assert_eq!(
        done.outcome(),
        OcoOutcome::RaceInconsistency(LegKind::TakeProfit)
    );
    assert_eq!(done.take_profit.status, LegStatus::Filled);
    assert_eq!(done.stop_loss.status, LegStatus::Filled);
    assert!(done.race.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_both_filled_in_one_poll_earlier_fill_wins() {
    let (sim, manager) = setup();
    let set = manager.place_oco(long_exit()).await.unwrap();

    sim.force_fill(&exchange_id(&set.stop_loss.exchange_order_id));
    sim.force_fill(&exchange_id(&set.take_profit.exchange_order_id));
    let done = manager.wait_for_outcome(set.group_id).await.unwrap();

    assert_eq!(
        done.outcome(),
        OcoOutcome::RaceInconsistency(LegKind::StopLoss)
    );
    let race = done.race.expect("race recorded");
    assert!(race.stop_loss_filled_at < race.take_profit_filled_at);
}

#[tokio::test(start_paused = true)]
async fn test_external_cancel_degrades_and_keeps_monitoring() {
    let (sim, manager) = setup();
    let set = manager.place_oco(long_exit()).await.unwrap();
    let mut snapshots = manager.subscribe(set.group_id).expect("monitor running");

    sim.force_cancel(&exchange_id(&set.take_profit.exchange_order_id));
    let degraded = snapshots
        .wait_for(|s| s.degraded.is_some())
        .await
        .unwrap()
        .clone();

    assert_eq!(degraded.status, OcoStatus::Active);
    assert_eq!(degraded.degraded, Some(LegKind::TakeProfit));
    assert_eq!(degraded.stop_loss.status, LegStatus::Open);
    assert!(!degraded.take_profit.cancel_requested);
    assert_eq!(sim.live_orders().len(), 1);

    sim.set_price(SYMBOL, dec!(64900));
    let done = manager.wait_for_outcome(set.group_id).await.unwrap();
    assert_eq!(done.outcome(), OcoOutcome::Resolved(LegKind::StopLoss));
    assert_eq!(done.degraded, Some(LegKind::TakeProfit));
}

#[tokio::test(start_paused = true)]
async fn test_both_legs_cancelled_externally() {
    let (sim, manager) = setup();
    let set = manager.place_oco(long_exit()).await.unwrap();

    sim.force_cancel(&exchange_id(&set.take_profit.exchange_order_id));
    sim.force_reject(&exchange_id(&set.stop_loss.exchange_order_id));
    let done = manager.wait_for_outcome(set.group_id).await.unwrap();

    assert_eq!(done.outcome(), OcoOutcome::Cancelled);
    assert_eq!(done.stop_loss.status, LegStatus::Rejected);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_polling_requires_reconciliation() {
    let (sim, manager) = setup();
    let set = manager.place_oco(long_exit()).await.unwrap();
    sim.inject(FaultRule::new(SimOperation::Status, SimFault::Network));

    let done = manager.wait_for_outcome(set.group_id).await.unwrap();

    assert_eq!(done.status, OcoStatus::ReconciliationRequired);
    assert_eq!(done.outcome(), OcoOutcome::ReconciliationRequired);
    assert_eq!(done.take_profit.status, LegStatus::Open);
    assert_eq!(done.stop_loss.status, LegStatus::Open);
    assert!(!manager.is_monitoring(set.group_id));
}

#[tokio::test(start_paused = true)]
async fn test_hung_status_calls_time_out() {
    let (sim, manager) = setup();
    let set = manager.place_oco(long_exit()).await.unwrap();
    sim.inject(FaultRule::new(SimOperation::Status, SimFault::Hang));

    let done = manager.wait_for_outcome(set.group_id).await.unwrap();
    assert_eq!(done.status, OcoStatus::ReconciliationRequired);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_deadline() {
    let (_sim, manager) = setup_with(ManagerConfig {
        monitor_deadline: Some(Duration::from_secs(5)),
        ..config()
    });
    let set = manager.place_oco(long_exit()).await.unwrap();

    let done = manager.wait_for_outcome(set.group_id).await.unwrap();
    assert_eq!(done.status, OcoStatus::ReconciliationRequired);
    assert!(done.notes.iter().any(|n| n.contains("deadline")));
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_sibling_cancel_requires_reconciliation() {
    let (sim, manager) = setup();
    let set = manager.place_oco(long_exit()).await.unwrap();
    sim.inject(
        FaultRule::new(SimOperation::Cancel, SimFault::ServerError)
            .for_order_type(OrderType::StopMarket),
    );

    sim.set_price(SYMBOL, dec!(70100));
    let done = manager.wait_for_outcome(set.group_id).await.unwrap();

    assert_eq!(done.status, OcoStatus::ReconciliationRequired);
    assert_eq!(done.resolution, Some(LegKind::TakeProfit));
    assert_eq!(done.take_profit.status, LegStatus::Filled);
    assert_eq!(done.stop_loss.status, LegStatus::Open);
}

// ============================================================================
// User cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_oco_cancels_both_legs() {
    let (sim, manager) = setup();
    let set = manager.place_oco(long_exit()).await.unwrap();

    let reports = manager.cancel_oco(set.group_id).await.unwrap();
    assert_eq!(reports.len(), 2);
    assert!(
        reports
            .iter()
            .all(|r| r.outcome == LegCancelOutcome::Cancelled)
    );

    let done = manager.wait_for_outcome(set.group_id).await.unwrap();
    assert_eq!(done.outcome(), OcoOutcome::Cancelled);
    assert!(sim.live_orders().is_empty());

    // A terminal set is reported without touching the exchange
    let cancels = sim.calls(SimOperation::Cancel);
    let again = manager.cancel_oco(set.group_id).await.unwrap();
    assert!(again.iter().all(|r| matches!(
        r.outcome,
        LegCancelOutcome::AlreadyTerminal(LegStatus::Cancelled)
    )));
    assert_eq!(sim.calls(SimOperation::Cancel), cancels);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_failure_on_one_leg_does_not_block_the_other() {
    let (sim, manager) = setup();
    let set = manager.place_oco(long_exit()).await.unwrap();
    sim.inject(
        FaultRule::new(SimOperation::Cancel, SimFault::Network).for_order_type(OrderType::Limit),
    );

    let reports = manager.cancel_oco(set.group_id).await.unwrap();
    let tp = reports.iter().find(|r| r.kind == LegKind::TakeProfit).unwrap();
    let sl = reports.iter().find(|r| r.kind == LegKind::StopLoss).unwrap();
    assert!(matches!(tp.outcome, LegCancelOutcome::Failed(_)));
    assert_eq!(sl.outcome, LegCancelOutcome::Cancelled);

    let after = manager.get_oco_status(set.group_id).unwrap();
    assert_eq!(after.status, OcoStatus::ReconciliationRequired);
    assert_eq!(sim.live_orders().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_fill_resolves_instead() {
    let (sim, manager) = setup();
    let set = manager.place_oco(long_exit()).await.unwrap();
    sim.inject(
        FaultRule::new(SimOperation::Cancel, SimFault::FillBeforeCancel)
            .for_order_type(OrderType::Limit)
            .times(1),
    );

    let reports = manager.cancel_oco(set.group_id).await.unwrap();
    let tp = reports.iter().find(|r| r.kind == LegKind::TakeProfit).unwrap();
    assert_eq!(
        tp.outcome,
        LegCancelOutcome::AlreadyTerminal(LegStatus::Filled)
    );

    let done = manager.get_oco_status(set.group_id).unwrap();
    assert_eq!(done.outcome(), OcoOutcome::Resolved(LegKind::TakeProfit));
    assert_eq!(done.stop_loss.status, LegStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_partial_fill_on_losing_leg_is_flagged() {
    let _ = env_logger::try_init();
    let venue = Arc::new(PartialFillVenue::default());
    let manager = OcoManager::new(venue.clone(), Arc::new(SystemClock::new()), config());

    let set = manager.place_oco(long_exit()).await.unwrap();
    assert_eq!(set.status, OcoStatus::Active);
    let done = manager.wait_for_outcome(set.group_id).await.unwrap();

    assert_eq!(done.status, OcoStatus::Resolved);
    assert_eq!(
        done.outcome(),
        OcoOutcome::RaceInconsistency(LegKind::StopLoss)
    );
    assert_eq!(done.take_profit.status, LegStatus::Cancelled);
    assert_eq!(done.take_profit.filled_quantity, dec!(0.005));
    assert_eq!(done.stop_loss.filled_quantity, dec!(0.01));
    let race = done.race.as_ref().expect("overfill is flagged");
    assert!(race.detail.contains("0.005"));
    assert!(done.notes.iter().any(|note| note.contains("0.005")));
    assert_eq!(venue.cancels.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Persistence and reconciliation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_reconcile_after_restart() {
    let (sim, manager) = setup();
    let set = manager.place_oco(long_exit()).await.unwrap();

    // Lose contact until monitoring gives up
    sim.inject(FaultRule::new(SimOperation::Status, SimFault::Network));
    let stuck = manager.wait_for_outcome(set.group_id).await.unwrap();
    assert_eq!(stuck.status, OcoStatus::ReconciliationRequired);

    let dir = std::env::temp_dir().join(format!("oco-reconcile-{}", set.group_id));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("state.json");
    manager.store().save_to(&path).unwrap();

    // The take-profit fills while the process is down
    sim.clear_faults();
    sim.set_price(SYMBOL, dec!(70100));

    let store = Arc::new(OrderRecordStore::load_from(&path).unwrap());
    let restarted =
        OcoManager::with_store(sim.clone(), Arc::new(SystemClock::new()), store, config());
    let reconciled = restarted.reconcile(set.group_id).await.unwrap();

    assert_eq!(
        reconciled.outcome(),
        OcoOutcome::Resolved(LegKind::TakeProfit)
    );
    assert_eq!(reconciled.stop_loss.status, LegStatus::Cancelled);
    assert!(sim.live_orders().is_empty());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_restarts_monitoring_for_live_legs() {
    let (sim, manager) = setup();
    let set = manager.place_oco(long_exit()).await.unwrap();
    sim.inject(FaultRule::new(SimOperation::Status, SimFault::Network));
    manager.wait_for_outcome(set.group_id).await.unwrap();
    sim.clear_faults();

    let results = manager.reconcile_all().await;
    assert_eq!(results.len(), 1);
    let active = results.into_iter().next().unwrap().unwrap();
    assert_eq!(active.status, OcoStatus::Active);
    assert!(manager.is_monitoring(set.group_id));

    sim.set_price(SYMBOL, dec!(64900));
    let done = manager.wait_for_outcome(set.group_id).await.unwrap();
    assert_eq!(done.outcome(), OcoOutcome::Resolved(LegKind::StopLoss));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_group_is_not_found() {
    let (_sim, manager) = setup();
    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        manager.get_oco_status(missing),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        manager.cancel_oco(missing).await,
        Err(Error::NotFound(_))
    ));
}

// ============================================================================
// Scripted venue
// ============================================================================

const PARTIAL_TP_ID: &str = "101";
const FILLED_SL_ID: &str = "102";

/// Venue where the take-profit leg has filled 0.005 and the stop-loss leg
/// has filled completely by the first poll
#[derive(Default)]
struct PartialFillVenue {
    cancels: AtomicUsize,
}

impl PartialFillVenue {
    fn report(&self, id: &str) -> Option<OrderReport> {
        let base = OrderReport {
            exchange_order_id: id.to_string(),
            client_order_id: None,
            symbol: SYMBOL.to_string(),
            side: Side::Sell,
            order_type: OrderType::Limit,
            status: OrderStatus::PartiallyFilled,
            quantity: dec!(0.01),
            filled_quantity: dec!(0.005),
            avg_price: Some(dec!(70000)),
            price: Some(dec!(70000)),
            stop_price: None,
            updated_at: Some(Utc::now()),
        };
        match id {
            PARTIAL_TP_ID => Some(base),
            FILLED_SL_ID => Some(OrderReport {
                order_type: OrderType::StopMarket,
                status: OrderStatus::Filled,
                filled_quantity: dec!(0.01),
                avg_price: Some(dec!(64990)),
                price: None,
                stop_price: Some(dec!(65000)),
                ..base
            }),
            _ => None,
        }
    }
}

#[async_trait]
impl ExchangeGateway for PartialFillVenue {
    async fn ping(&self) -> GatewayResult<()> {
        Ok(())
    }

    async fn submit_order(&self, request: &OrderRequest) -> GatewayResult<OrderAck> {
        let id = match request.order_type {
            OrderType::Limit => PARTIAL_TP_ID,
            _ => FILLED_SL_ID,
        };
        Ok(OrderAck {
            exchange_order_id: id.to_string(),
            client_order_id: request.client_order_id.clone(),
            status: OrderStatus::New,
        })
    }

    async fn get_order_status(
        &self,
        _symbol: &str,
        exchange_order_id: &str,
    ) -> GatewayResult<OrderReport> {
        self.report(exchange_order_id)
            .ok_or_else(|| GatewayError::OrderNotFound(exchange_order_id.to_string()))
    }

    async fn find_order_by_client_id(
        &self,
        _symbol: &str,
        _client_order_id: &str,
    ) -> GatewayResult<Option<OrderReport>> {
        Ok(None)
    }

    async fn cancel_order(
        &self,
        _symbol: &str,
        exchange_order_id: &str,
    ) -> GatewayResult<CancelAck> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        if exchange_order_id != PARTIAL_TP_ID {
            return Err(GatewayError::OrderNotFound(exchange_order_id.to_string()));
        }
        Ok(CancelAck {
            exchange_order_id: exchange_order_id.to_string(),
            status: OrderStatus::Canceled,
            filled_quantity: dec!(0.005),
        })
    }

    async fn get_open_orders(&self, _symbol: Option<&str>) -> GatewayResult<Vec<OrderReport>> {
        Ok(Vec::new())
    }

    async fn get_position(&self, symbol: &str) -> GatewayResult<PositionSnapshot> {
        Ok(PositionSnapshot {
            symbol: symbol.to_string(),
            quantity: dec!(-0.005),
            entry_price: dec!(66000),
            unrealized_pnl: dec!(0),
            leverage: None,
        })
    }

    async fn get_positions(&self) -> GatewayResult<Vec<PositionSnapshot>> {
        Ok(Vec::new())
    }

    async fn get_balance(&self) -> GatewayResult<Vec<AssetBalance>> {
        Ok(Vec::new())
    }

    async fn get_symbol_price(&self, _symbol: &str) -> GatewayResult<Price> {
        Ok(dec!(64990))
    }
}
