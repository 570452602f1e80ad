//! Plain-text rendering for command output

use oco_core::{AssetBalance, PositionSnapshot, Price};
use oco_order_manager::{LegCancelOutcome, LegCancelReport, OcoOrderSet, OrderLeg};
use oco_ports::{CancelAck, OrderAck, OrderReport};
use std::fmt::Write;

/// Left-aligned text table sized to its widest cell per column
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }

        let mut out = String::new();
        push_line(&mut out, &self.headers, &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        push_line(&mut out, &rule, &widths);
        for row in &self.rows {
            push_line(&mut out, row, &widths);
        }
        out
    }
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, width)| {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            format!("{cell:<width$}")
        })
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

fn price(p: Option<Price>) -> String {
    p.map(|p| p.normalize().to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn balances(balances: &[AssetBalance]) -> String {
    if balances.is_empty() {
        return "No balances\n".to_string();
    }
    let mut table = Table::new(&["ASSET", "BALANCE", "AVAILABLE"]);
    for b in balances {
        table.row(vec![
            b.asset.clone(),
            b.balance.normalize().to_string(),
            b.available.normalize().to_string(),
        ]);
    }
    table.render()
}

pub fn positions(positions: &[PositionSnapshot]) -> String {
    if positions.is_empty() {
        return "No open positions\n".to_string();
    }
    let mut table = Table::new(&["SYMBOL", "SIZE", "ENTRY", "UNREALIZED PNL", "LEVERAGE"]);
    for p in positions {
        table.row(vec![
            p.symbol.clone(),
            p.quantity.normalize().to_string(),
            p.entry_price.normalize().to_string(),
            p.unrealized_pnl.round_dp(4).normalize().to_string(),
            p.leverage
                .map(|l| format!("{l}x"))
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.render()
}

pub fn orders(orders: &[OrderReport]) -> String {
    if orders.is_empty() {
        return "No open orders\n".to_string();
    }
    let mut table = Table::new(&[
        "ORDER ID", "SYMBOL", "SIDE", "TYPE", "STATUS", "QTY", "FILLED", "PRICE", "STOP",
    ]);
    for o in orders {
        table.row(vec![
            o.exchange_order_id.clone(),
            o.symbol.clone(),
            o.side.to_string(),
            o.order_type.as_str().to_string(),
            o.status.as_str().to_string(),
            o.quantity.normalize().to_string(),
            o.filled_quantity.normalize().to_string(),
            price(o.price),
            price(o.stop_price),
        ]);
    }
    table.render()
}

pub fn order(report: &OrderReport) -> String {
    let mut out = orders(std::slice::from_ref(report));
    if let Some(avg) = report.avg_price {
        let _ = writeln!(out, "Average fill price: {}", avg.normalize());
    }
    out
}

pub fn ack(ack: &OrderAck) -> String {
    format!(
        "Order {} accepted, status {}\n",
        ack.exchange_order_id,
        ack.status.as_str()
    )
}

pub fn cancel_ack(ack: &CancelAck) -> String {
    format!(
        "Order {} {}, filled {}\n",
        ack.exchange_order_id,
        ack.status.as_str(),
        ack.filled_quantity.normalize()
    )
}

fn leg_row(leg: &OrderLeg) -> Vec<String> {
    vec![
        leg.kind.to_string(),
        leg.order_type.as_str().to_string(),
        price(leg.trigger_price()),
        leg.exchange_order_id
            .clone()
            .unwrap_or_else(|| "-".to_string()),
        leg.status.to_string(),
        leg.filled_quantity.normalize().to_string(),
        price(leg.avg_price),
    ]
}

/// Full snapshot of one OCO set
pub fn oco(set: &OcoOrderSet) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "OCO {}", set.group_id);
    let _ = writeln!(
        out,
        "  {} {} {}  status: {}  outcome: {}",
        set.side,
        set.quantity.normalize(),
        set.symbol,
        set.status,
        set.outcome()
    );
    if set.rollback_pending {
        let _ = writeln!(out, "  rollback unfinished: run `oco reconcile {}`", set.group_id);
    }
    if let Some(kind) = set.degraded {
        let _ = writeln!(out, "  degraded: {kind} leg ended outside this client");
    }

    let mut table = Table::new(&["LEG", "TYPE", "PRICE", "ORDER ID", "STATUS", "FILLED", "AVG"]);
    for leg in set.legs() {
        table.row(leg_row(leg));
    }
    for line in table.render().lines() {
        let _ = writeln!(out, "  {line}");
    }

    if let Some(race) = &set.race {
        let _ = writeln!(out, "  WARNING: {}", race.detail);
        let _ = writeln!(out, "  Both legs executed; verify the {} position", set.symbol);
    }
    if !set.notes.is_empty() {
        let _ = writeln!(out, "  notes:");
        for note in &set.notes {
            let _ = writeln!(out, "    - {note}");
        }
    }
    out
}

/// One summary line per set
pub fn oco_list(sets: &[OcoOrderSet]) -> String {
    if sets.is_empty() {
        return "No OCO sets recorded\n".to_string();
    }
    let mut table = Table::new(&[
        "GROUP ID", "SYMBOL", "SIDE", "QTY", "TAKE PROFIT", "STOP LOSS", "STATUS", "OUTCOME",
    ]);
    for set in sets {
        table.row(vec![
            set.group_id.to_string(),
            set.symbol.clone(),
            set.side.to_string(),
            set.quantity.normalize().to_string(),
            price(set.take_profit.trigger_price()),
            price(set.stop_loss.trigger_price()),
            set.status.to_string(),
            set.outcome().to_string(),
        ]);
    }
    table.render()
}

/// Short progress line printed while watching a set
pub fn oco_progress(set: &OcoOrderSet) -> String {
    format!(
        "[{}] take-profit {} | stop-loss {} | {}",
        set.updated_at.format("%H:%M:%S"),
        set.take_profit.status,
        set.stop_loss.status,
        set.status
    )
}

pub fn cancel_reports(reports: &[LegCancelReport]) -> String {
    let mut table = Table::new(&["LEG", "ORDER ID", "RESULT"]);
    for report in reports {
        let result = match &report.outcome {
            LegCancelOutcome::Cancelled => "cancelled".to_string(),
            LegCancelOutcome::AlreadyTerminal(status) => format!("already {status}"),
            LegCancelOutcome::NotSubmitted => "never submitted".to_string(),
            LegCancelOutcome::Failed(reason) => format!("FAILED: {reason}"),
        };
        table.row(vec![
            report.kind.to_string(),
            report
                .exchange_order_id
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            result,
        ]);
    }
    table.render()
}
