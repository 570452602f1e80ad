//! `oco` - futures trading client with emulated OCO orders
//!
//! Commands:
//! - `balance`, `positions`, `open-orders`, `price` - account and market views
//! - `market`, `limit`, `stop-limit` - single orders, one call each
//! - `oco` - place a take-profit/stop-loss pair and watch it to an outcome
//! - `oco-status`, `oco-cancel`, `reconcile` - manage recorded OCO sets
//! - `order-status`, `cancel` - single-order lookup and cancel

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{info, warn};
use oco_cli::config::{CliConfig, Credentials, load_config};
use oco_cli::render;
use oco_clock::SystemClock;
use oco_core::{Price, Quantity, Side};
use oco_gateway::{BinanceFuturesClient, SimulatedExchange};
use oco_order_manager::{
    OcoManager, OcoOrderSet, OcoOutcome, OcoRequest, OcoStatus, OrderPassthrough,
    OrderRecordStore, default_limit_price,
};
use oco_ports::{ExchangeGateway, GatewayResult};
use rust_decimal::Decimal;
use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "oco",
    version,
    about = "Futures trading client with emulated one-cancels-other orders"
)]
struct Cli {
    /// JSON config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Trade against an in-memory simulated venue; no credentials needed.
    #[arg(long, global = true, default_value_t = false)]
    simulate: bool,

    /// Persist OCO sets to this JSON file between runs.
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Skip confirmation prompts.
    #[arg(long, short = 'y', global = true, default_value_t = false)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show futures wallet balances.
    Balance,
    /// Show open positions.
    Positions {
        /// Only this symbol.
        symbol: Option<String>,
    },
    /// Show open orders.
    OpenOrders {
        /// Only this symbol.
        symbol: Option<String>,
    },
    /// Show the latest price of a symbol.
    Price { symbol: String },
    /// Place a market order.
    Market {
        symbol: String,
        side: Side,
        quantity: Quantity,
    },
    /// Place a GTC limit order.
    Limit {
        symbol: String,
        side: Side,
        quantity: Quantity,
        price: Price,
    },
    /// Place a stop-limit order.
    StopLimit {
        symbol: String,
        side: Side,
        quantity: Quantity,
        stop_price: Price,

        /// Limit price. Defaults to 1% beyond the stop (configurable).
        #[arg(long)]
        limit_price: Option<Price>,
    },
    /// Place a take-profit/stop-loss pair where one fill cancels the other.
    Oco {
        symbol: String,

        /// Take-profit (limit) price.
        #[arg(long)]
        take_profit: Price,

        /// Stop-loss (stop-market) trigger price.
        #[arg(long)]
        stop_loss: Price,

        /// Closing side. Defaults to the side that closes the open position.
        #[arg(long)]
        side: Option<Side>,

        /// Quantity. Defaults to the full open position.
        #[arg(long)]
        quantity: Option<Quantity>,

        /// Return after placement instead of watching until an outcome.
        #[arg(long, default_value_t = false)]
        detach: bool,
    },
    /// Show one recorded OCO set, or all of them.
    OcoStatus { group_id: Option<Uuid> },
    /// Cancel both legs of an OCO set.
    OcoCancel { group_id: Uuid },
    /// Re-derive OCO state from the exchange.
    Reconcile {
        /// Only this set. Defaults to every unfinished set.
        group_id: Option<Uuid>,

        /// Keep watching the set if it is still live.
        #[arg(long, default_value_t = false, requires = "group_id")]
        watch: bool,
    },
    /// Show one order.
    OrderStatus { symbol: String, order_id: String },
    /// Cancel one order.
    Cancel { symbol: String, order_id: String },
}

struct App {
    gateway: Arc<dyn ExchangeGateway>,
    manager: OcoManager,
    passthrough: OrderPassthrough,
    call_timeout: Duration,
    state_file: Option<PathBuf>,
    assume_yes: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CliConfig::default(),
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    let app = App::connect(&cli, &config).await?;
    app.run(cli.command).await
}

/// Simulated venue seeded with prices and a small long position
fn simulated_venue() -> SimulatedExchange {
    SimulatedExchange::new()
        .with_price("BTCUSDT", Decimal::new(67_000, 0))
        .with_price("ETHUSDT", Decimal::new(3_500, 0))
        .with_position("BTCUSDT", Decimal::new(1, 2), Decimal::new(66_000, 0))
}

impl App {
    async fn connect(cli: &Cli, config: &CliConfig) -> Result<Self> {
        let gateway: Arc<dyn ExchangeGateway> = if cli.simulate {
            info!("Using the simulated venue");
            Arc::new(simulated_venue())
        } else {
            let credentials = Credentials::from_env()
                .context("Exchange credentials missing (or pass --simulate)")?;
            Arc::new(BinanceFuturesClient::new(config.gateway_config(credentials))?)
        };

        let manager_config = config.manager_config();
        let store = match &cli.state_file {
            Some(path) => OrderRecordStore::load_from(path)
                .with_context(|| format!("Failed to load state file {}", path.display()))?,
            None => OrderRecordStore::new(),
        };
        if !store.is_empty() {
            info!("Loaded {} OCO set(s) from the state file", store.len());
        }

        let app = Self {
            passthrough: OrderPassthrough::new(gateway.clone(), &manager_config),
            call_timeout: manager_config.call_timeout,
            manager: OcoManager::with_store(
                gateway.clone(),
                Arc::new(SystemClock::new()),
                Arc::new(store),
                manager_config,
            ),
            gateway,
            state_file: cli.state_file.clone(),
            assume_yes: cli.yes,
        };

        app.call("Connection check", app.gateway.ping()).await?;
        info!("Connected to {}", app.gateway.name());
        Ok(app)
    }

    async fn run(&self, command: Commands) -> Result<ExitCode> {
        match command {
            Commands::Balance => {
                let balances = self.call("Balance query", self.gateway.get_balance()).await?;
                print!("{}", render::balances(&balances));
            }
            Commands::Positions { symbol } => {
                let symbol = symbol.map(|s| s.to_uppercase());
                let mut positions = self
                    .call("Position query", self.gateway.get_positions())
                    .await?;
                positions.retain(|p| symbol.as_ref().is_none_or(|s| &p.symbol == s));
                print!("{}", render::positions(&positions));
            }
            Commands::OpenOrders { symbol } => {
                let symbol = symbol.map(|s| s.to_uppercase());
                let orders = self
                    .call(
                        "Open order query",
                        self.gateway.get_open_orders(symbol.as_deref()),
                    )
                    .await?;
                print!("{}", render::orders(&orders));
            }
            Commands::Price { symbol } => {
                let symbol = symbol.to_uppercase();
                let price = self
                    .call("Price query", self.gateway.get_symbol_price(&symbol))
                    .await?;
                println!("{symbol} {}", price.normalize());
            }
            Commands::Market {
                symbol,
                side,
                quantity,
            } => {
                let symbol = symbol.to_uppercase();
                if self.confirm(&format!("MARKET {side} {quantity} {symbol}?"))? {
                    let ack = self.passthrough.market(&symbol, side, quantity).await?;
                    print!("{}", render::ack(&ack));
                }
            }
            Commands::Limit {
                symbol,
                side,
                quantity,
                price,
            } => {
                let symbol = symbol.to_uppercase();
                if self.confirm(&format!("LIMIT {side} {quantity} {symbol} @ {price}?"))? {
                    let ack = self
                        .passthrough
                        .limit(&symbol, side, quantity, price)
                        .await?;
                    print!("{}", render::ack(&ack));
                }
            }
            Commands::StopLimit {
                symbol,
                side,
                quantity,
                stop_price,
                limit_price,
            } => {
                let symbol = symbol.to_uppercase();
                let limit_price = limit_price.unwrap_or_else(|| {
                    default_limit_price(
                        side,
                        stop_price,
                        self.manager.config().stop_limit_offset,
                    )
                });
                if self.confirm(&format!(
                    "STOP_LIMIT {side} {quantity} {symbol}, stop {stop_price}, limit {limit_price}?"
                ))? {
                    let ack = self
                        .passthrough
                        .stop_limit(&symbol, side, quantity, stop_price, Some(limit_price))
                        .await?;
                    print!("{}", render::ack(&ack));
                }
            }
            Commands::Oco {
                symbol,
                take_profit,
                stop_loss,
                side,
                quantity,
                detach,
            } => {
                return self
                    .place_oco(
                        symbol.to_uppercase(),
                        side,
                        quantity,
                        take_profit,
                        stop_loss,
                        detach,
                    )
                    .await;
            }
            Commands::OcoStatus { group_id } => match group_id {
                Some(id) => print!("{}", render::oco(&self.manager.get_oco_status(id)?)),
                None => print!("{}", render::oco_list(&self.manager.list())),
            },
            Commands::OcoCancel { group_id } => {
                let set = self.manager.get_oco_status(group_id)?;
                if self.confirm(&format!(
                    "Cancel both legs of OCO {group_id} on {}?",
                    set.symbol
                ))? {
                    let reports = self.manager.cancel_oco(group_id).await?;
                    print!("{}", render::cancel_reports(&reports));
                    let set = self.manager.get_oco_status(group_id)?;
                    print!("{}", render::oco(&set));
                    self.save_state();
                    return Ok(exit_code(&set));
                }
            }
            Commands::Reconcile { group_id, watch } => {
                return self.reconcile(group_id, watch).await;
            }
            Commands::OrderStatus { symbol, order_id } => {
                let report = self
                    .passthrough
                    .status(&symbol.to_uppercase(), &order_id)
                    .await?;
                print!("{}", render::order(&report));
            }
            Commands::Cancel { symbol, order_id } => {
                if self.confirm(&format!("Cancel order {order_id}?"))? {
                    let ack = self
                        .passthrough
                        .cancel(&symbol.to_uppercase(), &order_id)
                        .await?;
                    print!("{}", render::cancel_ack(&ack));
                }
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    async fn place_oco(
        &self,
        symbol: String,
        side: Option<Side>,
        quantity: Option<Quantity>,
        take_profit: Price,
        stop_loss: Price,
        detach: bool,
    ) -> Result<ExitCode> {
        let position = self
            .call("Position query", self.gateway.get_position(&symbol))
            .await?;
        let side = match side {
            Some(side) => side,
            None => position
                .closing_side()
                .with_context(|| format!("No open {symbol} position; pass --side"))?,
        };
        let quantity = quantity.unwrap_or_else(|| position.quantity.abs());

        let mut request = OcoRequest::new(&symbol, side, quantity, take_profit, stop_loss);
        match self
            .call("Price query", self.gateway.get_symbol_price(&symbol))
            .await
        {
            Ok(mark) => request = request.with_reference_price(mark),
            Err(err) => warn!("No reference price for {}: {:#}", symbol, err),
        }
        request.validate()?;

        if !self.confirm(&format!(
            "OCO {side} {quantity} {symbol}: take-profit LIMIT @ {take_profit}, stop-loss STOP_MARKET @ {stop_loss}?"
        ))? {
            return Ok(ExitCode::SUCCESS);
        }

        let set = self.manager.place_oco(request).await?;
        print!("{}", render::oco(&set));
        self.save_state();

        if set.status != OcoStatus::Active {
            return Ok(exit_code(&set));
        }
        if detach {
            println!(
                "Detached; monitoring stops with this process. Use `oco reconcile {}` later.",
                set.group_id
            );
            return Ok(ExitCode::SUCCESS);
        }
        let set = self.watch(set.group_id).await?;
        Ok(exit_code(&set))
    }

    async fn reconcile(&self, group_id: Option<Uuid>, watch: bool) -> Result<ExitCode> {
        let results = match group_id {
            Some(id) => vec![self.manager.reconcile(id).await],
            None => self.manager.reconcile_all().await,
        };
        if results.is_empty() {
            println!("Nothing to reconcile");
        }

        let mut code = ExitCode::SUCCESS;
        for result in results {
            match result {
                Ok(set) => {
                    print!("{}", render::oco(&set));
                    if needs_attention(&set) {
                        code = ExitCode::FAILURE;
                    }
                }
                Err(err) => {
                    eprintln!("Reconcile failed: {err}");
                    code = ExitCode::FAILURE;
                }
            }
        }
        self.save_state();

        if let Some(id) = group_id.filter(|_| watch) {
            if self.manager.is_monitoring(id) {
                let set = self.watch(id).await?;
                return Ok(exit_code(&set));
            }
        }
        Ok(code)
    }

    /// Follow a monitored set until it leaves `Active`; Ctrl-C cancels it
    async fn watch(&self, group_id: Uuid) -> Result<OcoOrderSet> {
        let Some(mut snapshots) = self.manager.subscribe(group_id) else {
            return Ok(self.manager.get_oco_status(group_id)?);
        };
        println!("Watching OCO {group_id}; press Ctrl-C to cancel both legs");

        let mut last = None;
        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let set = snapshots.borrow_and_update().clone();
                    let key = (set.take_profit.status, set.stop_loss.status, set.status);
                    if last != Some(key) {
                        println!("{}", render::oco_progress(&set));
                        last = Some(key);
                    }
                    if set.status != OcoStatus::Active {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("Interrupted, cancelling OCO {group_id}");
                    let reports = self.manager.cancel_oco(group_id).await?;
                    print!("{}", render::cancel_reports(&reports));
                    break;
                }
            }
        }

        let set = self.manager.wait_for_outcome(group_id).await?;
        print!("{}", render::oco(&set));
        self.save_state();
        Ok(set)
    }

    async fn call<T>(
        &self,
        what: &str,
        call: impl Future<Output = GatewayResult<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result.with_context(|| format!("{what} failed")),
            Err(_) => bail!("{what} timed out after {:?}", self.call_timeout),
        }
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        print!("{prompt} [y/N] ");
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        let accepted = matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes");
        if !accepted {
            println!("Aborted");
        }
        Ok(accepted)
    }

    fn save_state(&self) {
        let Some(path) = &self.state_file else {
            return;
        };
        match self.manager.store().save_to(path) {
            Ok(()) => info!("State saved to {}", path.display()),
            Err(err) => warn!("Failed to save state to {}: {}", path.display(), err),
        }
    }
}

/// Outcomes the operator has to look at by hand
fn needs_attention(set: &OcoOrderSet) -> bool {
    matches!(
        set.outcome(),
        OcoOutcome::RaceInconsistency(_) | OcoOutcome::ReconciliationRequired | OcoOutcome::Failed
    )
}

fn exit_code(set: &OcoOrderSet) -> ExitCode {
    if needs_attention(set) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
