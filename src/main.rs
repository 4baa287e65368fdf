//! Cross-venue prediction-market arbitrage engine — operator CLI.
//!
//! Wires `Config`/`VenueCredentials` into the two `VenueClient`s, the
//! pair registry, book fetcher, scanner, both strategies, and the
//! supervisor loop, then runs until `Ctrl+C` or a fatal `EngineError`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use xvenue_arb::config::Config;
use xvenue_arb::credentials::VenueCredentials;
use xvenue_arb::fetcher::{BookFetcher, FetcherConfig};
use xvenue_arb::matcher::{MatcherConfig, PairRegistry};
use xvenue_arb::pricing::{FeeCurve, FeeModel};
use xvenue_arb::scanner::{Scanner, ScannerConfig};
use xvenue_arb::strategy::{ImmediateConfig, ImmediateStrategy, LiquidityConfig, LiquidityStrategy};
use xvenue_arb::supervisor::{Supervisor, SupervisorConfig};
use xvenue_arb::tradelog::TradeLog;
use xvenue_arb::venues::{DryRunClient, OpinionClient, VantageClient, VenueClient};

#[derive(Parser)]
#[command(name = "arbd", about = "Cross-venue prediction-market arbitrage engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the engine against real venue APIs and place real orders.
    Run {
        /// Scan and log opportunities without ever calling place_order.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let Command::Run { dry_run } = cli.command;

    let config = Config::from_env().context("loading configuration")?;

    let opinion_creds = VenueCredentials::from_env("OPINION").context("loading Opinion credentials")?;
    let vantage_creds = VenueCredentials::from_env("VANTAGE").context("loading Vantage credentials")?;

    let opinion_live: Arc<dyn VenueClient> = Arc::new(OpinionClient::new(
        config.opinion_base_url.clone(),
        config.opinion_max_rps,
        opinion_creds,
    ));
    let vantage_live: Arc<dyn VenueClient> = Arc::new(VantageClient::new(
        config.vantage_base_url.clone(),
        config.vantage_max_rps,
        vantage_creds,
    ));

    // §6 dry run: reads (markets/books/balances) still hit the venue so
    // the operator sees real opportunities; order placement never does.
    let opinion: Arc<dyn VenueClient> = if dry_run {
        Arc::new(DryRunClient::wrap(opinion_live))
    } else {
        opinion_live
    };
    let vantage: Arc<dyn VenueClient> = if dry_run {
        Arc::new(DryRunClient::wrap(vantage_live))
    } else {
        vantage_live
    };

    let registry = Arc::new(PairRegistry::new(
        opinion.clone(),
        vantage.clone(),
        MatcherConfig {
            title_similarity_threshold: config.title_similarity_threshold,
            max_resolution_date_delta_hours: config.max_resolution_date_delta_hours,
            both_venues_down_halt_minutes: config.both_venues_down_halt_minutes,
        },
    ));

    let fetcher = Arc::new(BookFetcher::new(
        opinion.clone(),
        vantage.clone(),
        FetcherConfig {
            batch_size: config.orderbook_batch_size,
            max_book_age_ms: config.max_book_age_ms,
            opinion_max_concurrent: config.opinion_max_rps.ceil() as usize,
            vantage_max_concurrent: config.vantage_max_rps.ceil() as usize,
            book_fetch_timeout: Duration::from_secs(5),
        },
    ));

    let fee_model = FeeModel::new(FeeCurve {
        a: config.fee_curve_a,
        c: config.fee_curve_c,
        min_fee: config.opinion_min_fee,
    });

    let scanner = Arc::new(Scanner::new(
        fee_model,
        ScannerConfig {
            immediate_min_edge_pct: config.immediate_min_edge_pct,
            immediate_max_edge_pct: config.immediate_max_edge_pct,
            liquidity_min_annualized_pct: config.liquidity_min_annualized_pct,
            max_per_trade_shares: config.max_per_trade_shares,
            max_notional: config.max_notional,
        },
    ));

    let trade_log = if dry_run {
        Arc::new(TradeLog::in_memory())
    } else {
        Arc::new(TradeLog::open(&config.trade_log_path).context("opening trade log")?)
    };

    let immediate = Arc::new(ImmediateStrategy::new(
        opinion.clone(),
        vantage.clone(),
        fee_model,
        trade_log.clone(),
        ImmediateConfig {
            min_hedge_size: config.min_hedge_size,
            slippage_cap_ticks: config.slippage_cap_ticks,
            max_hedge_attempts: config.max_hedge_attempts,
            order_poll_interval: Duration::from_millis(config.order_poll_interval_ms),
            order_poll_timeout: Duration::from_secs(10),
        },
    ));

    let liquidity = Arc::new(LiquidityStrategy::new(
        opinion.clone(),
        vantage.clone(),
        fee_model,
        trade_log.clone(),
        LiquidityConfig {
            target_size: config.liquidity_target_size,
            liquidity_min_annualized_pct: config.liquidity_min_annualized_pct,
            liquidity_exit_margin_pct: config.liquidity_exit_margin_pct,
            min_order_size: config.min_hedge_size,
            reprice_min_interval: Duration::from_secs(5),
            max_hedge_attempts: config.max_hedge_attempts,
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let supervisor = Arc::new(Supervisor::new(
        registry,
        fetcher,
        scanner,
        immediate,
        liquidity,
        SupervisorConfig {
            scan_interval: Duration::from_millis(config.scan_interval_ms),
            matcher_refresh: Duration::from_secs(config.matcher_refresh_s),
            max_concurrent_immediate: config.max_concurrent_immediate,
        },
        shutdown_rx,
    ));

    let bridge_addr: std::net::SocketAddr = config
        .bridge_bind_addr
        .parse()
        .context("parsing bridge_bind_addr")?;
    let bridge_supervisor = supervisor.clone();
    tokio::spawn(async move {
        if let Err(err) = xvenue_arb::bridge::serve(bridge_supervisor, bridge_addr).await {
            error!("dashboard bridge exited: {err}");
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    info!(dry_run, "engine starting");
    match supervisor.run().await {
        Ok(()) => {
            info!("engine stopped cleanly");
            Ok(())
        }
        Err(err) => {
            error!("engine halted: {err}");
            std::process::exit(err.exit_code());
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xvenue_arb=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
