// src/main.rs
//! Oracle bridge entry point.
//!
//! Runs the bridge over an in-memory simulated ledger and pushes a
//! scripted query event through it, bridging against the configured
//! query-fulfillment service.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, H256, U256};
use oracle_bridge::abi::event_signature;
use oracle_bridge::abi::schema::LOG1_DECLARATION;
use oracle_bridge::bridge::deploy::deploy_connector;
use oracle_bridge::bridge::{OracleBridge, QueryRegistry};
use oracle_bridge::core::config::BridgeConfig;
use oracle_bridge::ledger::{LogEntry, MemoryLedger};
use oracle_bridge::notify::{TracingSink, UnreadBadge};
use oracle_bridge::service::HttpQueryService;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "oracle_bridge")]
#[command(about = "Oracle query bridge over a simulated ledger")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inject one query event into the simulated ledger and bridge it
    Demo(DemoArgs),
}

#[derive(ClapArgs)]
struct DemoArgs {
    /// Data source understood by the query service
    #[arg(long, default_value = "URL")]
    datasource: String,

    /// Query formula
    #[arg(
        long,
        default_value = "json(https://api.kraken.com/0/public/Ticker?pair=ETHXBT).result.XETHXXBT.c.0"
    )]
    query: String,

    /// Proof type byte (0 disables proofs)
    #[arg(long, default_value_t = 0)]
    proof_type: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;
    info!("Starting oracle bridge v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };

    match args.command {
        Commands::Demo(demo) => run_demo(config, demo).await,
    }
}

async fn run_demo(config: BridgeConfig, demo: DemoArgs) -> Result<()> {
    let operator = config.operator()?;
    let (ledger, events) = MemoryLedger::new();

    let deployment = deploy_connector(
        ledger.as_ref(),
        operator,
        Bytes::new(),
        Bytes::new(),
        U256::from(config.deploy_gas),
    )
    .await?;

    let sink = Arc::new(UnreadBadge::new(Arc::new(TracingSink)));
    let service = Arc::new(HttpQueryService::new(&config.service)?);
    let bridge = OracleBridge::new(
        &config,
        deployment.connector,
        ledger.clone(),
        service,
        sink.clone(),
    )?;
    let registry = bridge.registry();

    ledger.emit_transaction(vec![demo_log(&demo, deployment.connector, operator)]);

    tokio::select! {
        _ = bridge.run(events) => {}
        _ = wait_settled(&registry) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
        }
    }
    bridge.shutdown_token().cancel();

    sink.mark_seen();
    for query in registry.history() {
        let result = query.result.clone().unwrap_or_else(|| "<none>".to_string());
        match &query.error {
            Some(error) => info!(
                "[{:?}] {} {} = {} ({})",
                query.status, query.datasource, query.formula, result, error
            ),
            None => {
                info!("[{:?}] {} {} = {}", query.status, query.datasource, query.formula, result)
            }
        }
    }
    Ok(())
}

/// A `Log1` event the connector would emit for the demo query.
fn demo_log(demo: &DemoArgs, connector: Address, operator: Address) -> LogEntry {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    let payload = encode(&[
        Token::Address(operator),
        Token::FixedBytes(H256::from_low_u64_be(now).as_bytes().to_vec()),
        Token::Uint(U256::from(now)),
        Token::String(demo.datasource.clone()),
        Token::String(demo.query.clone()),
        Token::Uint(U256::from(500_000u64)),
        Token::FixedBytes(vec![demo.proof_type]),
        Token::Uint(U256::from(20_000_000_000u64)),
    ]);
    LogEntry {
        emitter: connector,
        topics: vec![event_signature(LOG1_DECLARATION)],
        payload: payload.into(),
    }
}

async fn wait_settled(registry: &Arc<QueryRegistry>) {
    loop {
        tokio::time::sleep(Duration::from_millis(500)).await;
        if !registry.history().is_empty() && registry.outstanding() == 0 {
            break;
        }
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
