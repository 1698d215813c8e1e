use anyhow::Result;
use bp_sync::chain::ChainClient;
use bp_sync::config::SyncConfig;
use bp_sync::logging;
use bp_sync::runner::SyncRunner;
use bp_sync::store::Store;
use clap::Parser;
use reqwest::Client;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "bp-sync",
    version,
    about = "Sync registered block producers and their bp.json into the store"
)]
struct Cli {
    /// Override the chain API endpoint (CHAIN_API_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,

    /// Override the chain row limit (CHAIN_ROW_LIMIT)
    #[arg(long)]
    row_limit: Option<u32>,

    /// Fetch and merge, but skip all store writes
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    if let Err(err) = logging::init_tracing("info,sqlx=warn") {
        eprintln!("failed to initialize logging: {err}");
    }

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error!(error = %err, "block producer sync failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = SyncConfig::from_env()?;
    if let Some(endpoint) = cli.endpoint {
        config.chain.endpoint = endpoint.trim_end_matches('/').to_string();
    }
    if let Some(limit) = cli.row_limit {
        config.chain.row_limit = limit;
    }
    config.log_snapshot();

    info!("==== updating block producer info ====");

    let http = Client::builder()
        .user_agent("bp-sync/0.1")
        .timeout(config.fetch_timeout)
        .build()?;
    let chain = ChainClient::new(config.chain.clone(), http.clone());
    let store = if cli.dry_run {
        None
    } else {
        Some(Store::connect(&config.db).await?)
    };

    let runner = SyncRunner::new(chain, store, http);
    let summary = runner.run().await?;
    info!(
        producers = summary.producers,
        fetch_attempts = summary.fetch_attempts,
        fetch_failures = summary.fetch_failures,
        saved = summary.saved,
        save_failures = summary.save_failures,
        degraded = summary.degraded,
        elapsed_ms = summary.elapsed_ms,
        "run summary"
    );
    // One-line JSON summary on stdout for the periodic invoker.
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
