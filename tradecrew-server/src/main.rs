use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};
use tradecrew_core::{MarketDataProvider, TradecrewConfig};

use tradecrew_server::http::{start_http_server, HttpState};
use tradecrew_server::subsystems::jobs::queue::QueueService;
use tradecrew_server::subsystems::jobs::worker::run_worker;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "tradecrew.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Config first: the default log level comes from it
    let config = match TradecrewConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level)),
        )
        .init();

    let pool = match tradecrew_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match tradecrew_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        let queue = QueueService::connect(&config).await;
        if queue.is_available() {
            println!("✅ Job queue reachable");
        } else {
            println!("⚠️  Job queue unreachable, jobs would run synchronously");
        }

        println!("✅ tradecrew health check passed");
        return Ok(());
    }

    if let Err(e) = tradecrew_core::db::run_migrations(&pool).await {
        eprintln!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    let provider: Arc<dyn MarketDataProvider> =
        Arc::from(tradecrew_core::create_provider(&config.providers));
    let queue = Arc::new(QueueService::connect(&config).await);

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let state = Arc::new(HttpState::new(pool, config.clone(), queue, provider));

    // In-process worker is a development convenience
    if config.queue.worker_enabled && !config.service.is_production() {
        let worker_shutdown = tx.subscribe();
        tokio::spawn(run_worker(
            state.jobs.clone(),
            config.queue.clone(),
            worker_shutdown,
        ));
    } else {
        tracing::info!(
            environment = %config.service.environment,
            worker_enabled = config.queue.worker_enabled,
            "In-process job worker disabled"
        );
    }

    start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
