use anyhow::Context;
use bridge::broadcaster::{Broadcaster, BROADCAST_INTERVAL};
use bridge::registry::Registry;
use bridge::routes::routes;
use clap::Parser;
use feedcore::store::SqliteStore;
use feedcore::telemetry::BroadcastMetrics;
use generator::profile::DemoGenerator;
use log::{error, info};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::ServerConfig;

mod bridge;
mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Live detection feed broadcaster")]
struct Args {
    /// Load the server config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Address for the websocket stream and query endpoint
    #[arg(long, env = "FEED_BIND")]
    bind: Option<SocketAddr>,
    /// SQLite database holding the detections
    #[arg(long, env = "DB_URL")]
    database: Option<PathBuf>,
    /// Write synthetic detections into the database
    #[arg(long, default_value_t = false)]
    demo: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = if let Some(path) = args.config {
        ServerConfig::load(path)?
    } else {
        ServerConfig::default()
    };
    config.apply_overrides(args.bind, args.database, args.demo);

    let store = Arc::new(
        SqliteStore::open(&config.database)
            .with_context(|| format!("opening database {}", config.database.display()))?,
    );
    let existing = store.count().context("counting stored detections")?;
    info!(
        "database {} holds {} detections",
        config.database.display(),
        existing
    );

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating server runtime")?;
    runtime.block_on(serve(config, store))
}

async fn serve(config: ServerConfig, store: Arc<SqliteStore>) -> anyhow::Result<()> {
    let metrics = Arc::new(BroadcastMetrics::new());
    let broadcaster = Broadcaster::new(store.clone(), Registry::new(), metrics.clone());

    if let Some(demo) = config.demo.clone() {
        let generator = DemoGenerator::new(demo).context("configuring demo generator")?;
        info!("demo generator enabled");
        tokio::spawn(generator.run(store.clone()));
    }

    let ticker = tokio::spawn(broadcaster.clone().run(BROADCAST_INTERVAL));

    let shutdown = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("awaiting Ctrl+C failed: {}", err);
        }
    };
    let (addr, server) = warp::serve(routes(broadcaster))
        .try_bind_with_graceful_shutdown(config.bind, shutdown)
        .with_context(|| format!("binding {}", config.bind))?;
    info!("detection feed running at http://{}/ (Ctrl+C to stop)", addr);

    server.await;
    ticker.abort();

    let totals = metrics.snapshot();
    info!(
        "shutdown: {} ticks delivered, {} failed, {} frames sent, {} send failures, \
         {} viewers served",
        totals.ticks_delivered,
        totals.ticks_failed,
        totals.frames_sent,
        totals.send_failures,
        totals.viewers_connected
    );
    Ok(())
}
