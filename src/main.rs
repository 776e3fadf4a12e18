use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fillwatch::config::{Config, Secrets};
use fillwatch::coordinator::{Coordinator, IngestBatch};
use fillwatch::health::{self, HealthCounters};
use fillwatch::hyperliquid::InfoClient;
use fillwatch::mirror::{Mirror, MirrorHook as _};
use fillwatch::notify::{self, LogNotifier, Sink, TelegramNotifier};
use fillwatch::poller::{self, FillsPoller};
use fillwatch::positions::{self, PositionReporter};
use fillwatch::stream::{self, StreamSettings};
use fillwatch::{format, graceful_shutdown};

#[derive(Parser, Debug)]
#[command(
    name = "fillwatch",
    version,
    about = "Relay a Hyperliquid address's fills and positions to Telegram"
)]
struct Args {
    /// Optional TOML overrides; defaults apply when the file is absent.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// Log notifications instead of sending them.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let cfg = Config::load(&args.config).context("load config")?;
    let secrets = Secrets::from_env(&cfg, args.dry_run).context("read environment")?;

    let sink = Arc::new(match &secrets.telegram {
        Some(creds) if !args.dry_run => Sink::Telegram(
            TelegramNotifier::new(&cfg.telegram, &cfg.hyperliquid, creds)
                .context("build telegram sink")?,
        ),
        _ => Sink::Log(LogNotifier),
    });
    let notice_wait = Duration::from_millis(cfg.watch.notice_timeout_ms);

    graceful_shutdown::crash_guard(sink.as_ref(), notice_wait, run(cfg, secrets, sink.clone()))
        .await
}

async fn run(cfg: Config, secrets: Secrets, sink: Arc<Sink>) -> anyhow::Result<()> {
    let health = Arc::new(HealthCounters::default());
    let (shutdown_tx, shutdown_rx) = graceful_shutdown::channel();
    let notice_wait = Duration::from_millis(cfg.watch.notice_timeout_ms);

    let mirror = Mirror::from_settings(secrets.mirror_enabled, secrets.mirror_key.as_deref())
        .context("configure mirror")?;
    let api = Arc::new(InfoClient::new(&cfg.hyperliquid).context("build info client")?);
    let address = secrets.address.clone();

    info!(
        %address,
        mirror = mirror.is_armed(),
        poll_interval_ms = cfg.watch.poll_interval_ms,
        position_interval_ms = cfg.watch.position_interval_ms,
        "starting watcher"
    );
    notify::send_best_effort(
        sink.as_ref(),
        &format::startup_message(&address, mirror.is_armed()),
        notice_wait,
    )
    .await;

    let (ingest_tx, ingest_rx) = mpsc::channel::<IngestBatch>(cfg.watch.ingest_queue);

    let coordinator = Coordinator::new(sink.clone(), mirror, health.clone());
    let coordinator_handle = tokio::spawn(coordinator.run(ingest_rx, shutdown_rx.clone()));

    let poller_handle = tokio::spawn(poller::run_fills_poller(
        FillsPoller::new(api.clone(), address.clone(), cfg.watch.poll_take),
        Duration::from_millis(cfg.watch.poll_interval_ms),
        ingest_tx.clone(),
        health.clone(),
        shutdown_rx.clone(),
    ));

    let mut stream_handle = tokio::spawn(stream::run_user_fills_stream(
        StreamSettings::from_config(&cfg, &address),
        ingest_tx,
        health.clone(),
        shutdown_rx.clone(),
    ));

    let positions_handle = tokio::spawn(positions::run_position_reporter(
        PositionReporter::new(api, sink.clone(), address),
        Duration::from_millis(cfg.watch.position_interval_ms),
        health.clone(),
        shutdown_rx.clone(),
    ));

    let heartbeat_handle = health::spawn_heartbeat(
        health,
        Duration::from_millis(cfg.watch.heartbeat_interval_ms),
        shutdown_rx,
    );

    tokio::select! {
        res = coordinator_handle => {
            res.context("coordinator task join")??;
            warn!("coordinator stopped unexpectedly");
        }
        res = poller_handle => {
            res.context("poller task join")??;
            warn!("poller stopped unexpectedly");
        }
        res = &mut stream_handle => {
            res.context("ws task join")??;
            warn!("ws supervisor stopped unexpectedly");
        }
        res = positions_handle => {
            res.context("position task join")??;
            warn!("position reporter stopped unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received; shutting down");
        }
    }

    graceful_shutdown::wind_down(sink.as_ref(), &shutdown_tx, &mut stream_handle, notice_wait)
        .await;
    heartbeat_handle.abort();

    info!("done");
    Ok(())
}
