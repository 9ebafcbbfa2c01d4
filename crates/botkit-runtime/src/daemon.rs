//! `botkit run`: wire config, logging, transport and consumers together
//! and supervise the multiplexer until it stops or a signal arrives.

use std::path::Path;
use std::sync::Arc;

use botkit_core::types::{
    GcReceivedMsg, KxCompleted, ReceivedGcInvite, ReceivedPm, ReceivedPost, ReceivedPostStatus,
    ReceivedTip, TipProgressEvent,
};
use botkit_core::{BotConfig, EventKind, MemoryFeed, MemoryTransport};
use botkit_log::{LogBackend, Logger};
use botkit_runtime::replay::replay;
use botkit_runtime::{Bot, NotificationRoutes, Route};
use serde::Serialize;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::RunOpts;

pub const APP_NAME: &str = "botkit";
pub const CONFIG_FILE: &str = "botkit.conf";

pub async fn run(opts: RunOpts, config_dir: Option<&str>) -> anyhow::Result<()> {
    let cfg = BotConfig::load(config_dir, APP_NAME, CONFIG_FILE)?;

    let mut log_cfg = cfg.log_config();
    if let Some(level) = opts.debuglevel.clone() {
        log_cfg.debug_level = level;
    }
    if let Some(rotation) = opts.rotation {
        log_cfg.rotation = rotation;
    }
    log_cfg.use_stdout = !opts.no_stdout;
    if opts.no_stdout {
        log_cfg.error_callback = Some(Arc::new(|payload: &str| eprintln!("error: {payload}")));
    }

    let backend = Arc::new(LogBackend::new(log_cfg)?);
    tracing_subscriber::registry()
        .with(backend.layer())
        .init();

    tracing::info!(target: "BOT", data_dir = %cfg.data_dir.display(), "botkit starting");

    let (transport, feed) = MemoryTransport::new();
    let mut consumers = JoinSet::new();
    let routes = build_routes(&backend, &opts, &mut consumers);
    let bot = Bot::new(Arc::new(transport), routes, backend.logger("BOT"));
    tracing::info!(target: "BOT", kinds = ?bot.active_kinds(), "subscriptions ready");

    if let Some(path) = opts.replay.clone() {
        let feed = feed.clone();
        let log = backend.logger("RPLY");
        tokio::spawn(async move {
            if let Err(e) = replay_source(&path, &feed, &log).await {
                log.error(format_args!("replay of {} failed: {e}", path.display()));
            }
        });
    }

    let cancel = CancellationToken::new();
    let mut bot_handle = tokio::spawn(bot.run(cancel.clone()));

    let finished = tokio::select! {
        () = shutdown_signal() => None,
        joined = &mut bot_handle => Some(joined?),
    };
    let outcome = match finished {
        Some(outcome) => outcome,
        None => {
            cancel.cancel();
            bot_handle.await?
        }
    };
    drop(feed);

    // Routes are gone with the bot; consumers drain what was forwarded.
    while consumers.join_next().await.is_some() {}

    let result = match outcome {
        Err(e) if e.is_cancelled() => {
            tracing::info!(target: "BOT", "botkit stopped");
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context("multiplexer stopped")),
        Ok(never) => match never {},
    };
    backend.close()?;
    result
}

fn build_routes(
    backend: &LogBackend,
    opts: &RunOpts,
    consumers: &mut JoinSet<()>,
) -> NotificationRoutes {
    let cap = opts.channel_capacity.max(1);
    let mut routes = NotificationRoutes::default();
    for kind in opts.selected_kinds() {
        let log = backend.logger(kind.subsystem());
        match kind {
            EventKind::GroupMessage => {
                routes.group_messages = Some(echo::<GcReceivedMsg>(log, cap, consumers));
            }
            EventKind::GroupInvite => {
                routes.group_invites = Some(echo::<ReceivedGcInvite>(log, cap, consumers));
            }
            EventKind::PrivateMessage => {
                routes.private_messages = Some(echo::<ReceivedPm>(log, cap, consumers));
            }
            EventKind::KxCompleted => {
                routes.kx_completed = Some(echo::<KxCompleted>(log, cap, consumers));
            }
            EventKind::Post => {
                routes.posts = Some(echo::<ReceivedPost>(log, cap, consumers));
            }
            EventKind::PostStatus => {
                routes.post_statuses = Some(echo::<ReceivedPostStatus>(log, cap, consumers));
            }
            EventKind::TipProgress => {
                routes.tip_progress = Some(echo::<TipProgressEvent>(log, cap, consumers));
            }
            EventKind::TipReceived => {
                routes.tips_received = Some(echo::<ReceivedTip>(log, cap, consumers));
            }
        }
    }
    routes
}

/// A route whose consumer logs every event as JSON.
fn echo<E>(log: Logger, capacity: usize, consumers: &mut JoinSet<()>) -> Route<E>
where
    E: Serialize + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<E>(capacity);
    let consumer_log = log.clone();
    consumers.spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => consumer_log.info(json),
                Err(e) => consumer_log.warn(format_args!("unable to encode event: {e}")),
            }
        }
    });
    Route::new(tx, log)
}

async fn replay_source(path: &Path, feed: &MemoryFeed, log: &Logger) -> std::io::Result<()> {
    let queued = if path == Path::new("-") {
        replay(BufReader::new(tokio::io::stdin()), feed, log).await?
    } else {
        let file = tokio::fs::File::open(path).await?;
        replay(BufReader::new(file), feed, log).await?
    };
    log.info(format_args!("replay of {} queued {queued} notifications", path.display()));
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = ctrl_c => tracing::info!(target: "BOT", "received ctrl-c, shutting down"),
                _ = sigterm.recv() => tracing::info!(target: "BOT", "received SIGTERM, shutting down"),
            },
            Err(e) => {
                tracing::warn!(target: "BOT", "unable to register SIGTERM handler: {e}");
                ctrl_c.await.ok();
                tracing::info!(target: "BOT", "received ctrl-c, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        tracing::info!(target: "BOT", "received ctrl-c, shutting down");
    }
}

/// Resolved configuration as `key=value` text, with the RPC password masked.
pub fn describe_config(config_dir: Option<&str>) -> anyhow::Result<String> {
    let mut cfg = BotConfig::load(config_dir, APP_NAME, CONFIG_FILE)?;
    if !cfg.rpc_pass.is_empty() {
        cfg.rpc_pass = "********".to_owned();
    }
    Ok(cfg.render())
}
