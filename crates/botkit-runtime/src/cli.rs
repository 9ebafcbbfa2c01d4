//! CLI definition using clap derive.

use std::path::PathBuf;

use botkit_core::EventKind;
use botkit_log::RotationPolicy;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "botkit", about = "notification multiplexer for relay bots")]
pub struct Cli {
    /// Directory holding botkit.conf (default: per-platform data dir)
    #[arg(long, global = true, env = "BOTKIT_CONFIG_DIR")]
    pub config_dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Subscribe to notifications and echo them to the log
    Run(RunOpts),
    /// Print the resolved configuration
    Config,
}

#[derive(clap::Args)]
pub struct RunOpts {
    /// Debug level spec, e.g. `info` or `info,PM=debug`
    #[arg(long, env = "BOTKIT_DEBUGLEVEL")]
    pub debuglevel: Option<String>,

    /// Replay NDJSON notifications from a file, or `-` for stdin
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Do not mirror log records to stdout
    #[arg(long)]
    pub no_stdout: bool,

    /// Event kinds to subscribe to (default: all)
    #[arg(long, value_delimiter = ',')]
    pub kinds: Vec<EventKind>,

    /// Log file rotation: a size such as `1mb` (default), or minutely, hourly, daily, never
    #[arg(long)]
    pub rotation: Option<RotationPolicy>,

    /// Per-kind consumer channel capacity
    #[arg(long, default_value = "16")]
    pub channel_capacity: usize,
}

impl RunOpts {
    /// Requested kinds, or every kind when none were named.
    pub fn selected_kinds(&self) -> Vec<EventKind> {
        if self.kinds.is_empty() {
            return EventKind::ALL.to_vec();
        }
        let mut kinds = self.kinds.clone();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}
