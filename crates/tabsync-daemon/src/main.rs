//! Headless tabsync peer.
//!
//! Runs a full sync engine against an in-memory host adapter: useful for
//! exercising a live IDE plugin (or a second headless instance) on the
//! same project path from the command line. Every applied action lands in
//! the log.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tabsync_core::config::{HostInfo, Role, SyncConfig, Tuning};
use tabsync_core::editor_state::IdeFamily;
use tabsync_core::host::MockHost;
use tabsync_daemon::SyncEngine;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tabsync-daemon")]
#[command(about = "Headless editor-focus sync peer")]
struct Args {
    /// Absolute path of the project to join
    #[arg(short, long)]
    project: PathBuf,

    /// IDE family to impersonate (decides path style and default role)
    #[arg(long, value_enum, default_value = "a")]
    family: FamilyArg,

    /// Override the family's default role
    #[arg(long, value_enum)]
    role: Option<RoleArg>,

    /// Use a fixed port instead of the automatic scan range
    #[arg(long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FamilyArg {
    A,
    B,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RoleArg {
    Listener,
    Scanner,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_directive = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .init();

    let family = match args.family {
        FamilyArg::A => IdeFamily::A,
        FamilyArg::B => IdeFamily::B,
    };
    let project = args.project.to_string_lossy().to_string();

    let mut info = HostInfo::new(family, "HEADLESS", "tabsync-daemon 0.3", project);
    if let Some(role) = args.role {
        info = info.with_role(match role {
            RoleArg::Listener => Role::Listener,
            RoleArg::Scanner => Role::Scanner,
        });
    }

    let config = SyncConfig {
        use_custom_port: args.port.is_some(),
        custom_port: args.port.unwrap_or(3000),
        auto_start_sync: true,
    };

    let host = Arc::new(MockHost::new());
    let engine = SyncEngine::start(host, info, config, Tuning::default());
    engine.set_status_callback(Arc::new(|state| {
        info!(state = %state, "connection");
    }));

    info!(instance = %engine.instance_id(), "headless peer running, ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    engine.dispose().await;
    Ok(())
}
