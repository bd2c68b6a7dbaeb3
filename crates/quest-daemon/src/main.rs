//! quest-daemon: the Quest scoring and ledger daemon.
//!
//! Single OS process running a Tokio async runtime. UI clients talk to the
//! daemon via JSON-RPC over a Unix socket; an overdue sweeper runs alongside.

mod commands;
mod config;
mod events;
mod factor_source;
mod rpc;
mod sweep;

use std::sync::Arc;

use quest_reactions::throttle::VoteThrottle;
use quest_scoring::ScoringProfile;
use quest_types::reaction::VoteWeight;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::config::DaemonConfig;
use crate::events::EventBus;
use crate::factor_source::ProcessFactorSource;
use crate::rpc::RpcServer;

/// Per-subscriber buffer of change notices.
const EVENT_BUFFER: usize = 1000;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Database connection.
    pub db: Arc<tokio::sync::Mutex<rusqlite::Connection>>,
    /// Configuration.
    pub config: DaemonConfig,
    /// Event bus for pushing change notices to subscribers.
    pub event_bus: EventBus,
    /// Active scoring profile.
    pub profile: ScoringProfile,
    /// External factor extraction, if configured.
    pub factor_source: Option<ProcessFactorSource>,
    /// How reactions adjust balances.
    pub vote_weight: VoteWeight,
    /// Shutdown signal sender.
    pub shutdown_tx: broadcast::Sender<()>,
}

impl DaemonState {
    /// Build state from a loaded config and an open database.
    pub fn new(config: DaemonConfig, conn: rusqlite::Connection) -> anyhow::Result<Self> {
        let profile = config.scoring.profile()?;
        let vote_weight = config.reactions.vote_weight()?;
        let factor_source = ProcessFactorSource::from_config(&config.scoring);
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

        Ok(Self {
            db: Arc::new(tokio::sync::Mutex::new(conn)),
            event_bus: EventBus::new(EVENT_BUFFER),
            profile,
            factor_source,
            vote_weight,
            shutdown_tx,
            config,
        })
    }

    /// A fresh vote throttle for a new UI session.
    pub fn new_throttle(&self) -> VoteThrottle {
        VoteThrottle::new(
            self.config.reactions.throttle_max_changes,
            self.config.reactions.throttle_window_ms,
        )
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Current Unix time in milliseconds.
pub fn unix_now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // Initialize tracing
    let directive = format!("quest={}", config.advanced.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .init();

    info!("Quest daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open database
    let conn = quest_db::open(&data_dir.join("quest.db"))?;

    // 3. Build daemon state
    let state = Arc::new(DaemonState::new(config, conn)?);
    info!(
        profile = %state.config.scoring.profile,
        factor_source = state.factor_source.is_some(),
        vote_weight_enabled = state.vote_weight.is_enabled(),
        "scoring configured"
    );

    // 4. Start overdue sweeper
    let sweeper = tokio::spawn(sweep::run(state.clone(), state.shutdown_tx.subscribe()));

    // 5. Start IPC server
    let socket_path = data_dir.join("daemon.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    info!("Starting JSON-RPC server on {:?}", socket_path);

    // 6. Run the RPC server until shutdown
    let mut shutdown_rx = state.shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Graceful shutdown
    info!("Daemon shutting down gracefully");
    let _ = state.shutdown_tx.send(());
    let _ = sweeper.await;

    // Clean up socket file
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}

/// State over an in-memory database with default configuration.
#[cfg(test)]
pub(crate) fn test_state() -> Arc<DaemonState> {
    let conn = quest_db::open_memory().expect("in-memory db");
    Arc::new(DaemonState::new(DaemonConfig::default(), conn).expect("default state"))
}
