//! tactoe battle server.
//!
//! ```bash
//! TACTOE_PORT=50051 TACTOE_RUN_MODE=release cargo run --package tactoe-server
//! ```
//!
//! `RUST_LOG` overrides the run mode's default log level.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tactoe::{ServerConfig, TactoeServerBuilder};
use tactoe_room::RoomConfig;
use tactoe_session::SessionConfig;
use tactoe_store::{MemoryDb, StoreConfig, spawn_sweeper};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// How verbose the server is by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RunMode {
    Debug,
    Release,
}

impl RunMode {
    fn default_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "info",
        }
    }
}

/// CLI arguments. Every flag can also come from the environment.
#[derive(Parser, Debug)]
#[command(name = "tactoe-server")]
#[command(about = "Real-time stacking tic-tac-toe battle server")]
struct Args {
    /// Interface to listen on.
    #[arg(long, env = "TACTOE_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "TACTOE_PORT", default_value_t = 50051)]
    port: u16,

    /// `debug` logs every move; `release` logs lifecycle events only.
    #[arg(long, env = "TACTOE_RUN_MODE", value_enum, default_value_t = RunMode::Debug)]
    run_mode: RunMode,

    /// Seconds an idle room survives.
    #[arg(long, env = "TACTOE_ROOM_TTL_SECS", default_value_t = 900)]
    room_ttl_secs: u64,

    /// Snapshots kept per room log.
    #[arg(long, env = "TACTOE_MAX_STREAM_LEN", default_value_t = 64)]
    max_stream_len: usize,

    /// Seconds a silent connection is kept open.
    #[arg(long, env = "TACTOE_IDLE_TIMEOUT_SECS", default_value_t = 600)]
    idle_timeout_secs: u64,
}

impl Args {
    fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_stream_len: self.max_stream_len,
            ..StoreConfig::default()
        }
    }

    fn room_config(&self) -> RoomConfig {
        RoomConfig {
            ttl: Duration::from_secs(self.room_ttl_secs),
            ..RoomConfig::default()
        }
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.run_mode.default_filter())))
        .init();

    tracing::info!(addr = %args.bind_addr(), run_mode = ?args.run_mode, "tactoe server starting");

    let store_config = args.store_config();
    let db = Arc::new(MemoryDb::new(store_config.clone()));
    let sweeper = spawn_sweeper(Arc::clone(&db), store_config.sweep_interval);

    let server = TactoeServerBuilder::new()
        .bind(&args.bind_addr())
        .server_config(args.server_config())
        .room_config(args.room_config())
        .session_config(SessionConfig::default())
        .build(Arc::clone(&db))
        .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                return;
            }
            tracing::info!("ctrl-c received");
        })
        .await?;

    db.close("server stopped").await;
    sweeper.abort();
    Ok(())
}
