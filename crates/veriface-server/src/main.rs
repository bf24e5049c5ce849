//! veriface server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `VERIFACE_*` environment variables, opens the encrypted SQLite store, and
//! serves the enrollment API over HTTP.
//!
//! # Key generation
//!
//! To generate a fresh `encryption_key` / `signing_key` pair for config.toml:
//!
//! ```sh
//! cargo run -p veriface-server -- --generate-keys
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use veriface_server::{ServerConfig, spawn_session_purge};
use veriface_store_sqlite::StoreKeys;

#[derive(Parser)]
#[command(author, version, about = "veriface enrollment server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print a fresh store key pair as TOML and exit.
  #[arg(long)]
  generate_keys: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.generate_keys {
    let (encryption, signing) = StoreKeys::generate().to_base64();
    println!("encryption_key = \"{encryption}\"");
    println!("signing_key = \"{signing}\"");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("VERIFACE"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  tracing::debug!(config = ?server_cfg, "configuration loaded");

  let server = veriface_server::build(&server_cfg)
    .await
    .context("failed to assemble server")?;

  let purge = spawn_session_purge(server.sessions, server_cfg.purge_interval()?);

  let address = server_cfg.address();
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, server.router)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  purge.abort();
  tracing::info!("shut down");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
}
