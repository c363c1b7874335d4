//! skill-atlas HTTP daemon.
//!
//! Serves the chat, roadmap, learning-track and agent data APIs described in
//! [`skill_atlas::server`].
//!
//! Configuration comes from `$XDG_CONFIG_HOME/skill-atlas/config.toml` (or
//! `--config`), overridden by environment variables; a `.env` file in the
//! working directory is loaded first.
//!
//! Build and run: `cargo run --bin atlasd`

use std::path::PathBuf;

use clap::Parser;
use miette::{IntoDiagnostic, Result};

use skill_atlas::config::AtlasConfig;
use skill_atlas::paths::AtlasPaths;
use skill_atlas::server::{AppState, router};

#[derive(Parser)]
#[command(name = "atlasd", version, about = "skill-atlas HTTP daemon")]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/skill-atlas/config.toml).
    #[arg(long, env = "ATLAS_CONFIG")]
    config: Option<PathBuf>,

    /// Root all state under this directory instead of the XDG locations.
    #[arg(long, env = "ATLAS_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,hyper=warn,reqwest=warn")),
        )
        .init();

    let args = Args::parse();

    let paths = match &args.data_dir {
        Some(dir) => AtlasPaths::rooted(dir),
        None => AtlasPaths::resolve()?,
    };
    paths.ensure_dirs()?;

    let config_file = args.config.unwrap_or_else(|| paths.config_file());
    let config = AtlasConfig::resolve(&config_file)?;
    let addr = config.bind_addr();
    let prefix = config.server.url_prefix.clone();

    let state = AppState::from_config(config, &paths)?;
    tracing::info!(
        agents = ?state.chat.chain().strategy_names(),
        tracks = state.tracks.backend(),
        identity = state.identity.name(),
        "skill-atlas initialized"
    );

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await.into_diagnostic()?;
    tracing::info!(%addr, prefix = %prefix, "skill-atlas listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    tracing::info!("skill-atlas stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
