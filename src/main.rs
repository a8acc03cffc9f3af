use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use navisafe::api::{self, AppState};
use navisafe::config::Config;

#[derive(Parser)]
#[command(name = "navisafe", version, about = "Black spot aware route planning API")]
struct Args {
    /// TOML config file (defaults to $NAVISAFE_CONFIG, then ./navisafe.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("navisafe=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    // 1. Configuration
    let config = Config::load(args.config.as_deref())?;
    let bind = config.server.bind.clone();
    if config.briefing.api_key.is_none() {
        info!("No briefing API key set, briefings will use the fallback template");
    }

    // 2. Black spots and provider clients
    let state = AppState::new(config)?;
    info!("Serving with {} black spots", state.store.len());

    // 3. Router
    let app = api::router(Arc::new(state));

    info!("NaviSafe API v{} listening on http://{}", env!("CARGO_PKG_VERSION"), bind);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down gracefully");
        })
        .await?;

    Ok(())
}
