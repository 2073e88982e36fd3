use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use slumber_api::api::Renderer;
use slumber_api::auth::JwtTokenAuthority;
use slumber_api::config::{self, AppConfig};
use slumber_api::database;
use slumber_api::server::{self, AppState, HttpOptions};

const REVOCATION_SWEEP_SECS: u64 = 60 * 60;

#[derive(Parser)]
#[command(name = "slumber-api")]
#[command(about = "Versioned REST API server")]
#[command(version)]
struct Args {
    #[arg(long, help = "Port to listen on (overrides SERVER_PORT)")]
    port: Option<u16>,

    #[arg(long, help = "Interface to bind (overrides SERVER_HOST)")]
    host: Option<String>,

    #[arg(long, help = "PostgreSQL connection URL; in-memory store when unset")]
    database_url: Option<String>,

    #[arg(long, help = "PEM RSA private key used to sign session tokens")]
    private_key: Option<String>,

    #[arg(long, help = "PEM RSA public key used to verify session tokens")]
    public_key: Option<String>,
}

impl Args {
    fn apply(self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(url) = self.database_url {
            config.database.url = Some(url).filter(|url| !url.is_empty());
        }
        if let Some(path) = self.private_key {
            config.security.private_key_path = path;
        }
        if let Some(path) = self.public_key {
            config.security.public_key_path = path;
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL and friends
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("slumber_api=info,tower_http=info")),
        )
        .init();

    if let Err(e) = run(Args::parse()).await {
        tracing::error!("Fatal: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = config::config().clone();
    args.apply(&mut config);
    config.validate()?;
    tracing::info!("Starting Slumber API in {:?} mode", config.environment);

    let tokens = JwtTokenAuthority::from_files(
        &config.security.private_key_path,
        &config.security.public_key_path,
    )
    .context("failed to load token signing keys")?
    .with_expiry_hours(config.security.token_expiry_hours);

    let db = database::connect(&config.database)
        .await
        .context("failed to open document store")?;

    server::spawn_revocation_sweeper(db.clone(), Duration::from_secs(REVOCATION_SWEEP_SECS));

    let state = AppState::new(db, Renderer::new(config.renderer.indent_json), Arc::new(tokens));
    let app = server::build_app(state, &HttpOptions::from_config(&config))?;

    server::serve(&config, app).await
}
