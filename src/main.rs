use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dirsyncd::auth::TokenSource;
use dirsyncd::config::DaemonConfig;
use dirsyncd::controller::Controller;
use dirsyncd::directory::{DirectoryApi, DirectoryClient};
use dirsyncd::gitea::{GiteaApi, GiteaClient};
use dirsyncd::AppContext;

#[derive(Parser)]
#[command(
    name = "dirsyncd",
    about = "Directory ↔ Gitea reconciliation daemon",
    version
)]
struct Args {
    /// Path to config.toml
    #[arg(long, env = "DIRSYNCD_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port (webhook ingress, health, metrics)
    #[arg(long, env = "DIRSYNCD_PORT")]
    port: Option<u16>,

    /// Bind address (default: 127.0.0.1; use 0.0.0.0 to accept deliveries from the network)
    #[arg(long, env = "DIRSYNCD_BIND")]
    bind_address: Option<String>,

    /// Data directory for the durable state snapshot
    #[arg(long, env = "DIRSYNCD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DIRSYNCD_LOG")]
    log: Option<String>,

    /// Directory service client secret
    #[arg(long, env = "DIRSYNCD_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Gitea admin access token
    #[arg(long, env = "DIRSYNCD_GITEA_TOKEN", hide_env_values = true)]
    gitea_token: Option<String>,

    /// Webhook shared secret
    #[arg(long, env = "DIRSYNCD_WEBHOOK_SECRET", hide_env_values = true)]
    webhook_secret: Option<String>,
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(l) => EnvFilter::new(l),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log.as_deref());

    let mut config = DaemonConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind_address {
        config.bind_address = bind;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(secret) = args.client_secret {
        config.directory.client_secret = secret;
    }
    if let Some(token) = args.gitea_token {
        config.gitea.token = token;
    }
    if let Some(secret) = args.webhook_secret {
        config.webhook.secret = secret;
    }
    config.validate();

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()
        .context("building http client")?;

    let tokens = Arc::new(TokenSource::new(
        http.clone(),
        config.directory.token_url.clone(),
        config.directory.client_id.clone(),
        config.directory.client_secret.clone(),
    ));
    let directory: Arc<dyn DirectoryApi> = Arc::new(DirectoryClient::new(
        http.clone(),
        config.directory.base_url.clone(),
        tokens,
    ));
    let gitea: Arc<dyn GiteaApi> = Arc::new(GiteaClient::new(
        http,
        config.gitea.base_url.clone(),
        config.gitea.token.clone(),
    ));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        org = %config.gitea.org,
        "dirsyncd starting"
    );

    let ctx = Arc::new(AppContext::new(config, directory, gitea));
    Controller::run(ctx).await
}
