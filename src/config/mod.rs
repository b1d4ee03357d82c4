use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

const DEFAULT_PORT: u16 = 8742;
const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 1800;
const DEFAULT_RECONCILE_WARMUP_SECS: u64 = 30;
const DEFAULT_WEBHOOK_CHECK_INTERVAL_SECS: u64 = 300;
const DEFAULT_GROUP_SYNC_INTERVAL_SECS: u64 = 600;
const DEFAULT_RETRY_TICK_SECS: u64 = 5;
const DEFAULT_WEBHOOK_SYNC_TIMEOUT_SECS: u64 = 10;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/dirsyncd")
}

// ─── DirectoryConfig ─────────────────────────────────────────────────────────

/// Directory CRUD wrapper + token issuer (`[directory]` in config.toml).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Base URL of the directory CRUD wrapper.
    pub base_url: String,
    /// Token endpoint of the issuer (client-credentials grant).
    pub token_url: String,
    pub client_id: String,
    /// Usually injected via `DIRSYNCD_CLIENT_SECRET` rather than the file.
    pub client_secret: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            token_url: "http://127.0.0.1:8081/oauth/token".to_string(),
            client_id: "dirsyncd".to_string(),
            client_secret: String::new(),
        }
    }
}

// ─── GiteaConfig ─────────────────────────────────────────────────────────────

/// Gitea instance (`[gitea]` in config.toml).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GiteaConfig {
    pub base_url: String,
    /// Admin access token. Usually injected via `DIRSYNCD_GITEA_TOKEN`.
    pub token: String,
    /// Organization owning the reconciled teams.
    pub org: String,
    /// Initial password for materialized users (forced change on first login).
    pub default_password: String,
    /// Domain for fallback e-mail addresses when the directory has none.
    pub email_domain: String,
}

impl Default for GiteaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            token: String::new(),
            org: "main".to_string(),
            default_password: String::new(),
            email_domain: "example.invalid".to_string(),
        }
    }
}

// ─── WebhookConfig ───────────────────────────────────────────────────────────

/// Webhook ingress (`[webhook]` in config.toml).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Public URL Gitea should deliver to, e.g. `https://sync.example.com/webhook/gitea`.
    /// Empty disables self-registration.
    pub public_url: String,
    /// Shared HMAC secret. Empty means every delivery is rejected (500) —
    /// never an implicit allow. Usually injected via `DIRSYNCD_WEBHOOK_SECRET`.
    pub secret: String,
    /// Upper bound on a webhook-triggered targeted sync.
    pub sync_timeout_secs: Option<u64>,
}

impl WebhookConfig {
    pub fn sync_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(
            self.sync_timeout_secs
                .unwrap_or(DEFAULT_WEBHOOK_SYNC_TIMEOUT_SECS),
        )
    }
}

// ─── SyncConfig ──────────────────────────────────────────────────────────────

/// Loop cadence (`[sync]` in config.toml). All values in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub reconcile_interval_secs: u64,
    /// Delay before the first full reconcile pass.
    pub reconcile_warmup_secs: u64,
    pub webhook_check_interval_secs: u64,
    pub group_sync_interval_secs: u64,
    pub retry_tick_secs: u64,
    pub retry_capacity: usize,
    /// Permission for newly created teams.
    pub team_permission: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: DEFAULT_RECONCILE_INTERVAL_SECS,
            reconcile_warmup_secs: DEFAULT_RECONCILE_WARMUP_SECS,
            webhook_check_interval_secs: DEFAULT_WEBHOOK_CHECK_INTERVAL_SECS,
            group_sync_interval_secs: DEFAULT_GROUP_SYNC_INTERVAL_SECS,
            retry_tick_secs: DEFAULT_RETRY_TICK_SECS,
            retry_capacity: crate::retry::DEFAULT_CAPACITY,
            team_permission: "write".to_string(),
        }
    }
}

// ─── DaemonConfig ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Outbound HTTP timeout for directory / Gitea / token calls.
    pub http_timeout_secs: u64,
    pub directory: DirectoryConfig,
    pub gitea: GiteaConfig,
    pub webhook: WebhookConfig,
    pub sync: SyncConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: DEFAULT_PORT,
            data_dir: default_data_dir(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            directory: DirectoryConfig::default(),
            gitea: GiteaConfig::default(),
            webhook: WebhookConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load from a TOML file, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .map_err(|e| anyhow::anyhow!("reading {}: {e}", p.display()))?;
                toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {}: {e}", p.display()))?
            }
            None => Self::default(),
        };
        Ok(config)
    }

    /// Warn about configuration that will degrade at runtime. Nothing here
    /// is fatal: the daemon serves health and metrics regardless.
    pub fn validate(&self) {
        if self.webhook.secret.is_empty() {
            warn!("webhook secret not configured — all webhook deliveries will be rejected");
        }
        if self.gitea.token.is_empty() {
            warn!("gitea admin token not configured — hosting-platform calls will fail");
        }
        if self.directory.client_secret.is_empty() {
            warn!("directory client secret not configured — token acquisition will fail");
        }
        if self.gitea.default_password.is_empty() {
            warn!("no default password configured — user materialization will fail");
        }
    }

    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_secs)
    }
}
