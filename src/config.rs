use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::models::RunId;
use crate::retry::RetryConfig;

pub const CONFIG_FILE: &str = "account-roundtrip.toml";
pub const ENV_PREFIX: &str = "ACCOUNT_ROUNDTRIP";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting '{key}' (set {env} or add it to {CONFIG_FILE})")]
    Missing { key: &'static str, env: &'static str },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Main configuration structure for the account round trip
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountRoundtripConfig {
    pub salesforce: SalesforceConfig,
    pub github: GitHubConfig,
    pub workflow: WorkflowConfig,
    pub observability: ObservabilityConfig,
    /// Per-request timeout for both remote systems
    pub http_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SalesforceConfig {
    /// Login / token host, e.g. https://my-domain.my.salesforce.com
    pub instance_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_version: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubConfig {
    pub token: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    /// Override for GitHub Enterprise hosts
    pub api_base_url: Option<String>,
    /// Branch the export is published to and the side branch is cut from
    pub base_branch: String,
    pub rate_limit: RateLimitConfig,
    /// Fail when a side branch already exists at a different commit
    pub verify_existing_branch: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_capacity: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Directory in the repository that holds exported files
    pub namespace: String,
    /// Explicit run identifier; blank means date-based
    pub run_id: Option<String>,
    pub run_id_prefix: String,
    pub account_count: usize,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// Structured JSON output instead of human-readable lines
    pub json: bool,
}

impl Default for AccountRoundtripConfig {
    fn default() -> Self {
        Self {
            salesforce: SalesforceConfig {
                api_version: "v60.0".to_string(),
                ..Default::default()
            },
            github: GitHubConfig {
                token: None, // Will be read from GITHUB_TOKEN
                owner: None,
                repo: None,
                api_base_url: None,
                base_branch: "main".to_string(),
                rate_limit: RateLimitConfig {
                    requests_per_second: 5,
                    burst_capacity: 10,
                },
                verify_existing_branch: false,
            },
            workflow: WorkflowConfig {
                namespace: "data-autotest".to_string(),
                run_id: None,
                run_id_prefix: "roundtrip".to_string(),
                account_count: 5,
                retry: RetrySettings {
                    max_attempts: 3,
                    base_delay_ms: 300,
                },
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json: true,
            },
            http_timeout_ms: 15_000,
        }
    }
}

impl AccountRoundtripConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (account-roundtrip.toml)
    /// 3. Environment variables (prefixed with ACCOUNT_ROUNDTRIP__)
    /// 4. Well-known unprefixed variables (SF_*, GITHUB_*, RUN_ID, HTTP_TIMEOUT_MS)
    ///    for settings still unset
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let defaults = Config::try_from(&Self::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut loaded: AccountRoundtripConfig = builder.build()?.try_deserialize()?;
        loaded.apply_env_fallbacks(|key| std::env::var(key).ok());
        Ok(loaded)
    }

    /// Fill unset values from the plain variable names the CI environment
    /// already exports.
    pub fn apply_env_fallbacks<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        fill(&mut self.salesforce.instance_url, get("SF_INSTANCE_URL"));
        fill(&mut self.salesforce.client_id, get("SF_CLIENT_ID"));
        fill(&mut self.salesforce.client_secret, get("SF_CLIENT_SECRET"));
        fill(&mut self.github.owner, get("GITHUB_OWNER"));
        fill(&mut self.github.repo, get("GITHUB_REPO"));
        fill(&mut self.github.token, get("GITHUB_TOKEN"));
        fill(&mut self.workflow.run_id, get("RUN_ID"));

        if let Some(timeout) = get("HTTP_TIMEOUT_MS").and_then(|v| v.trim().parse().ok()) {
            self.http_timeout_ms = timeout;
        }
    }

    /// Resolve the run identifier once; callers pass it down explicitly.
    pub fn run_id(&self) -> RunId {
        RunId::resolve_today(self.workflow.run_id.as_deref(), &self.workflow.run_id_prefix)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.workflow.retry.max_attempts,
            base_delay: Duration::from_millis(self.workflow.retry.base_delay_ms),
        }
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.as_deref().map_or(true, |v| v.trim().is_empty()) {
        if let Some(value) = value {
            *slot = Some(value.trim().to_string());
        }
    }
}

fn require(
    value: &Option<String>,
    key: &'static str,
    env: &'static str,
) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::Missing { key, env })
}

impl SalesforceConfig {
    pub fn require_instance_url(&self) -> Result<String, ConfigError> {
        require(&self.instance_url, "salesforce.instance_url", "SF_INSTANCE_URL")
    }

    pub fn require_client_id(&self) -> Result<String, ConfigError> {
        require(&self.client_id, "salesforce.client_id", "SF_CLIENT_ID")
    }

    pub fn require_client_secret(&self) -> Result<String, ConfigError> {
        require(&self.client_secret, "salesforce.client_secret", "SF_CLIENT_SECRET")
    }
}

impl GitHubConfig {
    pub fn require_token(&self) -> Result<String, ConfigError> {
        require(&self.token, "github.token", "GITHUB_TOKEN")
    }

    pub fn require_owner(&self) -> Result<String, ConfigError> {
        require(&self.owner, "github.owner", "GITHUB_OWNER")
    }

    pub fn require_repo(&self) -> Result<String, ConfigError> {
        require(&self.repo, "github.repo", "GITHUB_REPO")
    }
}
