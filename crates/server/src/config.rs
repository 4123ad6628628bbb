use std::path::Path;
use std::time::Duration;

use orchestrator::{SeedQuantities, TestRunSettings};
use phasestream_core::DemoProfiles;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

/// Overrides `server.admin_token` when set and non-empty.
pub const ADMIN_TOKEN_ENV: &str = "PHASESTREAM_ADMIN_TOKEN";

pub const DEFAULT_PORT: u16 = 3001;

/// Engine configuration, usually read from `phasestream.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub server: ServerConfig,
    pub demo: DemoConfig,
    pub tests: TestsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token for the admin routes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
    /// Allow admin routes without a token when none is configured
    pub allow_unauthenticated: bool,
    /// Interval between keep-alive comments on idle event streams
    pub keep_alive_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            admin_token: None,
            allow_unauthenticated: false,
            keep_alive_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    #[serde(flatten)]
    pub profiles: DemoProfiles,
    pub quantities: SeedQuantities,
    /// Wall-clock budget after which a demo run's stream stops being forwarded
    pub run_budget_secs: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            profiles: DemoProfiles::default(),
            quantities: SeedQuantities::default(),
            run_budget_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestsConfig {
    #[serde(flatten)]
    pub settings: TestRunSettings,
    pub run_budget_secs: u64,
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            settings: TestRunSettings::default(),
            run_budget_secs: 300,
        }
    }
}

impl EngineConfig {
    /// Read the config file, falling back to defaults when it is missing or
    /// cannot be parsed.
    pub async fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "Config file does not exist, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path).await {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    debug!(path = %path.display(), "Config loaded successfully");
                    config
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to parse config, using defaults"
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read config file, using defaults"
                );
                Self::default()
            }
        }
    }

    pub async fn write(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(path, content).await?;
        debug!(path = %path.display(), "Config saved successfully");

        Ok(())
    }

    /// Apply the admin token from the environment, if present.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var(ADMIN_TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.server.admin_token = Some(token.trim().to_string());
            }
        }
        self
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.server.keep_alive_secs.max(1))
    }

    pub fn demo_budget(&self) -> Duration {
        Duration::from_secs(self.demo.run_budget_secs)
    }

    pub fn tests_budget(&self) -> Duration {
        Duration::from_secs(self.tests.run_budget_secs)
    }
}
