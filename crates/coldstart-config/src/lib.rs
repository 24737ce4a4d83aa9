//! coldstart.toml configuration parser.
//!
//! A missing file is scaffolded with defaults so an operator can fill
//! in the credentials; the daemon treats that as a first-run signal
//! and exits instead of starting with an empty token.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file did not exist; a default was written in its place.
    #[error("wrote a default config to {0}, fill it in and restart")]
    DefaultWritten(String),

    #[error("couldn't read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("couldn't parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required field is missing or has a nonsense value.
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub cloud: CloudConfig,
    pub game: GameConfig,
    pub web: WebConfig,
}

/// Vendor account and target instance shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Vendor name, `hetzner` or `digitalocean`.
    pub provider: String,
    pub token: String,
    /// Instance name used for every lookup.
    pub server_name: String,
    /// Vendor machine type / size slug.
    pub server_type: String,
    pub region: String,
    /// Snapshot name the server is created from.
    pub snapshot: String,
    pub ssh_key_fingerprint: String,
}

/// Game liveness probing and the idle policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub rcon_port: u16,
    pub rcon_password: String,
    /// Minutes between idle checks.
    pub check_interval_minutes: u64,
    /// Minutes without players before teardown.
    pub shutdown_after_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Port the API listens on (all interfaces).
    pub port: u16,
    /// CORS origin allowed to call the API, `*` for any.
    pub allowed_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cloud: CloudConfig {
                provider: "hetzner".to_string(),
                token: String::new(),
                server_name: "game-server".to_string(),
                server_type: "cpx21".to_string(),
                region: "fsn1".to_string(),
                snapshot: "game-image".to_string(),
                ssh_key_fingerprint: String::new(),
            },
            game: GameConfig {
                rcon_port: 27015,
                rcon_password: String::new(),
                check_interval_minutes: 5,
                shutdown_after_minutes: 60,
            },
            web: WebConfig {
                port: 8080,
                allowed_origin: "*".to_string(),
            },
        }
    }
}

impl Config {
    /// Load and validate the config, scaffolding a default when the
    /// file does not exist yet.
    pub fn load_or_init(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            let default = Self::default();
            std::fs::write(path, default.to_toml_string()?)?;
            return Err(ConfigError::DefaultWritten(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("couldn't serialize defaults: {e}")))
    }

    /// Reject configs that cannot possibly work.
    pub fn validate(&self) -> ConfigResult<()> {
        let required = [
            ("cloud.provider", &self.cloud.provider),
            ("cloud.token", &self.cloud.token),
            ("cloud.server_name", &self.cloud.server_name),
            ("cloud.server_type", &self.cloud.server_type),
            ("cloud.region", &self.cloud.region),
            ("cloud.snapshot", &self.cloud.snapshot),
            ("cloud.ssh_key_fingerprint", &self.cloud.ssh_key_fingerprint),
            ("game.rcon_password", &self.game.rcon_password),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must be set")));
            }
        }

        if self.game.check_interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "game.check_interval_minutes must be at least 1".to_string(),
            ));
        }
        if self.game.shutdown_after_minutes == 0 {
            return Err(ConfigError::Invalid(
                "game.shutdown_after_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.game.check_interval_minutes * 60)
    }

    pub fn shutdown_delay(&self) -> Duration {
        Duration::from_secs(self.game.shutdown_after_minutes * 60)
    }
}
