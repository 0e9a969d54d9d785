//! Causality CLI Configuration Management
//!
//! Configuration is layered with figment, lowest priority first:
//! - Built-in defaults
//! - `causality.toml` in the working directory
//! - `~/.causality/config.toml`
//! - Environment variables (`CAUSALITY_API__BASE_URL`, `CAUSALITY_WALLET__SECRET_KEY`, ...)
//! - An explicit `--config` file
//! - Command line flags
//!
//! Nested keys are separated by a double underscore in environment variables since the
//! key names themselves contain underscores.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use causality_api::{config::DEFAULT_ASSISTANT_BASE_URL, ApiConfig, AssistantConfig, DEFAULT_API_BASE_URL};
use causality_core::LocalWallet;
use causality_nostr::{parse_keys, relay::parse_relay_url, RelayConfig, DEFAULT_RELAY_URL};

const LOCAL_CONFIG_FILE: &str = "causality.toml";
const ENV_PREFIX: &str = "CAUSALITY_";
const MAX_RETRIES_LIMIT: u32 = 10;

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the Causality CLI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Event index HTTP API
    pub api: ApiSection,

    /// Relay used for publishing and live subscriptions
    pub relay: RelaySection,

    /// Local project and model records
    pub storage: StorageSection,

    /// Signing identity
    pub wallet: WalletSection,

    /// Model assistant chat service
    pub assistant: AssistantSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySection {
    pub url: String,
    pub connect_timeout_secs: u64,
    pub publish_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Defaults to the platform data directory (e.g. `~/.local/share/causality`)
    pub data_dir: Option<PathBuf>,
}

/// At most one of the keys is used; the wallet key wins when both are set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletSection {
    /// secp256k1 secret as hex, signs like an Ethereum wallet
    pub secret_key: Option<String>,

    /// Nostr secret (hex or nsec), signs native Schnorr events
    pub nostr_secret_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSection {
    pub base_url: String,
    pub api_key: Option<String>,
}

// ----------------------------------------------------------------------------
// Default Implementations
// ----------------------------------------------------------------------------

impl Default for ApiSection {
    fn default() -> Self {
        let api = ApiConfig::default();
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            max_retries: api.max_retries,
            retry_delay_ms: api.retry_delay.as_millis() as u64,
            request_timeout_secs: api.request_timeout.as_secs(),
        }
    }
}

impl Default for RelaySection {
    fn default() -> Self {
        let relay = RelayConfig::default();
        Self {
            url: DEFAULT_RELAY_URL.to_string(),
            connect_timeout_secs: relay.connect_timeout.as_secs(),
            publish_timeout_secs: relay.publish_timeout.as_secs(),
        }
    }
}

impl Default for AssistantSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ASSISTANT_BASE_URL.to_string(),
            api_key: None,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load from the standard locations without command line overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_overrides(None, None, None, None)
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()));

        let config: AppConfig = figment.extract().map_err(|e| {
            ConfigError::Loading(format!(
                "Failed to load from {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load every layer, then apply command line overrides
    pub fn load_with_overrides(
        config_file: Option<&str>,
        api_url: Option<String>,
        relay_url: Option<String>,
        data_dir: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(LOCAL_CONFIG_FILE))
            .merge(Toml::file(Self::default_config_path()?))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(path) = config_file {
            if !Path::new(path).exists() {
                return Err(ConfigError::FileSystem(format!(
                    "Configuration file not found: {}",
                    path
                )));
            }
            figment = figment.merge(Toml::file(path));
        }

        if let Some(url) = api_url {
            figment = figment.merge(("api.base_url", url));
        }
        if let Some(url) = relay_url {
            figment = figment.merge(("relay.url", url));
        }
        if let Some(dir) = data_dir {
            figment = figment.merge(("storage.data_dir", dir));
        }

        let config: AppConfig = figment
            .extract()
            .map_err(|e| ConfigError::Loading(format!("Failed to load with overrides: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// `~/.causality/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or_else(|| {
            ConfigError::Environment("Could not determine the home directory".to_string())
        })?;
        Ok(home.join(".causality").join("config.toml"))
    }

    /// Directory holding local project and model records
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.storage.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|dir| dir.join("causality"))
            .unwrap_or_else(|| PathBuf::from(".causality"))
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let config_path = Self::default_config_path()?;
        self.save_to_file(&config_path)?;
        Ok(config_path)
    }

    /// Save configuration to a specific file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::FileSystem(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialization(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), toml_string)
            .map_err(|e| ConfigError::FileSystem(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        let api_url = Url::parse(&self.api.base_url).map_err(|e| {
            ConfigError::Validation(format!("Invalid API base URL '{}': {}", self.api.base_url, e))
        })?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "API base URL must use http or https: {}",
                self.api.base_url
            )));
        }

        if self.api.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::Validation(format!(
                "max_retries must be at most {}",
                MAX_RETRIES_LIMIT
            )));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        parse_relay_url(&self.relay.url)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        if self.relay.connect_timeout_secs == 0 || self.relay.publish_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "Relay timeouts must be greater than 0".to_string(),
            ));
        }

        if let Some(secret) = &self.wallet.secret_key {
            LocalWallet::from_hex(secret)
                .map_err(|e| ConfigError::Validation(format!("Invalid wallet secret key: {}", e)))?;
        }
        if let Some(secret) = &self.wallet.nostr_secret_key {
            parse_keys(secret)
                .map_err(|e| ConfigError::Validation(format!("Invalid Nostr secret key: {}", e)))?;
        }

        Url::parse(&self.assistant.base_url).map_err(|e| {
            ConfigError::Validation(format!(
                "Invalid assistant base URL '{}': {}",
                self.assistant.base_url, e
            ))
        })?;

        Ok(())
    }

    pub fn to_api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.api.base_url.clone(),
            max_retries: self.api.max_retries,
            retry_delay: Duration::from_millis(self.api.retry_delay_ms),
            request_timeout: Duration::from_secs(self.api.request_timeout_secs),
        }
    }

    pub fn to_relay_config(&self) -> RelayConfig {
        RelayConfig::new(self.relay.url.clone())
            .with_connect_timeout(Duration::from_secs(self.relay.connect_timeout_secs))
            .with_publish_timeout(Duration::from_secs(self.relay.publish_timeout_secs))
    }

    pub fn to_assistant_config(&self) -> AssistantConfig {
        AssistantConfig {
            base_url: self.assistant.base_url.clone(),
            api_key: self.assistant.api_key.clone(),
        }
    }

    /// Annotated starting point for `~/.causality/config.toml`
    pub fn example_config() -> String {
        format!(
            r#"# Causality CLI configuration
# Environment variables override this file, e.g. CAUSALITY_API__BASE_URL

[api]
base_url = "{api}"
max_retries = 3
retry_delay_ms = 1000
request_timeout_secs = 30

[relay]
url = "{relay}"
connect_timeout_secs = 10
publish_timeout_secs = 10

[storage]
# data_dir = "/path/to/causality/data"

[wallet]
# Hex secp256k1 key used to sign governance events
# secret_key = "0x..."
# Or a Nostr key (hex or nsec) to sign native events
# nostr_secret_key = "nsec1..."

[assistant]
base_url = "{assistant}"
# api_key = "app-..."
"#,
            api = DEFAULT_API_BASE_URL,
            relay = DEFAULT_RELAY_URL,
            assistant = DEFAULT_ASSISTANT_BASE_URL,
        )
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
