use parley_core::SafetyLevel;
use parley_providers::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Environment variable holding the service credential.
pub const API_KEY_ENV: &str = "PARLEY_API_KEY";

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub release: ReleaseSection,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionSection {
    #[serde(default = "SessionSection::default_model")]
    pub model: String,
    /// Messages sent as context; the store keeps twice as many.
    #[serde(default = "SessionSection::default_history_size")]
    pub history_size: usize,
    #[serde(default)]
    pub safety: SafetyLevel,
    /// Per-character delay when printing replies, zero disables it.
    #[serde(default = "SessionSection::default_typing_delay_ms")]
    pub typing_delay_ms: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            history_size: Self::default_history_size(),
            safety: SafetyLevel::default(),
            typing_delay_ms: Self::default_typing_delay_ms(),
        }
    }
}

impl SessionSection {
    fn default_model() -> String {
        "glm-4-flash".to_string()
    }

    const fn default_history_size() -> usize {
        10
    }

    const fn default_typing_delay_ms() -> u64 {
        5
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrySection {
    #[serde(default = "RetrySection::default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "RetrySection::default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            base_delay_ms: Self::default_base_delay_ms(),
            max_delay_ms: Self::default_max_delay_ms(),
        }
    }
}

impl RetrySection {
    const fn default_base_delay_ms() -> u64 {
        1_000
    }

    const fn default_max_delay_ms() -> u64 {
        10_000
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderSection {
    #[serde(default = "ProviderSection::default_base_url")]
    pub base_url: String,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
        }
    }
}

impl ProviderSection {
    fn default_base_url() -> String {
        DEFAULT_BASE_URL.to_string()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReleaseSection {
    #[serde(default = "ReleaseSection::default_endpoint")]
    pub endpoint: String,
}

impl Default for ReleaseSection {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
        }
    }
}

impl ReleaseSection {
    fn default_endpoint() -> String {
        "https://api.github.com/repos/parley-chat/parley/releases/latest".to_string()
    }
}

impl Config {
    fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("parley"))
    }

    /// Load `~/parley/config.json`, falling back to defaults when absent.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");

        if !config_path.exists() {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        Self::from_json(&std::fs::read_to_string(&config_path)?)
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        if config.session.history_size == 0 {
            anyhow::bail!("session.history_size must be at least 1");
        }
        Ok(config)
    }

    /// Read the credential from [`API_KEY_ENV`].
    pub fn api_key() -> anyhow::Result<String> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => anyhow::bail!("{API_KEY_ENV} is not set. Export your API key and try again."),
        }
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<PathBuf> {
        let config_path = Self::ensure_config_dir()?.join("config.json");

        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }

        std::fs::write(&config_path, serde_json::to_string_pretty(&Self::default())?)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Export {API_KEY_ENV} with your API key");
        println!("   2. Run 'parley chat' to start a conversation");
        println!();
        println!("🔧 Configuration options:");
        println!("   - session.model: model to use (glm-4-flash, glm-4-plus, ...)");
        println!("   - session.history_size: messages sent as context each turn");
        println!("   - session.safety: off, low, default or high");
        println!("   - retry.base_delay_ms / retry.max_delay_ms: backoff between attempts");
        println!();
        Ok(config_path)
    }
}
