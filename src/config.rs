use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Upper bound on snippets injected into a prompt, whatever the config says.
pub const MAX_SEARCH_RESULTS: usize = 3;

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
pub const DEFAULT_FALLBACK: &str = "No real-time data found.";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for the completion provider
    pub groq_api_key: Option<String>,

    /// Model identifier sent with every completion request
    pub model: String,

    /// OpenAI-compatible base URL of the completion provider
    pub base_url: String,

    /// Where the credential is expected to come from
    pub credential_policy: CredentialPolicy,

    /// Request timeout; absent means the HTTP client default
    pub request_timeout_secs: Option<u64>,

    /// Log file used while the full-screen UI owns the terminal
    pub log_file: Option<PathBuf>,

    /// Web search settings
    pub search: SearchConfig,

    /// Unichat home directory
    #[serde(skip)]
    pub unichat_home: PathBuf,
}

/// How the completion credential reaches the conversation loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialPolicy {
    /// Resolved once before the UI starts; absence halts startup
    Startup,
    /// Supplied by the user during the session; turns without it are rejected
    Interactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,
    pub max_results: usize,
    pub fallback: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            max_results: MAX_SEARCH_RESULTS,
            fallback: DEFAULT_FALLBACK.to_string(),
        }
    }
}

impl SearchConfig {
    /// Result count actually requested from the provider.
    pub fn effective_limit(&self) -> usize {
        self.max_results.min(MAX_SEARCH_RESULTS)
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            groq_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            credential_policy: CredentialPolicy::Startup,
            request_timeout_secs: None,
            log_file: None,
            search: SearchConfig::default(),
            unichat_home: home.join(".unichat"),
        }
    }
}

impl Config {
    /// Load configuration from `~/.unichat/config.toml`, falling back to defaults
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Self::load_from(&home.join(".unichat"))
    }

    /// Load configuration rooted at an explicit home directory. A missing
    /// file is created from the defaults.
    pub fn load_from(unichat_home: &Path) -> Result<Self> {
        fs::create_dir_all(unichat_home)
            .context("Failed to create .unichat directory")?;

        let config_path = unichat_home.join("config.toml");
        if !config_path.exists() {
            let config = Config {
                unichat_home: unichat_home.to_path_buf(),
                ..Config::default()
            };
            config.save()?;
            return Ok(config);
        }

        let content = fs::read_to_string(&config_path)
            .context("Failed to read config file")?;
        let mut config: Config = toml::from_str(&content)
            .context("Failed to parse config file")?;

        config.unichat_home = unichat_home.to_path_buf();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.unichat_home.join("config.toml");
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .context("Failed to write config file")?;
        Ok(())
    }

    /// Path of the host-managed secret store
    pub fn secrets_path(&self) -> PathBuf {
        self.unichat_home.join("secrets.toml")
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.unichat_home.join("unichat.log"))
    }

    /// Endpoint for streamed chat completions
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}
