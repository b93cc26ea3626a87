//! Resolution of the completion provider credential.
//!
//! Wherever the key comes from (flag, environment, config file, secret
//! store, or typed in during the session), the conversation loop only ever
//! asks one question: is a credential available right now?

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::config::Config;

pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// An API key. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank input.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Where a resolved credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Flag,
    Environment,
    ConfigFile,
    SecretStore,
    Session,
}

/// Credential as seen by the conversation loop
#[derive(Debug, Clone, Default)]
pub struct CredentialState {
    current: Option<(Credential, CredentialSource)>,
}

impl CredentialState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(credential: Credential, source: CredentialSource) -> Self {
        Self {
            current: Some((credential, source)),
        }
    }

    pub fn is_available(&self) -> bool {
        self.current.is_some()
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.current.as_ref().map(|(credential, _)| credential)
    }

    pub fn source(&self) -> Option<CredentialSource> {
        self.current.as_ref().map(|(_, source)| *source)
    }

    /// Store a key typed in by the user. Blank input is ignored.
    pub fn supply(&mut self, value: &str) -> bool {
        match Credential::new(value) {
            Some(credential) => {
                self.current = Some((credential, CredentialSource::Session));
                true
            }
            None => false,
        }
    }
}

/// Resolve the credential once, in precedence order:
/// explicit flag, environment, config file, secret store.
pub fn resolve(config: &Config, flag: Option<&str>) -> Result<CredentialState> {
    resolve_with_env(config, flag, std::env::var(API_KEY_ENV).ok())
}

fn resolve_with_env(config: &Config, flag: Option<&str>, env_value: Option<String>) -> Result<CredentialState> {
    let candidates = [
        (flag.map(str::to_string), CredentialSource::Flag),
        (env_value, CredentialSource::Environment),
        (config.groq_api_key.clone(), CredentialSource::ConfigFile),
    ];

    for (value, source) in candidates {
        if let Some(credential) = value.and_then(Credential::new) {
            info!(?source, "credential resolved");
            return Ok(CredentialState::with(credential, source));
        }
    }

    if let Some(credential) = read_secret_store(&config.secrets_path())? {
        info!(source = ?CredentialSource::SecretStore, "credential resolved");
        return Ok(CredentialState::with(credential, CredentialSource::SecretStore));
    }

    debug!("no credential found");
    Ok(CredentialState::empty())
}

fn read_secret_store(path: &Path) -> Result<Option<Credential>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .context("Failed to read secret store")?;
    let store: HashMap<String, String> = toml::from_str(&content)
        .context("Failed to parse secret store")?;

    Ok(store.get(API_KEY_ENV).cloned().and_then(Credential::new))
}
