use crate::core::config::Config;
use std::fmt;
use tracing::debug;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables consulted for the credential, in priority order.
pub const CREDENTIAL_ENV_VARS: &[&str] = &["API_KEY", "GEMINI_API_KEY"];
pub const BASE_URL_ENV_VAR: &str = "GEMINI_BASE_URL";

/// Opaque credential for the model endpoint. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
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

/// Where the endpoint lives and how to authenticate against it. Resolved once
/// at startup; the credential may be absent, which only surfaces as an error
/// when a session is started.
#[derive(Clone, Debug)]
pub struct ProviderSettings {
    pub credential: Option<Credential>,
    pub base_url: String,
}

impl ProviderSettings {
    pub fn from_env(config: &Config) -> Self {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    /// Resolve settings through an arbitrary variable lookup, so callers and
    /// tests do not depend on the real process environment.
    pub fn resolve<F>(config: &Config, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let credential = CREDENTIAL_ENV_VARS.iter().find_map(|name| {
            let value = lookup(name)?;
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                debug!(source = *name, "credential found in environment");
                Some(Credential::new(trimmed))
            }
        });

        let base_url = lookup(BASE_URL_ENV_VAR)
            .filter(|value| !value.trim().is_empty())
            .or_else(|| config.base_url.clone())
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string());

        Self {
            credential,
            base_url,
        }
    }
}
