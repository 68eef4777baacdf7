//! Maps a persona onto a live provider session and mediates every request
//! against it.
//!
//! The manager is a plain owned slot: Idle until [`SessionManager::start`],
//! Active until [`SessionManager::reset`] or the next `start`, which replaces
//! the session wholesale.

use crate::core::error::{ChatError, ConfigurationError};
use crate::core::persona::PersonaConfig;
use crate::core::providers::Credential;
use crate::provider::{ChatProvider, FragmentStream, ProviderSession};
use tracing::{debug, warn};

/// Provider-facing parameters derived from a persona.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub model: String,
    pub system_instruction: String,
    /// Present only for a positive budget; 0 disables reasoning instead of
    /// requesting a zero-token budget.
    pub thinking_budget: Option<u32>,
}

impl SessionParams {
    pub fn from_persona(config: &PersonaConfig) -> Self {
        Self {
            model: config.effective_model().to_string(),
            system_instruction: config.system_instruction.clone(),
            thinking_budget: config.reasoning_budget(),
        }
    }
}

struct ActiveSession {
    config: PersonaConfig,
    handle: Box<dyn ProviderSession>,
}

pub struct SessionManager<P: ChatProvider> {
    provider: P,
    credential: Option<Credential>,
    active: Option<ActiveSession>,
}

impl<P: ChatProvider> SessionManager<P> {
    pub fn new(provider: P, credential: Option<Credential>) -> Self {
        Self {
            provider,
            credential,
            active: None,
        }
    }

    /// Bind a new session to `config`, replacing any active one.
    ///
    /// On failure the manager is left Idle: a half-replaced session would
    /// still answer as the previous persona.
    pub fn start(&mut self, config: PersonaConfig) -> Result<(), ChatError> {
        self.active = None;

        let credential = self
            .credential
            .as_ref()
            .ok_or(ConfigurationError::MissingCredential)?;
        config.validate()?;

        let params = SessionParams::from_persona(&config);
        debug!(
            model = %params.model,
            thinking_budget = ?params.thinking_budget,
            persona = %config.name,
            "starting chat session"
        );
        let handle = self
            .provider
            .create_session(credential, &params)
            .inspect_err(|err| warn!(error = %err, "failed to create chat session"))?;

        self.active = Some(ActiveSession { config, handle });
        Ok(())
    }

    /// Issue one streaming request against the active session.
    pub fn send(&mut self, text: &str) -> Result<FragmentStream, ChatError> {
        let active = self
            .active
            .as_mut()
            .ok_or(ChatError::SessionNotInitialized)?;
        debug!(chars = text.chars().count(), "sending message");
        Ok(active.handle.send_stream(text))
    }

    /// Drop the active session and its persona. Safe to call when Idle.
    pub fn reset(&mut self) {
        if self.active.take().is_some() {
            debug!("chat session reset");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_config(&self) -> Option<&PersonaConfig> {
        self.active.as_ref().map(|active| &active.config)
    }

    pub fn active_params(&self) -> Option<&SessionParams> {
        self.active.as_ref().map(|active| active.handle.params())
    }
}
