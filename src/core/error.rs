//! Error taxonomy shared by the session manager and the streaming consumer.

use std::error::Error;
use std::fmt;

const QUICK_FIXES: &[&str] = &[
    "export API_KEY=...              # Credential for the model endpoint",
    "export GEMINI_API_KEY=...       # Accepted when API_KEY is unset",
];

/// A session could not be started because the credential or the persona is
/// incomplete. Never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No credential was found in the process environment.
    MissingCredential,
    /// A required persona field is blank.
    MissingField(&'static str),
}

impl ConfigurationError {
    pub fn quick_fixes(&self) -> &'static [&'static str] {
        match self {
            ConfigurationError::MissingCredential => QUICK_FIXES,
            ConfigurationError::MissingField(_) => &[],
        }
    }

    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::MissingCredential => write!(
                f,
                "API key is missing. Set API_KEY (or GEMINI_API_KEY) in the environment."
            ),
            ConfigurationError::MissingField(field) => {
                write!(f, "Persona field '{field}' must not be empty.")
            }
        }
    }
}

impl Error for ConfigurationError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Connection, TLS or body read failure.
    Transport,
    /// The endpoint answered with a non-success HTTP status.
    Status(u16),
    /// The endpoint reported an error object or refused the prompt.
    Api,
    /// A stream payload could not be decoded.
    MalformedStream,
}

/// Failure reported while talking to the model endpoint. The message may
/// contain raw provider output and is meant for logs only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transport, message)
    }

    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Status(code), message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Api, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::MalformedStream, message)
    }

    pub fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ProviderErrorKind::Transport => write!(f, "transport error: {}", self.message),
            ProviderErrorKind::Status(code) => write!(f, "HTTP {code}: {}", self.message),
            ProviderErrorKind::Api => write!(f, "API error: {}", self.message),
            ProviderErrorKind::MalformedStream => {
                write!(f, "malformed stream: {}", self.message)
            }
        }
    }
}

impl Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ProviderError::status(status.as_u16(), err.to_string()),
            None => ProviderError::transport(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    Configuration(ConfigurationError),
    /// `send` was called before `start` (or after `reset`).
    SessionNotInitialized,
    Provider(ProviderError),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Configuration(err) => write!(f, "configuration error: {err}"),
            ChatError::SessionNotInitialized => write!(f, "chat session not initialized"),
            ChatError::Provider(err) => write!(f, "provider error: {err}"),
        }
    }
}

impl Error for ChatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ChatError::Configuration(err) => Some(err),
            ChatError::SessionNotInitialized => None,
            ChatError::Provider(err) => Some(err),
        }
    }
}

impl From<ConfigurationError> for ChatError {
    fn from(err: ConfigurationError) -> Self {
        ChatError::Configuration(err)
    }
}

impl From<ProviderError> for ChatError {
    fn from(err: ProviderError) -> Self {
        ChatError::Provider(err)
    }
}
