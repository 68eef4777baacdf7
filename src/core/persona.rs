use crate::core::config::Config;
use crate::core::error::ConfigurationError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Id under which the built-in persona is always available.
pub const BUILTIN_PERSONA_ID: &str = "sage";

/// Models offered by the persona form. Any other identifier is accepted too.
pub const SUGGESTED_MODELS: &[(&str, &str)] = &[
    ("gemini-2.5-flash", "fast, general purpose"),
    ("gemini-3-pro-preview", "stronger reasoning"),
];

/// Upper bound offered by the persona form for the reasoning budget.
pub const MAX_THINKING_BUDGET: u32 = 32_768;

/// Identity and generation parameters of one persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub name: String,
    #[serde(default)]
    pub avatar_emoji: String,
    #[serde(default)]
    pub description: String,
    pub system_instruction: String,
    /// Reasoning token allowance. 0 disables extended reasoning.
    #[serde(default)]
    pub thinking_budget: u32,
    #[serde(default)]
    pub model: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "The Sage".to_string(),
            avatar_emoji: "🧙".to_string(),
            description: "A learned elder who speaks in riddles and philosophy.".to_string(),
            system_instruction: "You are a wise elder who always speaks in metaphors and \
philosophy. You have lived in this world for a very long time and have seen a great deal. \
Do not hand out simple answers; guide the user to think for themselves instead. Your tone \
is gentle and steady, and you like to quote invented ancient proverbs."
                .to_string(),
            thinking_budget: 0,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl PersonaConfig {
    /// Check the fields a session cannot start without.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::MissingField("name"));
        }
        if self.system_instruction.trim().is_empty() {
            return Err(ConfigurationError::MissingField("system_instruction"));
        }
        Ok(())
    }

    pub fn effective_model(&self) -> &str {
        let model = self.model.trim();
        if model.is_empty() {
            DEFAULT_MODEL
        } else {
            model
        }
    }

    /// Reasoning budget to forward to the provider, if any.
    pub fn reasoning_budget(&self) -> Option<u32> {
        (self.thinking_budget > 0).then_some(self.thinking_budget)
    }

    /// Local greeting shown when a conversation opens. A blank description is
    /// left out together with the space that would follow it.
    pub fn greeting(&self) -> String {
        let description = self.description.trim();
        if description.is_empty() {
            format!("Hello, I am {}. Let's start talking.", self.name)
        } else {
            format!("Hello, I am {}. {} Let's start talking.", self.name, description)
        }
    }

    /// Name prefixed with the avatar when one is set.
    pub fn display_label(&self) -> String {
        let avatar = self.avatar_emoji.trim();
        if avatar.is_empty() {
            self.name.clone()
        } else {
            format!("{avatar} {}", self.name)
        }
    }
}

/// A persona addressable by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPersona {
    pub id: String,
    pub persona: PersonaConfig,
}

/// Personas available to seed the persona form: the built-in default plus
/// whatever the configuration file defines.
pub struct PersonaCatalog {
    personas: Vec<StoredPersona>,
    default_id: String,
}

impl PersonaCatalog {
    pub fn load(config: &Config) -> Self {
        let mut personas = vec![StoredPersona {
            id: BUILTIN_PERSONA_ID.to_string(),
            persona: PersonaConfig::default(),
        }];
        for (id, persona) in &config.personas {
            let stored = StoredPersona {
                id: id.clone(),
                persona: persona.clone(),
            };
            if let Some(existing) = personas
                .iter_mut()
                .find(|p| p.id.eq_ignore_ascii_case(id))
            {
                *existing = stored;
            } else {
                personas.push(stored);
            }
        }

        let default_id = config
            .default_persona
            .clone()
            .unwrap_or_else(|| BUILTIN_PERSONA_ID.to_string());

        let mut catalog = Self {
            personas,
            default_id,
        };
        if let Some(model) = config.default_model.as_deref() {
            catalog.apply_default_model(model);
        }
        catalog
    }

    /// Personas that leave `model` blank pick up the configured default.
    fn apply_default_model(&mut self, model: &str) {
        for stored in &mut self.personas {
            if stored.persona.model.trim().is_empty() {
                stored.persona.model = model.to_string();
            }
        }
    }

    pub fn list(&self) -> &[StoredPersona] {
        &self.personas
    }

    pub fn find(&self, id: &str) -> Option<&PersonaConfig> {
        self.personas
            .iter()
            .find(|p| p.id.eq_ignore_ascii_case(id))
            .map(|p| &p.persona)
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// Resolve a persona by id, falling back to the configured default and
    /// then to the built-in persona.
    pub fn resolve(&self, id: Option<&str>) -> Result<PersonaConfig, String> {
        match id {
            Some(id) => self.find(id).cloned().ok_or_else(|| {
                let available: Vec<&str> = self.personas.iter().map(|p| p.id.as_str()).collect();
                format!(
                    "Persona '{}' not found. Available personas: {}",
                    id,
                    available.join(", ")
                )
            }),
            None => Ok(self
                .find(&self.default_id)
                .cloned()
                .unwrap_or_default()),
        }
    }
}
