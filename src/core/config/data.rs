use crate::core::persona::PersonaConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Persona id that seeds the persona form (e.g., "sage")
    pub default_persona: Option<String>,
    /// Model used by personas that do not name one
    pub default_model: Option<String>,
    /// Override for the model endpoint base URL
    pub base_url: Option<String>,
    /// User-defined personas keyed by id
    /// Example: `[personas.tutor]` with `name`, `system_instruction`, ...
    #[serde(default)]
    pub personas: BTreeMap<String, PersonaConfig>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    pub fn add_persona(&mut self, id: impl Into<String>, persona: PersonaConfig) {
        self.personas.insert(id.into(), persona);
    }

    pub fn remove_persona(&mut self, id: &str) -> Option<PersonaConfig> {
        let key = self
            .personas
            .keys()
            .find(|key| key.eq_ignore_ascii_case(id))
            .cloned()?;
        self.personas.remove(&key)
    }
}
