//! Capability lookup from (language, task) to a speech engine profile.
//!
//! Registrations may leave the language or task open. Resolution prefers the
//! most specific match:
//!
//! 1. exact language and task
//! 2. language, any task
//! 3. any language, exact task
//! 4. the default profile
//!
//! Re-registering a key replaces the previous profile.

use crate::defaults;
use crate::engine::speech::{SpeechEngine, Task};
use crate::error::{Result, SmartsumError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A named engine configuration: which model serves a capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineProfile {
    pub name: String,
    pub model: String,
}

impl EngineProfile {
    pub fn new(name: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
        }
    }
}

type Key = (Option<String>, Option<Task>);

#[derive(Debug, Clone, Default)]
pub struct EngineRegistry {
    entries: HashMap<Key, EngineProfile>,
}

impl EngineRegistry {
    /// An empty registry. Every lookup fails until something is registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the stock profiles: the multilingual model for
    /// everything, and the Hebrew fine-tune for Hebrew transcription.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_default(EngineProfile::new("general", defaults::DEFAULT_MODEL));
        registry.register(
            Some(defaults::HEBREW_LANGUAGE),
            Some(Task::Transcribe),
            EngineProfile::new("hebrew", defaults::HEBREW_MODEL),
        );
        registry
    }

    /// Register `profile` for a language and task; `None` matches any.
    pub fn register(&mut self, language: Option<&str>, task: Option<Task>, profile: EngineProfile) {
        let key = (language.map(normalize_language), task);
        if let Some(previous) = self.entries.insert(key, profile) {
            log::debug!("Replaced engine profile {}", previous.name);
        }
    }

    /// Profile used when nothing more specific matches.
    pub fn register_default(&mut self, profile: EngineProfile) {
        self.register(None, None, profile);
    }

    /// Find the profile serving `task` for media in `language`.
    ///
    /// # Errors
    /// Returns `SmartsumError::EngineUnavailable` when no registration matches.
    pub fn resolve(&self, language: Option<&str>, task: Task) -> Result<&EngineProfile> {
        let language = language.map(normalize_language);

        let mut candidates: Vec<Key> = Vec::with_capacity(4);
        if let Some(language) = &language {
            candidates.push((Some(language.clone()), Some(task)));
            candidates.push((Some(language.clone()), None));
        }
        candidates.push((None, Some(task)));
        candidates.push((None, None));

        candidates
            .iter()
            .find_map(|key| self.entries.get(key))
            .ok_or_else(|| SmartsumError::EngineUnavailable {
                language,
                task: task.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_language(language: &str) -> String {
    language.trim().to_lowercase()
}

/// Produces a ready engine for a resolved profile.
pub trait SpeechEngineProvider: Send + Sync {
    fn engine(&self, profile: &EngineProfile) -> Result<Arc<dyn SpeechEngine>>;
}

/// Provider that hands out pre-built engines keyed by profile name.
#[derive(Default, Clone)]
pub struct StaticProvider {
    engines: HashMap<String, Arc<dyn SpeechEngine>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, profile_name: &str, engine: Arc<dyn SpeechEngine>) -> Self {
        self.engines.insert(profile_name.to_string(), engine);
        self
    }
}

impl std::fmt::Debug for StaticProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticProvider")
            .field("profiles", &self.engines.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SpeechEngineProvider for StaticProvider {
    fn engine(&self, profile: &EngineProfile) -> Result<Arc<dyn SpeechEngine>> {
        self.engines
            .get(&profile.name)
            .cloned()
            .ok_or_else(|| SmartsumError::EngineModelNotFound {
                path: profile.model.clone(),
            })
    }
}
