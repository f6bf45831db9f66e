//! User preferences for sources.
//!
//! The host owns the actual key/value storage; sources only see it through
//! [`PreferenceStore`] and always supply their own defaults.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// Process-local store, used by the CLI and tests.
#[derive(Default)]
pub struct InMemoryPreferences {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for InMemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .ok()
            .and_then(|values| values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.to_string(), value.to_string());
        }
    }
}

/// A view of the store scoped to one source id.
#[derive(Clone)]
pub struct SourcePreferences {
    store: Arc<dyn PreferenceStore>,
    source_id: String,
}

impl SourcePreferences {
    pub fn new(store: Arc<dyn PreferenceStore>, source_id: &str) -> Self {
        Self {
            store,
            source_id: source_id.to_string(),
        }
    }

    pub fn namespaced_key(source_id: &str, key: &str) -> String {
        format!("source_{}/{}", source_id, key)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.store
            .get(&Self::namespaced_key(&self.source_id, key))
    }

    /// Stored value, or `default` when unset.
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.store
            .set(&Self::namespaced_key(&self.source_id, key), value);
    }
}

/// Declarative description of one user-configurable option.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreferenceOption {
    List {
        key: String,
        title: String,
        entries: Vec<String>,
        entry_values: Vec<String>,
        default: String,
    },
    Text {
        key: String,
        title: String,
        default: String,
        password: bool,
    },
}

impl PreferenceOption {
    /// List option whose displayed entries are also the stored values.
    pub fn list(key: &str, title: &str, values: &[&str], default: &str) -> Self {
        Self::list_with_entries(key, title, values, values, default)
    }

    pub fn list_with_entries(
        key: &str,
        title: &str,
        entries: &[&str],
        entry_values: &[&str],
        default: &str,
    ) -> Self {
        PreferenceOption::List {
            key: key.to_string(),
            title: title.to_string(),
            entries: entries.iter().map(|s| s.to_string()).collect(),
            entry_values: entry_values.iter().map(|s| s.to_string()).collect(),
            default: default.to_string(),
        }
    }

    pub fn text(key: &str, title: &str, default: &str, password: bool) -> Self {
        PreferenceOption::Text {
            key: key.to_string(),
            title: title.to_string(),
            default: default.to_string(),
            password,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            PreferenceOption::List { key, .. } | PreferenceOption::Text { key, .. } => key,
        }
    }

    pub fn default_value(&self) -> &str {
        match self {
            PreferenceOption::List { default, .. } | PreferenceOption::Text { default, .. } => {
                default
            }
        }
    }
}
