use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Sibling order produced by the thread sorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest message first.
    Ascending,
    /// Most recently added message first.
    #[default]
    Descending,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(format!("unknown sort order '{other}'")),
        }
    }
}

/// Runtime configuration for thread building and display.
#[derive(Debug, Clone)]
pub struct ThreadingConfig {
    pub subject_grouping: bool,
    pub sort_order: SortOrder,
    pub expand_default: bool,
    pub parallel_threshold: usize,
    pub expansion_dir: PathBuf,
}

impl ThreadingConfig {
    pub fn from_env() -> Self {
        let sort_order = env::var("THREADING_SORT_ORDER")
            .ok()
            .and_then(|value| SortOrder::from_str(&value).ok())
            .unwrap_or_default();

        Self {
            subject_grouping: env_bool("THREADING_SUBJECT_GROUPING", true),
            sort_order,
            expand_default: env_bool("THREADING_EXPAND_DEFAULT", true),
            parallel_threshold: env_usize("THREADING_PARALLEL_THRESHOLD", 2048),
            expansion_dir: PathBuf::from(env_string("THREADING_EXPANSION_DIR", "./cache")),
        }
    }

    /// Built-in defaults, ignoring the environment.
    pub fn builtin() -> Self {
        Self {
            subject_grouping: true,
            sort_order: SortOrder::Descending,
            expand_default: true,
            parallel_threshold: 2048,
            expansion_dir: PathBuf::from("./cache"),
        }
    }

    /// Path of the collapse-marker file for a folder.
    pub fn expansion_path(&self, folder: &str) -> PathBuf {
        let sanitized: String = folder
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.expansion_dir.join(format!("expanded-{sanitized}.txt"))
    }
}

impl Default for ThreadingConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
