//! Provider journal configuration.

use serde::{Deserialize, Serialize};

const fn default_cap() -> usize {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JournalConfig {
    /// Whether enrolment transitions are journaled at all.
    #[serde(default)]
    pub enabled: bool,

    /// Maximum history entries kept per provider and course.
    #[serde(default = "default_cap")]
    pub history_cap: usize,

    /// Maximum log lines kept per provider and course.
    #[serde(default = "default_cap")]
    pub log_cap: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            history_cap: default_cap(),
            log_cap: default_cap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_is_disabled_by_default() {
        let config = JournalConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.history_cap, 30);
        assert_eq!(config.log_cap, 30);
    }
}
