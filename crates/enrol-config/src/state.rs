//! Provider state store configuration.

use serde::{Deserialize, Serialize};

const fn default_log_cap() -> usize {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateConfig {
    /// Maximum log lines kept per provider state.
    #[serde(default = "default_log_cap")]
    pub log_cap: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            log_cap: default_log_cap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        assert_eq!(StateConfig::default().log_cap, 30);
    }
}
