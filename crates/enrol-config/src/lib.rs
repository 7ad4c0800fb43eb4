//! # enrol-config
//!
//! Layered configuration loading for the enrolment engine using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`ENROL_*` prefix, `__` as separator)
//! 2. Project-level `.enrol/config.toml`
//! 3. User-level `~/.config/enrol/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `ENROL_JOURNAL__ENABLED` -> `journal.enabled`,
//! `ENROL_JOBS__LEARNER_BATCH_SIZE` -> `jobs.learner_batch_size`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use enrol_config::EnrolConfig;
//!
//! let config = EnrolConfig::load_with_dotenv().expect("config");
//! if config.journal.enabled {
//!     println!("journal keeps {} entries", config.journal.history_cap);
//! }
//! ```

mod cache;
mod error;
mod jobs;
mod journal;
mod state;

pub use cache::CacheConfig;
pub use error::ConfigError;
pub use jobs::JobsConfig;
pub use journal::JournalConfig;
pub use state::StateConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnrolConfig {
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl EnrolConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] if you need
    /// `.env` file loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Figment` if a source cannot be parsed and
    /// `ConfigError::InvalidValue` if a cap or batch size is zero.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment())
    }

    /// Load configuration with `.env` file support.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Extract and validate a config from an arbitrary figment.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the figment provider chain.
    ///
    /// This is public so tests can inspect the figment directly or add
    /// additional providers on top.
    #[must_use]
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: User-global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        // Layer 2: Project-local config
        let local_path = PathBuf::from(".enrol/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        // Layer 3: Environment variables (highest priority)
        figment.merge(Env::prefixed("ENROL_").split("__"))
    }

    /// Reject values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("state.log_cap", self.state.log_cap),
            ("journal.history_cap", self.journal.history_cap),
            ("journal.log_cap", self.journal.log_cap),
            ("jobs.learner_batch_size", self.jobs.learner_batch_size),
            ("jobs.course_batch_size", self.jobs.course_batch_size),
            ("cache.max_course_instances", self.cache.max_course_instances),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::must_be_positive(field));
            }
        }
        if self.jobs.tick_interval_secs == 0 {
            return Err(ConfigError::must_be_positive("jobs.tick_interval_secs"));
        }
        Ok(())
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("enrol").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EnrolConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.journal.enabled);
        assert_eq!(config.jobs.learner_batch_size, 20);
        assert_eq!(config.cache.max_course_instances, 100);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut config = EnrolConfig::default();
        config.jobs.course_batch_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("jobs.course_batch_size"), "{err}");
    }

    #[test]
    fn figment_builds_without_files() {
        let figment = EnrolConfig::figment();
        let config: EnrolConfig = figment.extract().expect("should extract defaults");
        assert_eq!(config.state.log_cap, 30);
    }
}
