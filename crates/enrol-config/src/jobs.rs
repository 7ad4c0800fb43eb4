//! Background recalculation job configuration.

use serde::{Deserialize, Serialize};

const fn default_batch_size() -> usize {
    20
}

const fn default_tick_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    /// Learners reconciled per tick of the site-wide learner job.
    #[serde(default = "default_batch_size")]
    pub learner_batch_size: usize,

    /// Learners recomputed per tick of a course job.
    #[serde(default = "default_batch_size")]
    pub course_batch_size: usize,

    /// Seconds between ticks when running as a worker.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            learner_batch_size: default_batch_size(),
            course_batch_size: default_batch_size(),
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}
