//! Course instance cache configuration.

use serde::{Deserialize, Serialize};

const fn default_max_course_instances() -> usize {
    100
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Course instances memoized before the instance map is cleared.
    #[serde(default = "default_max_course_instances")]
    pub max_course_instances: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_course_instances: default_max_course_instances(),
        }
    }
}
