//! Durable meta keys.
//!
//! These names are shared with data already persisted by earlier releases
//! and must not change.

use enrol_core::CourseId;

/// Learner scope: serialized `ProviderResultSet` per course.
pub const RESULTS_PREFIX: &str = "enrol_results_";

/// Learner scope: serialized `ProviderStateStore` per course.
pub const PROVIDER_STATE_PREFIX: &str = "enrol_provider_state_";

/// Learner scope: flag set when a learner was removed from a course.
pub const REMOVED_PREFIX: &str = "enrol_removed_";

/// Learner scope: the learner's whole provider journal.
pub const PROVIDER_JOURNAL: &str = "enrol_provider_journal";

/// Learner scope: calculation version that last reconciled the learner.
pub const CALCULATED_VERSION: &str = "enrol_calculated_version";

/// Course scope: per-course invalidation salt.
pub const COURSE_SALT: &str = "enrol_course_salt";

/// Site scope: site-wide invalidation salt.
pub const SITE_SALT: &str = "enrol_site_salt";

/// Site scope: learner calculation job state record.
pub const LEARNER_JOB_STATE: &str = "enrol_learner_calculation_job";

/// Site scope prefix: course calculation job state record.
pub const COURSE_JOB_STATE_PREFIX: &str = "enrol_course_calculation_job_";

#[must_use]
pub fn results(course: CourseId) -> String {
    format!("{RESULTS_PREFIX}{course}")
}

#[must_use]
pub fn provider_state(course: CourseId) -> String {
    format!("{PROVIDER_STATE_PREFIX}{course}")
}

#[must_use]
pub fn removed(course: CourseId) -> String {
    format!("{REMOVED_PREFIX}{course}")
}

#[must_use]
pub fn course_job_state(course: CourseId) -> String {
    format!("{COURSE_JOB_STATE_PREFIX}{course}")
}

/// Course id encoded in a prefixed key, if the suffix is a valid id.
#[must_use]
pub fn course_from_key(key: &str, prefix: &str) -> Option<CourseId> {
    key.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_roundtrip_course_ids() {
        let course = CourseId::new(42).unwrap();
        assert_eq!(results(course), "enrol_results_42");
        assert_eq!(course_from_key(&results(course), RESULTS_PREFIX), Some(course));
        assert_eq!(
            course_from_key(&provider_state(course), PROVIDER_STATE_PREFIX),
            Some(course)
        );
    }

    #[test]
    fn foreign_suffixes_are_ignored() {
        assert_eq!(course_from_key("enrol_results_abc", RESULTS_PREFIX), None);
        assert_eq!(course_from_key("enrol_results_0", RESULTS_PREFIX), None);
        assert_eq!(course_from_key("other_42", RESULTS_PREFIX), None);
    }
}
