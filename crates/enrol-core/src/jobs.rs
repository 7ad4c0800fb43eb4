//! Persisted state records of the background recalculation jobs.
//!
//! Job progress lives in durable site-level records rather than in-process
//! flags, so a restart resumes where the last committed batch left off.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::JobStatus;
use crate::ids::CourseId;

/// State machine record of the site-wide learner calculation job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LearnerJobState {
    #[serde(default)]
    pub status: JobStatus,

    /// Calculation version this run reconciles towards. Once `status` is
    /// `complete`, this is the last completed version.
    #[serde(default)]
    pub version: Option<String>,

    /// Number of batches run so far in the current run.
    #[serde(default)]
    pub batch: u32,
}

impl LearnerJobState {
    /// Parse a persisted record. Missing or malformed records read as idle.
    #[must_use]
    pub fn from_json(json: Option<&str>) -> Self {
        json.and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    /// Whether the job already completed for `version`.
    #[must_use]
    pub fn is_complete_for(&self, version: &str) -> bool {
        self.status == JobStatus::Complete && self.version.as_deref() == Some(version)
    }
}

/// State machine record of one course's calculation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CourseJobState {
    pub course: CourseId,

    #[serde(default)]
    pub status: JobStatus,

    /// Only revisit learners whose cached result was invalidated.
    #[serde(default)]
    pub current_learners_only: bool,

    #[serde(default)]
    pub batch: u32,
}

impl CourseJobState {
    #[must_use]
    pub const fn new(course: CourseId, current_learners_only: bool) -> Self {
        Self {
            course,
            status: JobStatus::Idle,
            current_learners_only,
            batch: 0,
        }
    }

    /// Parse a persisted record, falling back to an idle record for `course`.
    #[must_use]
    pub fn from_json(course: CourseId, json: Option<&str>) -> Self {
        json.and_then(|raw| serde_json::from_str::<Self>(raw).ok())
            .filter(|state| state.course == course)
            .unwrap_or_else(|| Self::new(course, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_learner_state_is_idle() {
        let state = LearnerJobState::from_json(None);
        assert_eq!(state.status, JobStatus::Idle);
        assert!(!state.is_complete_for("abc"));
    }

    #[test]
    fn complete_state_matches_version() {
        let state = LearnerJobState {
            status: JobStatus::Complete,
            version: Some("abc".into()),
            batch: 3,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"status":"complete","version":"abc","batch":3}"#);
        let recovered = LearnerJobState::from_json(Some(&json));
        assert!(recovered.is_complete_for("abc"));
        assert!(!recovered.is_complete_for("def"));
    }

    #[test]
    fn course_state_for_other_course_is_ignored() {
        let course = CourseId::new(3).unwrap();
        let other = CourseId::new(4).unwrap();
        let json = serde_json::to_string(&CourseJobState::new(other, true)).unwrap();
        let state = CourseJobState::from_json(course, Some(&json));
        assert_eq!(state.course, course);
        assert!(!state.current_learners_only);
    }
}
