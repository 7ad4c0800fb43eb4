//! Course publish states and job statuses.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`.
//! `JobStatus` provides `allowed_next_states()` to enforce valid transitions
//! of the persisted recalculation state machine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// PublishState
// ---------------------------------------------------------------------------

/// Publication state of a course as reported by the content collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    Draft,
    Pending,
    Scheduled,
    Published,
    Private,
    Trash,
}

impl PublishState {
    /// Whether learners can be enrolled in a course in this state.
    ///
    /// Private courses are live content restricted by visibility, so they
    /// still carry enrolments.
    #[must_use]
    pub const fn accepts_enrolment(self) -> bool {
        matches!(self, Self::Published | Self::Private)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
            Self::Private => "private",
            Self::Trash => "trash",
        }
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Status of a persisted recalculation job.
///
/// ```text
/// idle → scheduled → running → complete
///                  ↘ idle     ↘ idle (cancelled)
/// complete → scheduled (version changed)
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Idle,
    Scheduled,
    Running,
    Complete,
}

impl JobStatus {
    /// Valid next states from the current state.
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Idle => &[Self::Scheduled],
            Self::Scheduled => &[Self::Running, Self::Idle, Self::Complete],
            Self::Running => &[Self::Running, Self::Complete, Self::Idle],
            Self::Complete => &[Self::Scheduled, Self::Idle],
        }
    }

    /// Check whether transitioning to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    /// Whether a tick is expected to be pending for a job in this state.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Scheduled | Self::Running)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_live_courses_accept_enrolment() {
        assert!(PublishState::Published.accepts_enrolment());
        assert!(PublishState::Private.accepts_enrolment());
        for state in [
            PublishState::Draft,
            PublishState::Pending,
            PublishState::Scheduled,
            PublishState::Trash,
        ] {
            assert!(!state.accepts_enrolment(), "{state} should not accept enrolment");
        }
    }

    #[test]
    fn job_status_transitions() {
        assert!(JobStatus::Idle.can_transition_to(JobStatus::Scheduled));
        assert!(!JobStatus::Idle.can_transition_to(JobStatus::Complete));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Complete.can_transition_to(JobStatus::Scheduled));
    }

    #[test]
    fn snake_case_roundtrip() {
        let json = serde_json::to_string(&PublishState::Published).unwrap();
        assert_eq!(json, "\"published\"");
        let status: JobStatus = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(status, JobStatus::Running);
    }
}
