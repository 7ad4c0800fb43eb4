//! Background recalculation jobs.
//!
//! Both jobs are cooperative: each scheduler tick runs one batch and reports
//! whether more work remains. Progress lives in a persisted state record and
//! each batch re-scans for outstanding learners instead of keeping an offset,
//! so a failed or interrupted batch is simply redone on the next tick.

mod course;
mod learner;

pub(crate) use course::CourseCalculationJob;
pub(crate) use learner::LearnerCalculationJob;

use enrol_core::CourseId;
use serde_json::{Value, json};

/// Scheduler name of the site-wide learner calculation job.
pub const LEARNER_JOB_NAME: &str = "enrol_learner_calculation";

/// Scheduler name prefix of per-course calculation jobs.
pub const COURSE_JOB_PREFIX: &str = "enrol_course_calculation_";

/// Identifies a scheduled recalculation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobHandle {
    LearnerCalculation,
    CourseCalculation {
        course: CourseId,
        current_learners_only: bool,
    },
}

impl JobHandle {
    /// Name the job is scheduled under.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::LearnerCalculation => LEARNER_JOB_NAME.to_string(),
            Self::CourseCalculation { course, .. } => format!("{COURSE_JOB_PREFIX}{course}"),
        }
    }

    /// Arguments stored with the scheduled job.
    #[must_use]
    pub fn args(&self) -> Value {
        match self {
            Self::LearnerCalculation => json!({}),
            Self::CourseCalculation {
                course,
                current_learners_only,
            } => json!({
                "course": course,
                "current_learners_only": current_learners_only,
            }),
        }
    }

    /// Recover a handle from a scheduled job. Unknown names yield `None`.
    #[must_use]
    pub fn parse(job_name: &str, args: &Value) -> Option<Self> {
        if job_name == LEARNER_JOB_NAME {
            return Some(Self::LearnerCalculation);
        }
        let course: CourseId = job_name.strip_prefix(COURSE_JOB_PREFIX)?.parse().ok()?;
        let current_learners_only = args
            .get("current_learners_only")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Some(Self::CourseCalculation {
            course,
            current_learners_only,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_roundtrip_through_scheduler_form() {
        let course = CourseId::new(8).unwrap();
        for handle in [
            JobHandle::LearnerCalculation,
            JobHandle::CourseCalculation {
                course,
                current_learners_only: true,
            },
        ] {
            assert_eq!(JobHandle::parse(&handle.name(), &handle.args()), Some(handle));
        }
        assert_eq!(
            JobHandle::CourseCalculation {
                course,
                current_learners_only: false
            }
            .name(),
            "enrol_course_calculation_8"
        );
    }

    #[test]
    fn unknown_jobs_do_not_parse() {
        assert_eq!(JobHandle::parse("something_else", &Value::Null), None);
        assert_eq!(JobHandle::parse("enrol_course_calculation_x", &Value::Null), None);
    }
}
