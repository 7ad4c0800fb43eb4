//! Per-course calculation job.
//!
//! Scheduled by `recalculate_enrolment`. Done once no learner of the course
//! is left with an invalidated (or, for a full run, stale) result.

use enrol_core::enums::JobStatus;
use enrol_core::jobs::CourseJobState;
use enrol_core::results::ProviderResultSet;
use enrol_core::{CourseId, LearnerId};

use super::JobHandle;
use crate::course::CourseEnrolment;
use crate::error::EngineError;
use crate::keys;
use crate::manager::{EnrolmentManager, Shared};
use crate::store::MetaScope;

pub(crate) struct CourseCalculationJob<'a> {
    shared: &'a Shared,
    course: CourseId,
}

impl<'a> CourseCalculationJob<'a> {
    pub(crate) const fn new(shared: &'a Shared, course: CourseId) -> Self {
        Self { shared, course }
    }

    fn name(&self) -> String {
        JobHandle::CourseCalculation {
            course: self.course,
            current_learners_only: false,
        }
        .name()
    }

    pub(crate) fn state(&self) -> Result<CourseJobState, EngineError> {
        let raw = self
            .shared
            .deps
            .meta
            .get(MetaScope::Site, &keys::course_job_state(self.course))?;
        Ok(CourseJobState::from_json(self.course, raw.as_deref()))
    }

    fn save_state(&self, state: &CourseJobState) -> Result<(), EngineError> {
        self.shared.deps.meta.set(
            MetaScope::Site,
            &keys::course_job_state(self.course),
            &serde_json::to_string(state)?,
        )?;
        Ok(())
    }

    /// Schedule the job. If a full run is already pending, a targeted
    /// request does not narrow it.
    pub(crate) fn start(&self, current_learners_only: bool) -> Result<JobHandle, EngineError> {
        let previous = self.state()?;
        let current_learners_only = if previous.status.is_active() {
            previous.current_learners_only && current_learners_only
        } else {
            current_learners_only
        };

        let mut state = CourseJobState::new(self.course, current_learners_only);
        state.status = JobStatus::Scheduled;
        self.save_state(&state)?;

        let handle = JobHandle::CourseCalculation {
            course: self.course,
            current_learners_only,
        };
        self.shared
            .deps
            .scheduler
            .schedule_recurring(&handle.name(), handle.args())?;
        tracing::info!(job = %handle.name(), current_learners_only, "scheduled course calculation");
        Ok(handle)
    }

    pub(crate) fn cancel(&self) -> Result<(), EngineError> {
        self.shared.deps.scheduler.cancel(&self.name())?;
        let mut state = self.state()?;
        state.status = JobStatus::Idle;
        state.batch = 0;
        self.save_state(&state)?;
        tracing::info!(job = %self.name(), "cancelled course calculation");
        Ok(())
    }

    fn complete(&self, mut state: CourseJobState) -> Result<bool, EngineError> {
        state.status = JobStatus::Complete;
        self.save_state(&state)?;
        self.shared.deps.scheduler.cancel(&self.name())?;
        tracing::info!(job = %self.name(), batches = state.batch, "course calculation complete");
        Ok(true)
    }

    /// Run one batch. Returns whether the job is complete.
    pub(crate) fn run(&self, manager: &EnrolmentManager) -> Result<bool, EngineError> {
        let mut state = self.state()?;
        let cache = manager.course(self.course);

        let live = self
            .shared
            .deps
            .courses
            .get_course_publish_state(self.course)?
            .is_some_and(|s| s.accepts_enrolment());
        if !live {
            tracing::debug!(job = %self.name(), "course is not live; nothing to recalculate");
            return self.complete(state);
        }

        state.status = JobStatus::Running;
        state.batch += 1;
        self.save_state(&state)?;

        let batch_size = self.shared.config.jobs.course_batch_size;
        let pending = self.pending_learners(&cache, state.current_learners_only, batch_size)?;
        for learner in &pending {
            cache.is_enrolled(*learner, false)?;
        }
        manager.flush()?;
        tracing::debug!(
            job = %self.name(),
            batch = state.batch,
            learners = pending.len(),
            "ran course calculation batch"
        );

        if pending.len() < batch_size {
            return self.complete(state);
        }
        Ok(false)
    }

    /// Up to `limit` learners still needing recomputation. Removed learners
    /// are never recomputed, so they are never pending.
    fn pending_learners(
        &self,
        cache: &CourseEnrolment,
        current_learners_only: bool,
        limit: usize,
    ) -> Result<Vec<LearnerId>, EngineError> {
        let mut pending = Vec::with_capacity(limit);

        if current_learners_only {
            let holders = self
                .shared
                .deps
                .meta
                .learners_with_key(&keys::results(self.course))?;
            for (learner, raw) in holders {
                if pending.len() >= limit {
                    break;
                }
                if raw.is_empty() && !cache.is_learner_removed(learner)? {
                    pending.push(learner);
                }
            }
            return Ok(pending);
        }

        let current = cache.current_version_hash()?;
        for learner in self.shared.deps.learners.learner_ids()? {
            if pending.len() >= limit {
                break;
            }
            let fresh = cache
                .get_cached_result(learner)?
                .is_some_and(|r: ProviderResultSet| r.version_hash() == current);
            if !fresh && !cache.is_learner_removed(learner)? {
                pending.push(learner);
            }
        }
        Ok(pending)
    }
}
