//! Site-wide learner calculation job.
//!
//! Runs whenever the calculation version changes: walks every learner whose
//! `enrol_calculated_version` marker is stale, site owner first, and
//! recomputes all their records.

use enrol_core::enums::JobStatus;
use enrol_core::jobs::LearnerJobState;
use enrol_core::LearnerId;

use super::{JobHandle, LEARNER_JOB_NAME};
use crate::error::EngineError;
use crate::keys;
use crate::manager::{EnrolmentManager, Shared};
use crate::store::MetaScope;

pub(crate) struct LearnerCalculationJob<'a> {
    shared: &'a Shared,
}

impl<'a> LearnerCalculationJob<'a> {
    pub(crate) const fn new(shared: &'a Shared) -> Self {
        Self { shared }
    }

    pub(crate) fn state(&self) -> Result<LearnerJobState, EngineError> {
        let raw = self
            .shared
            .deps
            .meta
            .get(MetaScope::Site, keys::LEARNER_JOB_STATE)?;
        Ok(LearnerJobState::from_json(raw.as_deref()))
    }

    fn save_state(&self, state: &LearnerJobState) -> Result<(), EngineError> {
        self.shared.deps.meta.set(
            MetaScope::Site,
            keys::LEARNER_JOB_STATE,
            &serde_json::to_string(state)?,
        )?;
        Ok(())
    }

    /// Schedule the job unless it already completed, or is already
    /// scheduled, for the current calculation version.
    pub(crate) fn maybe_start(&self) -> Result<bool, EngineError> {
        let version = self.shared.calculation_version.as_str();
        let state = self.state()?;
        if state.is_complete_for(version) {
            return Ok(false);
        }
        let scheduler = &self.shared.deps.scheduler;
        if state.status.is_active()
            && state.version.as_deref() == Some(version)
            && scheduler.is_scheduled(LEARNER_JOB_NAME)?
        {
            return Ok(false);
        }

        self.save_state(&LearnerJobState {
            status: JobStatus::Scheduled,
            version: Some(version.to_string()),
            batch: 0,
        })?;
        let handle = JobHandle::LearnerCalculation;
        scheduler.schedule_recurring(&handle.name(), handle.args())?;
        tracing::info!(job = LEARNER_JOB_NAME, %version, "scheduled learner calculation");
        Ok(true)
    }

    /// Stop the job. A later [`Self::maybe_start`] starts over from batch 1.
    pub(crate) fn cancel(&self) -> Result<(), EngineError> {
        self.shared.deps.scheduler.cancel(LEARNER_JOB_NAME)?;
        let mut state = self.state()?;
        if state.status.can_transition_to(JobStatus::Idle) {
            state.status = JobStatus::Idle;
            state.batch = 0;
            self.save_state(&state)?;
        }
        tracing::info!(job = LEARNER_JOB_NAME, "cancelled learner calculation");
        Ok(())
    }

    /// Run one batch. Returns whether the job is complete.
    pub(crate) fn run(&self, manager: &EnrolmentManager) -> Result<bool, EngineError> {
        let version = self.shared.calculation_version.clone();
        let mut state = self.state()?;
        if state.version.as_deref() != Some(version.as_str()) {
            state.version = Some(version.clone());
            state.batch = 0;
        }
        state.status = JobStatus::Running;
        state.batch += 1;
        self.save_state(&state)?;

        let batch_size = self.shared.config.jobs.learner_batch_size;
        let stale = self.stale_learners(batch_size)?;
        for learner in &stale {
            manager.recalculate_enrolments(*learner)?;
        }
        manager.flush()?;
        tracing::debug!(
            job = LEARNER_JOB_NAME,
            batch = state.batch,
            learners = stale.len(),
            "ran learner calculation batch"
        );

        if stale.len() < batch_size {
            state.status = JobStatus::Complete;
            self.save_state(&state)?;
            self.shared.deps.scheduler.cancel(LEARNER_JOB_NAME)?;
            tracing::info!(job = LEARNER_JOB_NAME, batches = state.batch, %version, "learner calculation complete");
            return Ok(true);
        }
        Ok(false)
    }

    /// Up to `limit` learners with a stale marker, site owner first.
    fn stale_learners(&self, limit: usize) -> Result<Vec<LearnerId>, EngineError> {
        let directory = &self.shared.deps.learners;
        let mut candidates: Vec<LearnerId> = directory.site_owner()?.into_iter().collect();
        candidates.extend(directory.learner_ids()?);

        let version = self.shared.calculation_version.as_str();
        let mut stale = Vec::with_capacity(limit);
        for learner in candidates {
            if stale.len() >= limit {
                break;
            }
            if stale.contains(&learner) {
                continue;
            }
            if self.shared.learner_marker(learner)?.as_deref() != Some(version) {
                stale.push(learner);
            }
        }
        Ok(stale)
    }
}
