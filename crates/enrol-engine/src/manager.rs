//! Process-wide enrolment manager.
//!
//! The manager owns the provider registry, the collaborators and the
//! buffered journal, memoizes one [`CourseEnrolment`] per course, and is the
//! entry point for every enrolment operation exposed to other layers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use enrol_config::EnrolConfig;
use enrol_core::enums::PublishState;
use enrol_core::jobs::{CourseJobState, LearnerJobState};
use enrol_core::journal::HistoryEntry;
use enrol_core::results::ProviderResultSet;
use enrol_core::time::{Clock, SystemClock};
use enrol_core::{CourseId, LearnerId};
use indexmap::IndexMap;
use serde::Serialize;

use crate::course::{CourseEnrolment, ProviderDebug};
use crate::error::{EngineError, StoreError};
use crate::jobs::{CourseCalculationJob, JobHandle, LearnerCalculationJob};
use crate::journal::JournalStore;
use crate::keys;
use crate::manual::MANUAL_PROVIDER_ID;
use crate::provider::ProviderContext;
use crate::registry::ProviderRegistry;
use crate::salt;
use crate::store::{Collaborators, JobOutcome, JobRunner, MetaScope};

/// State shared by the manager, its course caches and its jobs.
pub(crate) struct Shared {
    pub(crate) registry: ProviderRegistry,
    pub(crate) deps: Collaborators,
    pub(crate) config: EnrolConfig,
    pub(crate) journal: JournalStore,
    pub(crate) calculation_version: String,
    clock: Arc<dyn Clock>,
}

impl Shared {
    pub(crate) fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    pub(crate) fn get_site_salt(&self) -> Result<String, StoreError> {
        match self.deps.meta.get(MetaScope::Site, keys::SITE_SALT)? {
            Some(salt) if !salt.is_empty() => Ok(salt),
            _ => self.reset_site_salt(),
        }
    }

    fn reset_site_salt(&self) -> Result<String, StoreError> {
        let salt = salt::new_salt(self.now());
        self.deps.meta.set(MetaScope::Site, keys::SITE_SALT, &salt)?;
        Ok(salt)
    }

    pub(crate) fn learner_marker(&self, learner: LearnerId) -> Result<Option<String>, StoreError> {
        self.deps
            .meta
            .get(MetaScope::Learner(learner), keys::CALCULATED_VERSION)
    }
}

/// Everything an admin needs to understand one learner's status in a course.
#[derive(Debug, Clone, Serialize)]
pub struct DebugReport {
    pub learner: LearnerId,
    pub course: CourseId,
    pub publish_state: PublishState,
    pub removed: bool,
    pub calculation_version: String,
    pub version_hash: String,
    pub cached: Option<ProviderResultSet>,
    pub cache_fresh: bool,
    pub providers: Vec<ProviderDebug>,
}

pub struct EnrolmentManager {
    shared: Arc<Shared>,
    courses: Mutex<HashMap<CourseId, Arc<CourseEnrolment>>>,
}

impl EnrolmentManager {
    /// Build a manager on the wall clock.
    pub fn new(registry: ProviderRegistry, deps: Collaborators, config: EnrolConfig) -> Self {
        Self::with_clock(registry, deps, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        registry: ProviderRegistry,
        deps: Collaborators,
        config: EnrolConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let journal = JournalStore::new(Arc::clone(&deps.meta), config.journal.clone());
        let calculation_version = registry.calculation_version();
        Self {
            shared: Arc::new(Shared {
                registry,
                deps,
                config,
                journal,
                calculation_version,
                clock,
            }),
            courses: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.shared.registry
    }

    #[must_use]
    pub fn config(&self) -> &EnrolConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn journal(&self) -> &JournalStore {
        &self.shared.journal
    }

    /// Fingerprint of the registered providers and the algorithm version.
    #[must_use]
    pub fn get_calculation_version(&self) -> &str {
        &self.shared.calculation_version
    }

    /// The memoized cache of `course`.
    ///
    /// The instance map is cleared once it reaches
    /// `cache.max_course_instances`.
    pub fn course(&self, course: CourseId) -> Arc<CourseEnrolment> {
        let mut courses = self.courses.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = courses.get(&course) {
            return Arc::clone(existing);
        }
        if courses.len() >= self.shared.config.cache.max_course_instances {
            tracing::debug!(evicted = courses.len(), "course instance cache full; clearing");
            courses.clear();
        }
        let instance = Arc::new(CourseEnrolment::new(course, Arc::clone(&self.shared)));
        courses.insert(course, Arc::clone(&instance));
        instance
    }

    fn check_ids(learner: Option<LearnerId>, course: Option<CourseId>) -> Result<(), EngineError> {
        if learner.is_some_and(LearnerId::is_reserved) {
            return Err(EngineError::InvalidInput("learner id must be positive".into()));
        }
        if course.is_some_and(CourseId::is_reserved) {
            return Err(EngineError::InvalidInput("course id must be positive".into()));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Foreground checks
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `EngineError::CourseNotFound` for unknown courses,
    /// `EngineError::InvalidInput` for reserved ids and `EngineError::Store`
    /// when persistence fails.
    pub fn is_enrolled(
        &self,
        learner: LearnerId,
        course: CourseId,
        use_cache: bool,
    ) -> Result<bool, EngineError> {
        Self::check_ids(Some(learner), Some(course))?;
        self.course(course).is_enrolled(learner, use_cache)
    }

    /// Invalidate one pair and recompute it immediately.
    ///
    /// # Errors
    ///
    /// Same as [`Self::is_enrolled`].
    pub fn trigger_course_enrolment_check(
        &self,
        learner: LearnerId,
        course: CourseId,
    ) -> Result<bool, EngineError> {
        Self::check_ids(Some(learner), Some(course))?;
        let cache = self.course(course);
        cache.publish_state()?;
        cache.invalidate(learner)?;
        cache.is_enrolled(learner, false)
    }

    /// # Errors
    ///
    /// Returns `EngineError::Store` if records cannot be read.
    pub fn get_enrolled_user_ids(&self, course: CourseId) -> Result<Vec<LearnerId>, EngineError> {
        Self::check_ids(None, Some(course))?;
        self.course(course).get_enrolled_user_ids()
    }

    // -----------------------------------------------------------------------
    // Manual enrolment
    // -----------------------------------------------------------------------

    /// Enrol `learner` through the manual provider.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ProviderNotFound` if the manual provider is not
    /// registered and `EngineError::Provider` if it refuses.
    pub fn enrol(&self, learner: LearnerId, course: CourseId) -> Result<bool, EngineError> {
        self.apply_manual(learner, course, ManualAction::Enrol)
    }

    /// Withdraw `learner`'s manual enrolment.
    ///
    /// # Errors
    ///
    /// Same as [`Self::enrol`].
    pub fn withdraw(&self, learner: LearnerId, course: CourseId) -> Result<bool, EngineError> {
        self.apply_manual(learner, course, ManualAction::Withdraw)
    }

    fn apply_manual(
        &self,
        learner: LearnerId,
        course: CourseId,
        action: ManualAction,
    ) -> Result<bool, EngineError> {
        Self::check_ids(Some(learner), Some(course))?;
        let provider = self
            .shared
            .registry
            .get_by_id(MANUAL_PROVIDER_ID)
            .ok_or_else(|| EngineError::ProviderNotFound(MANUAL_PROVIDER_ID.to_string()))?;
        let cache = self.course(course);
        cache.publish_state()?;

        let mut store = cache.load_state_store(learner)?;
        let mut ctx = ProviderContext::new(store.get_provider_state(MANUAL_PROVIDER_ID), self.shared.now());
        let outcome = match action {
            ManualAction::Enrol => provider.enrol(&mut ctx, learner, course),
            ManualAction::Withdraw => provider.withdraw(&mut ctx, learner, course),
        }
        .map_err(|source| EngineError::Provider {
            provider: MANUAL_PROVIDER_ID.to_string(),
            source,
        })?;
        cache.save_state_store(learner, &mut store)?;

        self.trigger_course_enrolment_check(learner, course)?;
        tracing::info!(%learner, %course, action = action.as_str(), "manual enrolment change");
        Ok(outcome)
    }

    /// Decide whether self-service enrolment into `course` must be blocked.
    ///
    /// Returns `Some(false)` when the manual provider is missing or another
    /// provider handles the course, otherwise passes `default` through.
    #[must_use]
    pub fn maybe_prevent_frontend_manual_enrol(
        &self,
        default: Option<bool>,
        course: CourseId,
    ) -> Option<bool> {
        if self.shared.registry.get_by_id(MANUAL_PROVIDER_ID).is_none() {
            return Some(false);
        }
        let other_handles = self
            .shared
            .registry
            .get_all()
            .filter(|p| p.id() != MANUAL_PROVIDER_ID)
            .any(|p| match p.handles(course) {
                Ok(handles) => handles,
                Err(e) => {
                    tracing::warn!(provider = %p.id(), %course, %e, "provider could not tell whether it handles course");
                    false
                }
            });
        if other_handles { Some(false) } else { default }
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `EngineError` if the course is unknown or persistence fails.
    pub fn remove_learner(&self, learner: LearnerId, course: CourseId) -> Result<(), EngineError> {
        Self::check_ids(Some(learner), Some(course))?;
        let cache = self.course(course);
        cache.publish_state()?;
        cache.remove_learner(learner)
    }

    /// # Errors
    ///
    /// Returns `EngineError` if the course is unknown or persistence fails.
    pub fn restore_learner(&self, learner: LearnerId, course: CourseId) -> Result<bool, EngineError> {
        Self::check_ids(Some(learner), Some(course))?;
        self.course(course).restore_learner(learner)
    }

    /// # Errors
    ///
    /// Returns `EngineError::Store` if the flag cannot be read.
    pub fn is_learner_removed(&self, learner: LearnerId, course: CourseId) -> Result<bool, EngineError> {
        Self::check_ids(Some(learner), Some(course))?;
        self.course(course).is_learner_removed(learner)
    }

    // -----------------------------------------------------------------------
    // Salts and recalculation
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `EngineError::Store` if the salt cannot be read or created.
    pub fn get_site_salt(&self) -> Result<String, EngineError> {
        Ok(self.shared.get_site_salt()?)
    }

    /// Invalidate every cached result on the site.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` if the salt cannot be written.
    pub fn reset_site_salt(&self) -> Result<String, EngineError> {
        let salt = self.shared.reset_site_salt()?;
        tracing::info!("reset site enrolment salt");
        Ok(salt)
    }

    /// Recompute every course `learner` has records for, then stamp the
    /// learner with the current calculation version.
    ///
    /// Returns `false` without doing anything if the learner is already
    /// current.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` when persistence fails. Courses that no
    /// longer exist are skipped.
    pub fn recalculate_enrolments(&self, learner: LearnerId) -> Result<bool, EngineError> {
        Self::check_ids(Some(learner), None)?;
        let version = self.shared.calculation_version.as_str();
        if self.shared.learner_marker(learner)?.as_deref() == Some(version) {
            return Ok(false);
        }

        for course in self.learner_courses(learner)? {
            match self.course(course).is_enrolled(learner, false) {
                Ok(_) => {}
                Err(EngineError::CourseNotFound(missing)) => {
                    tracing::debug!(%learner, course = %missing, "skipping records of deleted course");
                }
                Err(e) => return Err(e),
            }
        }

        self.shared
            .deps
            .meta
            .set(MetaScope::Learner(learner), keys::CALCULATED_VERSION, version)?;
        Ok(true)
    }

    /// Courses `learner` holds a result or provider state record for.
    fn learner_courses(&self, learner: LearnerId) -> Result<Vec<CourseId>, EngineError> {
        let meta = &self.shared.deps.meta;
        let mut courses: Vec<CourseId> = Vec::new();
        for prefix in [keys::RESULTS_PREFIX, keys::PROVIDER_STATE_PREFIX] {
            for key in meta.learner_keys(learner, prefix)? {
                if let Some(course) = keys::course_from_key(&key, prefix) {
                    if !courses.contains(&course) {
                        courses.push(course);
                    }
                }
            }
        }
        Ok(courses)
    }

    /// Invalidate `course`'s cached results and schedule their recomputation.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the course is unknown or persistence fails.
    pub fn recalculate_enrolment(
        &self,
        course: CourseId,
        current_learners_only: bool,
    ) -> Result<JobHandle, EngineError> {
        Self::check_ids(None, Some(course))?;
        let cache = self.course(course);
        cache.publish_state()?;
        cache.recalculate_enrolment(current_learners_only)
    }

    // -----------------------------------------------------------------------
    // Background jobs
    // -----------------------------------------------------------------------

    /// Schedule the learner calculation job if the calculation version moved.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` if the job state cannot be read or written.
    pub fn maybe_start_learner_calculation(&self) -> Result<bool, EngineError> {
        LearnerCalculationJob::new(&self.shared).maybe_start()
    }

    /// # Errors
    ///
    /// Returns `EngineError::Store` if the job state cannot be written.
    pub fn cancel_learner_calculation(&self) -> Result<(), EngineError> {
        LearnerCalculationJob::new(&self.shared).cancel()
    }

    /// # Errors
    ///
    /// Returns `EngineError::Store` if the job state cannot be written.
    pub fn cancel_course_calculation(&self, course: CourseId) -> Result<(), EngineError> {
        CourseCalculationJob::new(&self.shared, course).cancel()
    }

    /// # Errors
    ///
    /// Returns `EngineError::Store` if the job state cannot be read.
    pub fn learner_job_state(&self) -> Result<LearnerJobState, EngineError> {
        LearnerCalculationJob::new(&self.shared).state()
    }

    /// # Errors
    ///
    /// Returns `EngineError::Store` if the job state cannot be read.
    pub fn course_job_state(&self, course: CourseId) -> Result<CourseJobState, EngineError> {
        CourseCalculationJob::new(&self.shared, course).state()
    }

    /// Run one tick of every scheduled job.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` if the scheduler fails.
    pub fn run_due_jobs(&self) -> Result<usize, EngineError> {
        Ok(self.shared.deps.scheduler.run_due_jobs(self)?)
    }

    /// Write buffered journal entries.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` if a journal cannot be written.
    pub fn flush(&self) -> Result<(), EngineError> {
        Ok(self.shared.journal.persist_all()?)
    }

    // -----------------------------------------------------------------------
    // Audit and admin
    // -----------------------------------------------------------------------

    /// Journaled status transitions of one provider, newest first.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` if the journal cannot be read.
    pub fn get_provider_history(
        &self,
        provider_id: &str,
        learner: LearnerId,
        course: CourseId,
    ) -> Result<Vec<HistoryEntry>, EngineError> {
        Self::check_ids(Some(learner), Some(course))?;
        Ok(self
            .shared
            .journal
            .get_provider_history(provider_id, learner, course)?)
    }

    /// Status per provider at `at` (defaults to now).
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` if the journal cannot be read.
    pub fn get_enrolment_snapshot(
        &self,
        learner: LearnerId,
        course: CourseId,
        at: Option<i64>,
    ) -> Result<IndexMap<String, Option<bool>>, EngineError> {
        Self::check_ids(Some(learner), Some(course))?;
        let at = at.unwrap_or_else(|| self.shared.now());
        Ok(self.shared.journal.get_enrolment_snapshot(learner, course, at)?)
    }

    /// Live diagnostic view of one (learner, course). Never writes.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::CourseNotFound` for unknown courses and
    /// `EngineError::Store` if records cannot be read.
    pub fn debug_learner(&self, learner: LearnerId, course: CourseId) -> Result<DebugReport, EngineError> {
        Self::check_ids(Some(learner), Some(course))?;
        let cache = self.course(course);
        let publish_state = cache.publish_state()?;
        let cached = cache.get_cached_result(learner)?;
        let version_hash = cache.current_version_hash()?;
        let cache_fresh = cached
            .as_ref()
            .is_some_and(|results| results.version_hash() == version_hash);
        Ok(DebugReport {
            learner,
            course,
            publish_state,
            removed: cache.is_learner_removed(learner)?,
            calculation_version: self.shared.calculation_version.clone(),
            version_hash,
            cached,
            cache_fresh,
            providers: cache.dry_run(learner)?,
        })
    }

    /// Delete everything the engine stores for `learner`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` on the first failed delete.
    pub fn delete_learner_data(&self, learner: LearnerId) -> Result<(), EngineError> {
        Self::check_ids(Some(learner), None)?;
        let meta = &self.shared.deps.meta;
        let scope = MetaScope::Learner(learner);
        for prefix in [
            keys::RESULTS_PREFIX,
            keys::PROVIDER_STATE_PREFIX,
            keys::REMOVED_PREFIX,
        ] {
            for key in meta.learner_keys(learner, prefix)? {
                meta.delete(scope, &key)?;
            }
        }
        meta.delete(scope, keys::PROVIDER_JOURNAL)?;
        meta.delete(scope, keys::CALCULATED_VERSION)?;

        let associations = &self.shared.deps.associations;
        for course in associations.associated_courses(learner)? {
            associations.remove_association(learner, course)?;
        }
        self.shared.journal.forget(learner);
        tracing::info!(%learner, "deleted learner enrolment data");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum ManualAction {
    Enrol,
    Withdraw,
}

impl ManualAction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Enrol => "enrol",
            Self::Withdraw => "withdraw",
        }
    }
}

impl JobRunner for EnrolmentManager {
    fn run_job(&self, job_name: &str, args: &serde_json::Value) -> JobOutcome {
        let Some(handle) = JobHandle::parse(job_name, args) else {
            tracing::warn!(job = %job_name, "dropping unknown scheduled job");
            return JobOutcome::Complete;
        };
        let result = match handle {
            JobHandle::LearnerCalculation => LearnerCalculationJob::new(&self.shared).run(self),
            JobHandle::CourseCalculation { course, .. } => {
                CourseCalculationJob::new(&self.shared, course).run(self)
            }
        };
        match result {
            Ok(true) => JobOutcome::Complete,
            Ok(false) => JobOutcome::Pending,
            Err(e) => {
                tracing::warn!(job = %job_name, %e, "enrolment job tick failed");
                JobOutcome::Failed(e.to_string())
            }
        }
    }
}
