//! Per-course enrolment cache.
//!
//! A [`CourseEnrolment`] answers "is this learner enrolled" for one course.
//! Answers are cached per learner as a [`ProviderResultSet`] stamped with a
//! version hash over the calculation version, the site salt and the course
//! salt. Changing any of the three makes every cached record stale.

use std::sync::Arc;

use enrol_core::enums::PublishState;
use enrol_core::results::ProviderResultSet;
use enrol_core::state::{ProviderState, ProviderStateStore};
use enrol_core::{CourseId, LearnerId};
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::EngineError;
use crate::jobs::{CourseCalculationJob, JobHandle};
use crate::keys;
use crate::manager::Shared;
use crate::provider::ProviderContext;
use crate::salt;
use crate::store::MetaScope;

/// A provider failure absorbed during one evaluation round.
struct Failure {
    provider: String,
    message: String,
    /// The provider could not say whether it handles the course.
    unresolved: bool,
}

/// Enrolment cache of one course.
pub struct CourseEnrolment {
    course: CourseId,
    shared: Arc<Shared>,
}

impl CourseEnrolment {
    pub(crate) const fn new(course: CourseId, shared: Arc<Shared>) -> Self {
        Self { course, shared }
    }

    #[must_use]
    pub const fn course_id(&self) -> CourseId {
        self.course
    }

    fn learner_scope(learner: LearnerId) -> MetaScope {
        MetaScope::Learner(learner)
    }

    /// Publish state of the course.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::CourseNotFound` if the course does not exist.
    pub fn publish_state(&self) -> Result<PublishState, EngineError> {
        self.shared
            .deps
            .courses
            .get_course_publish_state(self.course)?
            .ok_or(EngineError::CourseNotFound(self.course))
    }

    // -----------------------------------------------------------------------
    // Salts and freshness
    // -----------------------------------------------------------------------

    /// The course salt, created on first use.
    ///
    /// Read from the meta store on every call so a reset made through any
    /// instance or process is seen immediately.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` if the salt cannot be read or created.
    pub fn get_course_enrolment_salt(&self) -> Result<String, EngineError> {
        let scope = MetaScope::Course(self.course);
        match self.shared.deps.meta.get(scope, keys::COURSE_SALT)? {
            Some(salt) if !salt.is_empty() => Ok(salt),
            _ => {
                let salt = salt::new_salt(self.shared.now());
                self.shared.deps.meta.set(scope, keys::COURSE_SALT, &salt)?;
                Ok(salt)
            }
        }
    }

    /// Replace the course salt, making every cached result for this course
    /// stale.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` if the new salt cannot be written.
    pub fn reset_course_enrolment_salt(&self) -> Result<String, EngineError> {
        let salt = salt::new_salt(self.shared.now());
        self.shared
            .deps
            .meta
            .set(MetaScope::Course(self.course), keys::COURSE_SALT, &salt)?;
        tracing::debug!(course = %self.course, "reset course enrolment salt");
        Ok(salt)
    }

    /// Version hash a fresh result for this course must carry.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` if a salt cannot be read or created.
    pub fn current_version_hash(&self) -> Result<String, EngineError> {
        let site_salt = self.shared.get_site_salt()?;
        let course_salt = self.get_course_enrolment_salt()?;
        Ok(salt::fingerprint([
            self.shared.calculation_version.as_str(),
            site_salt.as_str(),
            course_salt.as_str(),
        ]))
    }

    /// Whether `results` was computed under the current version hash.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` if a salt cannot be read or created.
    pub fn is_fresh(&self, results: &ProviderResultSet) -> Result<bool, EngineError> {
        Ok(results.version_hash() == self.current_version_hash()?)
    }

    // -----------------------------------------------------------------------
    // Cached results
    // -----------------------------------------------------------------------

    /// The stored result set for `learner`, fresh or not.
    ///
    /// Invalidated and malformed records read as `None`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` if the record cannot be read.
    pub fn get_cached_result(
        &self,
        learner: LearnerId,
    ) -> Result<Option<ProviderResultSet>, EngineError> {
        let raw = self
            .shared
            .deps
            .meta
            .get(Self::learner_scope(learner), &keys::results(self.course))?;
        Ok(raw.as_deref().and_then(ProviderResultSet::from_json))
    }

    /// Mark `learner`'s cached result as invalidated.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` if the record cannot be written.
    pub fn invalidate(&self, learner: LearnerId) -> Result<(), EngineError> {
        self.shared
            .deps
            .meta
            .set(Self::learner_scope(learner), &keys::results(self.course), "")?;
        Ok(())
    }

    /// Learners whose cached record grants enrolment under the current
    /// version. Never runs providers.
    ///
    /// Empty while the course does not accept enrolment, even though records
    /// from before it went to draft are kept for when it is republished.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` if records cannot be read.
    pub fn get_enrolled_user_ids(&self) -> Result<Vec<LearnerId>, EngineError> {
        let accepting = self
            .shared
            .deps
            .courses
            .get_course_publish_state(self.course)?
            .is_some_and(PublishState::accepts_enrolment);
        if !accepting {
            return Ok(Vec::new());
        }
        let current = self.current_version_hash()?;
        let holders = self
            .shared
            .deps
            .meta
            .learners_with_key(&keys::results(self.course))?;
        Ok(holders
            .into_iter()
            .filter_map(|(learner, raw)| {
                let results = ProviderResultSet::from_json(&raw)?;
                (results.version_hash() == current && results.is_enrolment_provided())
                    .then_some(learner)
            })
            .collect())
    }

    // -----------------------------------------------------------------------
    // Provider state
    // -----------------------------------------------------------------------

    /// Load every provider state `learner` has for this course.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` if the record cannot be read. Malformed
    /// records load as an empty store.
    pub fn load_state_store(&self, learner: LearnerId) -> Result<ProviderStateStore, EngineError> {
        let raw = self
            .shared
            .deps
            .meta
            .get(Self::learner_scope(learner), &keys::provider_state(self.course))?;
        let log_cap = self.shared.config.state.log_cap;
        Ok(raw.map_or_else(
            || ProviderStateStore::new(log_cap),
            |raw| ProviderStateStore::from_json(&raw, log_cap),
        ))
    }

    /// Write `store` back if it changed since it was loaded.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the store cannot be serialized or written.
    pub fn save_state_store(
        &self,
        learner: LearnerId,
        store: &mut ProviderStateStore,
    ) -> Result<(), EngineError> {
        if !store.has_changed() {
            return Ok(());
        }
        let scope = Self::learner_scope(learner);
        let key = keys::provider_state(self.course);
        if store.is_empty() {
            self.shared.deps.meta.delete(scope, &key)?;
        } else {
            self.shared.deps.meta.set(scope, &key, &store.to_json()?)?;
        }
        store.mark_saved();
        Ok(())
    }

    /// A copy of `provider_id`'s state for `learner`, empty if it has none.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` if the record cannot be read.
    pub fn get_provider_state(
        &self,
        provider_id: &str,
        learner: LearnerId,
    ) -> Result<ProviderState, EngineError> {
        let store = self.load_state_store(learner)?;
        Ok(store
            .provider_state(provider_id)
            .cloned()
            .unwrap_or_else(|| ProviderState::new(self.shared.config.state.log_cap)))
    }

    // -----------------------------------------------------------------------
    // Enrolment checks
    // -----------------------------------------------------------------------

    /// Whether `learner` is currently enrolled.
    ///
    /// Courses not accepting enrolment and removed learners are never
    /// enrolled; neither case touches the cache. Otherwise a fresh cached
    /// result is returned when `use_cache` is set, and every handling
    /// provider is consulted on a miss.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::CourseNotFound` for unknown courses and
    /// `EngineError::Store` when persistence fails. Provider failures are
    /// absorbed.
    pub fn is_enrolled(&self, learner: LearnerId, use_cache: bool) -> Result<bool, EngineError> {
        let state = self.publish_state()?;
        if !state.accepts_enrolment() {
            tracing::debug!(course = %self.course, %state, "course does not accept enrolment");
            return Ok(false);
        }
        if self.is_learner_removed(learner)? {
            return Ok(false);
        }

        if use_cache {
            if let Some(cached) = self.get_cached_result(learner)? {
                if self.is_fresh(&cached)? {
                    tracing::debug!(course = %self.course, %learner, "enrolment cache hit");
                    return Ok(cached.is_enrolment_provided());
                }
            }
        }

        tracing::debug!(course = %self.course, %learner, "computing enrolment");
        let results = self.compute(learner)?;
        Ok(results.is_enrolment_provided())
    }

    /// Consult every handling provider and persist the outcome.
    fn compute(&self, learner: LearnerId) -> Result<ProviderResultSet, EngineError> {
        let now = self.shared.now();
        let mut store = self.load_state_store(learner)?;
        let (answers, failures) = self.query_providers(&mut store, learner, now);

        let results = ProviderResultSet::new(answers, now, self.current_version_hash()?);
        self.save_state_store(learner, &mut store)?;
        self.shared.deps.meta.set(
            Self::learner_scope(learner),
            &keys::results(self.course),
            &results.to_json()?,
        )?;
        self.sync_association(learner, results.is_enrolment_provided())?;

        let journal = &self.shared.journal;
        let unresolved: Vec<&str> = failures
            .iter()
            .filter(|f| f.unresolved)
            .map(|f| f.provider.as_str())
            .collect();
        journal.register_possible_enrolment_change(&results, learner, self.course, &unresolved)?;
        for failure in &failures {
            journal.add_provider_log_message(
                &failure.provider,
                learner,
                self.course,
                now,
                &failure.message,
            )?;
        }
        Ok(results)
    }

    fn query_providers(
        &self,
        store: &mut ProviderStateStore,
        learner: LearnerId,
        now: i64,
    ) -> (IndexMap<String, bool>, Vec<Failure>) {
        let mut answers = IndexMap::new();
        let mut failures = Vec::new();

        for provider in self.shared.registry.get_all() {
            let id = provider.id();
            match provider.handles(self.course) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!(provider = %id, course = %self.course, %e, "provider could not tell whether it handles course");
                    failures.push(Failure {
                        provider: id.to_string(),
                        message: format!("Could not check whether course is handled: {e}"),
                        unresolved: true,
                    });
                    continue;
                }
            }

            let mut ctx = ProviderContext::new(store.get_provider_state(id), now);
            let enrolled = match provider.is_enrolled(&mut ctx, learner, self.course) {
                Ok(enrolled) => enrolled,
                Err(e) => {
                    tracing::warn!(provider = %id, course = %self.course, %learner, %e, "provider failed; treating as not enrolled");
                    failures.push(Failure {
                        provider: id.to_string(),
                        message: format!("Enrolment check failed: {e}"),
                        unresolved: false,
                    });
                    false
                }
            };
            answers.insert(id.to_string(), enrolled);
        }

        (answers, failures)
    }

    fn sync_association(&self, learner: LearnerId, enrolled: bool) -> Result<(), EngineError> {
        let associations = &self.shared.deps.associations;
        let has = associations.has_association(learner, self.course)?;
        if enrolled && !has {
            associations.add_association(learner, self.course)?;
        } else if !enrolled && has {
            associations.remove_association(learner, self.course)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `EngineError::Store` if the flag cannot be read.
    pub fn is_learner_removed(&self, learner: LearnerId) -> Result<bool, EngineError> {
        Ok(self
            .shared
            .deps
            .meta
            .get(Self::learner_scope(learner), &keys::removed(self.course))?
            .is_some())
    }

    /// Exclude `learner` from the course whatever providers say.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Store` if persistence fails.
    pub fn remove_learner(&self, learner: LearnerId) -> Result<(), EngineError> {
        let scope = Self::learner_scope(learner);
        let now = self.shared.now().to_string();
        self.shared
            .deps
            .meta
            .set(scope, &keys::removed(self.course), &now)?;
        self.invalidate(learner)?;
        self.sync_association(learner, false)?;
        tracing::info!(course = %self.course, %learner, "removed learner from course");
        Ok(())
    }

    /// Lift a removal and recompute the learner's status.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if persistence fails.
    pub fn restore_learner(&self, learner: LearnerId) -> Result<bool, EngineError> {
        self.shared
            .deps
            .meta
            .delete(Self::learner_scope(learner), &keys::removed(self.course))?;
        tracing::info!(course = %self.course, %learner, "restored learner to course");
        self.is_enrolled(learner, false)
    }

    // -----------------------------------------------------------------------
    // Recalculation
    // -----------------------------------------------------------------------

    /// Invalidate cached results and schedule their recomputation.
    ///
    /// With `current_learners_only`, only learners who already hold a record
    /// are invalidated and the course salt is kept. Otherwise the salt is
    /// reset as well, so every learner is recomputed, including those never
    /// evaluated before.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if persistence or scheduling fails.
    pub fn recalculate_enrolment(
        &self,
        current_learners_only: bool,
    ) -> Result<JobHandle, EngineError> {
        let holders = self
            .shared
            .deps
            .meta
            .learners_with_key(&keys::results(self.course))?;
        let mut invalidated = 0usize;
        for (learner, raw) in holders {
            if !raw.is_empty() {
                self.invalidate(learner)?;
                invalidated += 1;
            }
        }
        if !current_learners_only {
            self.reset_course_enrolment_salt()?;
        }
        tracing::info!(
            course = %self.course,
            invalidated,
            current_learners_only,
            "invalidated course enrolment results"
        );
        CourseCalculationJob::new(&self.shared, self.course).start(current_learners_only)
    }

    /// Run every provider for `learner` without persisting anything.
    pub(crate) fn dry_run(
        &self,
        learner: LearnerId,
    ) -> Result<Vec<ProviderDebug>, EngineError> {
        let now = self.shared.now();
        let mut store = self.load_state_store(learner)?;
        let mut report = Vec::new();

        for provider in self.shared.registry.get_all() {
            let id = provider.id();
            let mut entry = ProviderDebug {
                id: id.to_string(),
                name: provider.name().to_string(),
                version: provider.version(),
                handles: None,
                enrolled: None,
                error: None,
                debug: Vec::new(),
                logs: Vec::new(),
            };
            match provider.handles(self.course) {
                Ok(handles) => entry.handles = Some(handles),
                Err(e) => entry.error = Some(e.to_string()),
            }
            if entry.handles == Some(true) {
                let mut ctx = ProviderContext::new(store.get_provider_state(id), now);
                match provider.is_enrolled(&mut ctx, learner, self.course) {
                    Ok(enrolled) => entry.enrolled = Some(enrolled),
                    Err(e) => entry.error = Some(e.to_string()),
                }
            }
            let state = store.get_provider_state(id);
            entry.debug = provider.debug(state, learner, self.course);
            entry.logs = state.get_logs().to_vec();
            report.push(entry);
        }
        Ok(report)
    }
}

/// Live view of one provider for one (learner, course).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderDebug {
    pub id: String,
    pub name: String,
    pub version: u32,
    /// `None` if `handles` failed.
    pub handles: Option<bool>,
    /// `None` if the provider does not handle the course or failed.
    pub enrolled: Option<bool>,
    pub error: Option<String>,
    pub debug: Vec<String>,
    /// State log lines, oldest first.
    pub logs: Vec<(i64, String)>,
}
