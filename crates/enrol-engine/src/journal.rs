//! Buffered provider journal store.
//!
//! Journals are loaded once per learner into memory, mutated there, and only
//! written back by [`JournalStore::persist_all`]. A learner's courses are
//! persisted only once some provider granted enrolment in them, so learners
//! who were never enrolled leave nothing behind.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use enrol_config::JournalConfig;
use enrol_core::journal::{HistoryEntry, JournalLog, LearnerJournal, ProviderJournal};
use enrol_core::results::ProviderResultSet;
use enrol_core::{CourseId, LearnerId};
use indexmap::IndexMap;

use crate::error::StoreError;
use crate::keys;
use crate::store::{MetaScope, MetaStore};

#[derive(Default)]
struct Buffer {
    journals: HashMap<LearnerId, LearnerJournal>,
    dirty: HashSet<LearnerId>,
}

pub struct JournalStore {
    meta: Arc<dyn MetaStore>,
    config: JournalConfig,
    buffer: Mutex<Buffer>,
}

impl JournalStore {
    pub fn new(meta: Arc<dyn MetaStore>, config: JournalConfig) -> Self {
        Self {
            meta,
            config,
            buffer: Mutex::new(Buffer::default()),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_journal<R>(
        &self,
        learner: LearnerId,
        f: impl FnOnce(&mut LearnerJournal) -> R,
    ) -> Result<R, StoreError> {
        let mut buffer = self.lock();
        if !buffer.journals.contains_key(&learner) {
            let raw = self
                .meta
                .get(MetaScope::Learner(learner), keys::PROVIDER_JOURNAL)?;
            let journal = raw
                .as_deref()
                .map(LearnerJournal::from_json)
                .unwrap_or_default();
            buffer.journals.insert(learner, journal);
        }
        let journal = buffer.journals.entry(learner).or_default();
        Ok(f(journal))
    }

    fn mark_dirty(&self, learner: LearnerId) {
        self.lock().dirty.insert(learner);
    }

    /// Journal the statuses in `results` for (learner, course).
    ///
    /// Each provider gets a history entry only if its status differs from the
    /// last one recorded. Providers journaled before but absent from
    /// `results` get a `null` entry, except those in `unresolved`: a provider
    /// that could not say whether it handles the course keeps its last status.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the persisted journal cannot be read.
    pub fn register_possible_enrolment_change(
        &self,
        results: &ProviderResultSet,
        learner: LearnerId,
        course: CourseId,
        unresolved: &[&str],
    ) -> Result<(), StoreError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let cap = self.config.history_cap;
        let at = results.computed_at();
        let changed = self.with_journal(learner, |journal| {
            let course_journal = journal.course_mut(course);
            let mut changed = false;
            for (provider_id, enrolled) in results.results() {
                changed |= course_journal
                    .entry(provider_id.clone())
                    .or_default()
                    .record_status(at, Some(*enrolled), cap);
            }
            for (provider_id, provider) in course_journal.iter_mut() {
                if results.provider_result(provider_id).is_none()
                    && !unresolved.contains(&provider_id.as_str())
                {
                    changed |= provider.record_status(at, None, cap);
                }
            }
            changed
        })?;
        if changed {
            tracing::debug!(%learner, %course, "journaled enrolment transition");
            self.mark_dirty(learner);
        }
        Ok(())
    }

    /// Append a diagnostic line to a provider's journal.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the persisted journal cannot be read.
    pub fn add_provider_log_message(
        &self,
        provider_id: &str,
        learner: LearnerId,
        course: CourseId,
        at: i64,
        message: &str,
    ) -> Result<(), StoreError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let cap = self.config.log_cap;
        self.with_journal(learner, |journal| {
            journal
                .provider_mut(course, provider_id)
                .add_log(at, message, cap);
        })?;
        self.mark_dirty(learner);
        Ok(())
    }

    fn read_provider<R>(
        &self,
        provider_id: &str,
        learner: LearnerId,
        course: CourseId,
        f: impl FnOnce(&ProviderJournal) -> R,
    ) -> Result<Option<R>, StoreError> {
        self.with_journal(learner, |journal| journal.provider(course, provider_id).map(f))
    }

    /// Status transitions of one provider, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the persisted journal cannot be read.
    pub fn get_provider_history(
        &self,
        provider_id: &str,
        learner: LearnerId,
        course: CourseId,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self
            .read_provider(provider_id, learner, course, |p| p.history().to_vec())?
            .unwrap_or_default())
    }

    /// Journal log lines of one provider, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the persisted journal cannot be read.
    pub fn get_provider_logs(
        &self,
        provider_id: &str,
        learner: LearnerId,
        course: CourseId,
    ) -> Result<Vec<JournalLog>, StoreError> {
        Ok(self
            .read_provider(provider_id, learner, course, |p| p.logs().to_vec())?
            .unwrap_or_default())
    }

    /// Status of every journaled provider at `at`. Providers with no entry
    /// at or before `at` are omitted.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the persisted journal cannot be read.
    pub fn get_enrolment_snapshot(
        &self,
        learner: LearnerId,
        course: CourseId,
        at: i64,
    ) -> Result<IndexMap<String, Option<bool>>, StoreError> {
        self.with_journal(learner, |journal| journal.snapshot(course, at))
    }

    /// Write every modified learner journal and drop the in-memory copies.
    ///
    /// Only courses holding at least one positive entry are written; a
    /// journal left with no such course is deleted.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on the first failed write. Journals not yet
    /// written stay buffered.
    pub fn persist_all(&self) -> Result<(), StoreError> {
        let mut buffer = self.lock();
        let dirty: Vec<LearnerId> = buffer.dirty.iter().copied().collect();
        for learner in dirty {
            let Some(journal) = buffer.journals.get(&learner) else {
                buffer.dirty.remove(&learner);
                continue;
            };
            let json = journal.to_json_filtered(|course, _| journal.course_has_positive_entry(course))?;
            let scope = MetaScope::Learner(learner);
            if json == "{}" {
                self.meta.delete(scope, keys::PROVIDER_JOURNAL)?;
            } else {
                self.meta.set(scope, keys::PROVIDER_JOURNAL, &json)?;
            }
            buffer.dirty.remove(&learner);
        }
        buffer.journals.clear();
        Ok(())
    }

    /// Drop a learner's buffered journal without writing it.
    pub fn forget(&self, learner: LearnerId) {
        let mut buffer = self.lock();
        buffer.journals.remove(&learner);
        buffer.dirty.remove(&learner);
    }
}
