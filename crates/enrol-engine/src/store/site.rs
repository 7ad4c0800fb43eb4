//! Single-document backend implementing every collaborator contract.
//!
//! The whole site (meta, courses, learners, associations, scheduled jobs) is
//! one serde document behind a mutex. [`Volatile`] keeps it in memory;
//! [`JsonFile`] writes it through to disk after every mutation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use enrol_core::enums::PublishState;
use enrol_core::{CourseId, LearnerId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{
    CourseDirectory, JobOutcome, JobRunner, JobScheduler, LearnerAssociations, LearnerDirectory,
    MetaScope, MetaStore,
};
use crate::error::StoreError;

type Meta = BTreeMap<String, String>;

/// Everything a site knows, as one serializable document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteDocument {
    #[serde(default)]
    pub site_meta: Meta,
    #[serde(default)]
    pub course_meta: BTreeMap<CourseId, Meta>,
    #[serde(default)]
    pub learner_meta: BTreeMap<LearnerId, Meta>,
    #[serde(default)]
    pub courses: BTreeMap<CourseId, PublishState>,
    #[serde(default)]
    pub learners: BTreeSet<LearnerId>,
    #[serde(default)]
    pub site_owner: Option<LearnerId>,
    #[serde(default)]
    pub associations: BTreeSet<(LearnerId, CourseId)>,
    #[serde(default)]
    pub jobs: IndexMap<String, serde_json::Value>,
}

impl SiteDocument {
    fn meta(&self, scope: MetaScope) -> Option<&Meta> {
        match scope {
            MetaScope::Site => Some(&self.site_meta),
            MetaScope::Course(course) => self.course_meta.get(&course),
            MetaScope::Learner(learner) => self.learner_meta.get(&learner),
        }
    }

    fn meta_mut(&mut self, scope: MetaScope) -> &mut Meta {
        match scope {
            MetaScope::Site => &mut self.site_meta,
            MetaScope::Course(course) => self.course_meta.entry(course).or_default(),
            MetaScope::Learner(learner) => self.learner_meta.entry(learner).or_default(),
        }
    }
}

/// Where a [`Site`] writes its document after a mutation.
pub trait Persistence: Send + Sync {
    fn save(&self, doc: &SiteDocument) -> Result<(), StoreError>;
}

/// Keep the document in memory only.
#[derive(Debug, Default)]
pub struct Volatile;

impl Persistence for Volatile {
    fn save(&self, _doc: &SiteDocument) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Write the document to a JSON file, replacing it atomically.
#[derive(Debug)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persistence for JsonFile {
    fn save(&self, doc: &SiteDocument) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(doc)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// A whole site behind one lock.
pub struct Site<P: Persistence> {
    doc: Mutex<SiteDocument>,
    persistence: P,
}

/// In-memory site, used by tests and embedders that persist elsewhere.
pub type MemorySite = Site<Volatile>;

/// Site persisted to a JSON file.
pub type FileSite = Site<JsonFile>;

impl MemorySite {
    #[must_use]
    pub fn new() -> Self {
        Self::with_document(SiteDocument::default(), Volatile)
    }
}

impl Default for MemorySite {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSite {
    /// Open the document at `path`, starting empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let doc = if path.exists() {
            serde_json::from_slice(&std::fs::read(&path)?)?
        } else {
            SiteDocument::default()
        };
        Ok(Self::with_document(doc, JsonFile { path }))
    }
}

impl<P: Persistence> Site<P> {
    pub const fn with_document(doc: SiteDocument, persistence: P) -> Self {
        Self {
            doc: Mutex::new(doc),
            persistence,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SiteDocument> {
        self.doc.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<R>(&self, f: impl FnOnce(&SiteDocument) -> R) -> R {
        f(&self.lock())
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut SiteDocument) -> R) -> Result<R, StoreError> {
        let mut doc = self.lock();
        let result = f(&mut doc);
        self.persistence.save(&doc)?;
        Ok(result)
    }

    /// Copy of the current document.
    #[must_use]
    pub fn snapshot(&self) -> SiteDocument {
        self.lock().clone()
    }

    /// Create or update a course.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the document cannot be persisted.
    pub fn put_course(&self, course: CourseId, state: PublishState) -> Result<(), StoreError> {
        self.mutate(|doc| {
            doc.courses.insert(course, state);
        })
    }

    /// # Errors
    ///
    /// Returns `StoreError` if the document cannot be persisted.
    pub fn add_learner(&self, learner: LearnerId) -> Result<(), StoreError> {
        self.mutate(|doc| {
            doc.learners.insert(learner);
        })
    }

    /// # Errors
    ///
    /// Returns `StoreError` if the document cannot be persisted.
    pub fn set_site_owner(&self, learner: LearnerId) -> Result<(), StoreError> {
        self.mutate(|doc| {
            doc.learners.insert(learner);
            doc.site_owner = Some(learner);
        })
    }

    #[must_use]
    pub fn courses(&self) -> Vec<(CourseId, PublishState)> {
        self.read(|doc| doc.courses.iter().map(|(id, state)| (*id, *state)).collect())
    }

    /// Names of the currently scheduled jobs.
    #[must_use]
    pub fn scheduled_jobs(&self) -> Vec<String> {
        self.read(|doc| doc.jobs.keys().cloned().collect())
    }
}

impl<P: Persistence> MetaStore for Site<P> {
    fn get(&self, scope: MetaScope, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read(|doc| doc.meta(scope).and_then(|meta| meta.get(key).cloned())))
    }

    fn set(&self, scope: MetaScope, key: &str, value: &str) -> Result<(), StoreError> {
        self.mutate(|doc| {
            doc.meta_mut(scope).insert(key.to_string(), value.to_string());
        })
    }

    fn delete(&self, scope: MetaScope, key: &str) -> Result<(), StoreError> {
        self.mutate(|doc| {
            doc.meta_mut(scope).remove(key);
        })
    }

    fn learners_with_key(&self, key: &str) -> Result<Vec<(LearnerId, String)>, StoreError> {
        Ok(self.read(|doc| {
            doc.learner_meta
                .iter()
                .filter_map(|(learner, meta)| Some((*learner, meta.get(key)?.clone())))
                .collect()
        }))
    }

    fn learner_keys(&self, learner: LearnerId, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.read(|doc| {
            doc.learner_meta
                .get(&learner)
                .map(|meta| {
                    meta.keys()
                        .filter(|key| key.starts_with(prefix))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        }))
    }
}

impl<P: Persistence> CourseDirectory for Site<P> {
    fn get_course_publish_state(
        &self,
        course: CourseId,
    ) -> Result<Option<PublishState>, StoreError> {
        Ok(self.read(|doc| doc.courses.get(&course).copied()))
    }
}

impl<P: Persistence> LearnerDirectory for Site<P> {
    fn learner_ids(&self) -> Result<Vec<LearnerId>, StoreError> {
        Ok(self.read(|doc| doc.learners.iter().copied().collect()))
    }

    fn site_owner(&self) -> Result<Option<LearnerId>, StoreError> {
        Ok(self.read(|doc| doc.site_owner))
    }
}

impl<P: Persistence> LearnerAssociations for Site<P> {
    fn add_association(&self, learner: LearnerId, course: CourseId) -> Result<(), StoreError> {
        self.mutate(|doc| {
            doc.associations.insert((learner, course));
        })
    }

    fn remove_association(&self, learner: LearnerId, course: CourseId) -> Result<(), StoreError> {
        self.mutate(|doc| {
            doc.associations.remove(&(learner, course));
        })
    }

    fn has_association(&self, learner: LearnerId, course: CourseId) -> Result<bool, StoreError> {
        Ok(self.read(|doc| doc.associations.contains(&(learner, course))))
    }

    fn associated_courses(&self, learner: LearnerId) -> Result<Vec<CourseId>, StoreError> {
        Ok(self.read(|doc| {
            doc.associations
                .iter()
                .filter(|(l, _)| *l == learner)
                .map(|(_, course)| *course)
                .collect()
        }))
    }
}

impl<P: Persistence> JobScheduler for Site<P> {
    fn schedule_recurring(
        &self,
        job_name: &str,
        args: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.mutate(|doc| {
            doc.jobs.insert(job_name.to_string(), args);
        })
    }

    fn cancel(&self, job_name: &str) -> Result<(), StoreError> {
        self.mutate(|doc| {
            doc.jobs.shift_remove(job_name);
        })
    }

    fn is_scheduled(&self, job_name: &str) -> Result<bool, StoreError> {
        Ok(self.read(|doc| doc.jobs.contains_key(job_name)))
    }

    fn run_due_jobs(&self, runner: &dyn JobRunner) -> Result<usize, StoreError> {
        // Runners schedule and cancel through this same site, so the lock
        // must not be held while they run.
        let due: Vec<(String, serde_json::Value)> = self.read(|doc| {
            doc.jobs
                .iter()
                .map(|(name, args)| (name.clone(), args.clone()))
                .collect()
        });

        for (name, args) in &due {
            match runner.run_job(name, args) {
                JobOutcome::Complete => self.cancel(name)?,
                JobOutcome::Pending => {}
                JobOutcome::Failed(reason) => {
                    tracing::warn!(job = %name, %reason, "job tick failed; retrying next tick");
                }
            }
        }
        Ok(due.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn learner(id: u64) -> LearnerId {
        LearnerId::new(id).unwrap()
    }

    fn course(id: u64) -> CourseId {
        CourseId::new(id).unwrap()
    }

    #[test]
    fn meta_is_scoped() {
        let site = MemorySite::new();
        site.set(MetaScope::Learner(learner(1)), "k", "one").unwrap();
        site.set(MetaScope::Course(course(1)), "k", "course").unwrap();

        assert_eq!(
            site.get(MetaScope::Learner(learner(1)), "k").unwrap().as_deref(),
            Some("one")
        );
        assert_eq!(site.get(MetaScope::Learner(learner(2)), "k").unwrap(), None);
        assert_eq!(
            site.get(MetaScope::Course(course(1)), "k").unwrap().as_deref(),
            Some("course")
        );

        site.delete(MetaScope::Learner(learner(1)), "k").unwrap();
        assert_eq!(site.get(MetaScope::Learner(learner(1)), "k").unwrap(), None);
    }

    #[test]
    fn key_queries() {
        let site = MemorySite::new();
        site.set(MetaScope::Learner(learner(2)), "enrol_results_5", "x").unwrap();
        site.set(MetaScope::Learner(learner(1)), "enrol_results_5", "").unwrap();
        site.set(MetaScope::Learner(learner(1)), "enrol_results_6", "y").unwrap();

        let holders = site.learners_with_key("enrol_results_5").unwrap();
        assert_eq!(
            holders,
            vec![(learner(1), String::new()), (learner(2), "x".to_string())]
        );
        assert_eq!(
            site.learner_keys(learner(1), "enrol_results_").unwrap(),
            vec!["enrol_results_5".to_string(), "enrol_results_6".to_string()]
        );
    }

    struct Recorder {
        seen: RefCell<Vec<String>>,
        outcome: JobOutcome,
    }

    impl JobRunner for Recorder {
        fn run_job(&self, job_name: &str, _args: &serde_json::Value) -> JobOutcome {
            self.seen.borrow_mut().push(job_name.to_string());
            self.outcome.clone()
        }
    }

    #[test]
    fn scheduling_is_idempotent_per_name() {
        let site = MemorySite::new();
        site.schedule_recurring("a", serde_json::json!({"n": 1})).unwrap();
        site.schedule_recurring("a", serde_json::json!({"n": 2})).unwrap();
        assert_eq!(site.scheduled_jobs(), vec!["a".to_string()]);
    }

    #[test]
    fn completed_jobs_are_dropped() {
        let site = MemorySite::new();
        site.schedule_recurring("a", serde_json::Value::Null).unwrap();
        site.schedule_recurring("b", serde_json::Value::Null).unwrap();

        let pending = Recorder {
            seen: RefCell::new(Vec::new()),
            outcome: JobOutcome::Pending,
        };
        assert_eq!(site.run_due_jobs(&pending).unwrap(), 2);
        assert_eq!(*pending.seen.borrow(), vec!["a", "b"]);
        assert!(site.is_scheduled("a").unwrap());

        let done = Recorder {
            seen: RefCell::new(Vec::new()),
            outcome: JobOutcome::Complete,
        };
        site.run_due_jobs(&done).unwrap();
        assert!(site.scheduled_jobs().is_empty());
    }

    #[test]
    fn failed_jobs_stay_scheduled() {
        let site = MemorySite::new();
        site.schedule_recurring("a", serde_json::Value::Null).unwrap();
        let failing = Recorder {
            seen: RefCell::new(Vec::new()),
            outcome: JobOutcome::Failed("boom".into()),
        };
        site.run_due_jobs(&failing).unwrap();
        assert!(site.is_scheduled("a").unwrap());
    }

    #[test]
    fn file_site_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.json");

        let site = FileSite::open(&path).unwrap();
        site.put_course(course(3), PublishState::Published).unwrap();
        site.add_learner(learner(9)).unwrap();
        site.add_association(learner(9), course(3)).unwrap();
        site.set(MetaScope::Site, "enrol_site_salt", "abc").unwrap();

        let reopened = FileSite::open(&path).unwrap();
        assert_eq!(reopened.snapshot(), site.snapshot());
        assert!(reopened.has_association(learner(9), course(3)).unwrap());
    }
}
