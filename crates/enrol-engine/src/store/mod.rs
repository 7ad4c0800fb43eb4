//! Collaborator contracts consumed by the engine.
//!
//! The engine owns none of its storage. It talks to a per-entity key/value
//! store, a course content lookup, a learner directory, a learner↔course
//! association tag, and a cron-like scheduler. All calls are synchronous.
//!
//! [`Site`] implements every contract at once, either purely in memory
//! ([`MemorySite`]) or write-through to a JSON document ([`FileSite`]).

mod site;

pub use site::{FileSite, JsonFile, MemorySite, Persistence, Site, SiteDocument, Volatile};

use std::sync::Arc;

use enrol_core::enums::PublishState;
use enrol_core::{CourseId, LearnerId};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Which entity a meta key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetaScope {
    Site,
    Course(CourseId),
    Learner(LearnerId),
}

/// Durable per-entity key → string store.
///
/// Implementations must return a value written earlier in the same process.
pub trait MetaStore: Send + Sync {
    fn get(&self, scope: MetaScope, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, scope: MetaScope, key: &str, value: &str) -> Result<(), StoreError>;

    fn delete(&self, scope: MetaScope, key: &str) -> Result<(), StoreError>;

    /// Every learner holding `key`, with the stored value, ordered by learner id.
    fn learners_with_key(&self, key: &str) -> Result<Vec<(LearnerId, String)>, StoreError>;

    /// Keys stored for `learner` that start with `prefix`.
    fn learner_keys(&self, learner: LearnerId, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Course content lookup.
pub trait CourseDirectory: Send + Sync {
    /// Publish state of `course`, or `None` if the course does not exist.
    fn get_course_publish_state(
        &self,
        course: CourseId,
    ) -> Result<Option<PublishState>, StoreError>;
}

/// Enumerates learners for background recalculation.
pub trait LearnerDirectory: Send + Sync {
    /// Every learner on the site, ordered by id.
    fn learner_ids(&self) -> Result<Vec<LearnerId>, StoreError>;

    /// The site owner, reconciled ahead of everyone else.
    fn site_owner(&self) -> Result<Option<LearnerId>, StoreError>;
}

/// Tag-like learner ↔ course relation that makes "who is enrolled" queryable
/// without running providers.
pub trait LearnerAssociations: Send + Sync {
    fn add_association(&self, learner: LearnerId, course: CourseId) -> Result<(), StoreError>;

    fn remove_association(&self, learner: LearnerId, course: CourseId) -> Result<(), StoreError>;

    fn has_association(&self, learner: LearnerId, course: CourseId) -> Result<bool, StoreError>;

    fn associated_courses(&self, learner: LearnerId) -> Result<Vec<CourseId>, StoreError>;
}

/// Result of running one job tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// More work remains; keep the job scheduled.
    Pending,
    /// The job is done; drop it from the schedule.
    Complete,
    /// The tick failed; the job stays scheduled and retries next tick.
    Failed(String),
}

/// Something that knows how to run named jobs.
pub trait JobRunner {
    fn run_job(&self, job_name: &str, args: &serde_json::Value) -> JobOutcome;
}

/// Cron-like facility. The engine only schedules and cancels; whoever drives
/// the ticks calls [`JobScheduler::run_due_jobs`].
pub trait JobScheduler: Send + Sync {
    /// Schedule `job_name`. Scheduling a name that is already scheduled
    /// replaces its arguments rather than adding a second job.
    fn schedule_recurring(&self, job_name: &str, args: serde_json::Value)
    -> Result<(), StoreError>;

    fn cancel(&self, job_name: &str) -> Result<(), StoreError>;

    fn is_scheduled(&self, job_name: &str) -> Result<bool, StoreError>;

    /// Run one tick of every scheduled job and drop the completed ones.
    /// Returns how many jobs ran.
    fn run_due_jobs(&self, runner: &dyn JobRunner) -> Result<usize, StoreError>;
}

/// The full set of collaborators handed to the engine.
#[derive(Clone)]
pub struct Collaborators {
    pub meta: Arc<dyn MetaStore>,
    pub courses: Arc<dyn CourseDirectory>,
    pub learners: Arc<dyn LearnerDirectory>,
    pub associations: Arc<dyn LearnerAssociations>,
    pub scheduler: Arc<dyn JobScheduler>,
}

impl Collaborators {
    /// Use one backend for every contract.
    pub fn from_backend<B>(backend: &Arc<B>) -> Self
    where
        B: MetaStore
            + CourseDirectory
            + LearnerDirectory
            + LearnerAssociations
            + JobScheduler
            + 'static,
    {
        Self {
            meta: backend.clone(),
            courses: backend.clone(),
            learners: backend.clone(),
            associations: backend.clone(),
            scheduler: backend.clone(),
        }
    }
}
