#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use enrol_config::EnrolConfig;
use enrol_core::enums::PublishState;
use enrol_core::time::ManualClock;
use enrol_core::{CourseId, LearnerId};
use enrol_engine::store::{Collaborators, MemorySite, MetaScope, MetaStore};
use enrol_engine::{
    EnrolmentManager, EnrolmentProvider, ProviderContext, ProviderError, ProviderRegistry,
    StoreError,
};

pub const START: i64 = 1_760_000_000_000;

pub fn learner(id: u64) -> LearnerId {
    LearnerId::new(id).unwrap()
}

pub fn course(id: u64) -> CourseId {
    CourseId::new(id).unwrap()
}

/// Provider whose answer tests flip at will. Counts `is_enrolled` calls.
pub struct Toggle {
    id: &'static str,
    answer: AtomicBool,
    handles: AtomicBool,
    undecided: AtomicBool,
    calls: AtomicUsize,
}

impl Toggle {
    pub fn new(id: &'static str, answer: bool) -> Arc<Self> {
        Arc::new(Self {
            id,
            answer: AtomicBool::new(answer),
            handles: AtomicBool::new(true),
            undecided: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, answer: bool) {
        self.answer.store(answer, Ordering::SeqCst);
    }

    pub fn set_handles(&self, handles: bool) {
        self.handles.store(handles, Ordering::SeqCst);
    }

    /// Make `handles` fail until reset.
    pub fn set_undecided(&self, undecided: bool) {
        self.undecided.store(undecided, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EnrolmentProvider for Toggle {
    fn id(&self) -> &str {
        self.id
    }

    fn handles(&self, _course: CourseId) -> Result<bool, ProviderError> {
        if self.undecided.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("catalogue lookup timed out".into()));
        }
        Ok(self.handles.load(Ordering::SeqCst))
    }

    fn is_enrolled(
        &self,
        ctx: &mut ProviderContext<'_>,
        _learner: LearnerId,
        _course: CourseId,
    ) -> Result<bool, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answer.load(Ordering::SeqCst);
        ctx.set_stored_value("last", serde_json::Value::Bool(answer));
        Ok(answer)
    }
}

/// Provider that always fails.
pub struct Broken;

impl EnrolmentProvider for Broken {
    fn id(&self) -> &str {
        "broken"
    }

    fn handles(&self, _course: CourseId) -> Result<bool, ProviderError> {
        Ok(true)
    }

    fn is_enrolled(
        &self,
        _ctx: &mut ProviderContext<'_>,
        _learner: LearnerId,
        _course: CourseId,
    ) -> Result<bool, ProviderError> {
        Err(ProviderError::Unavailable("entitlement service down".into()))
    }
}

/// Meta store that can be told to fail writes of one key.
pub struct Flaky {
    inner: Arc<MemorySite>,
    failing_key: std::sync::Mutex<Option<String>>,
}

impl Flaky {
    pub fn new(inner: Arc<MemorySite>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failing_key: std::sync::Mutex::new(None),
        })
    }

    pub fn fail_writes_of(&self, key: Option<&str>) {
        *self.failing_key.lock().unwrap() = key.map(str::to_string);
    }
}

impl MetaStore for Flaky {
    fn get(&self, scope: MetaScope, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(scope, key)
    }

    fn set(&self, scope: MetaScope, key: &str, value: &str) -> Result<(), StoreError> {
        if self.failing_key.lock().unwrap().as_deref() == Some(key) {
            return Err(StoreError::Backend(format!("write of {key} refused")));
        }
        self.inner.set(scope, key, value)
    }

    fn delete(&self, scope: MetaScope, key: &str) -> Result<(), StoreError> {
        self.inner.delete(scope, key)
    }

    fn learners_with_key(&self, key: &str) -> Result<Vec<(LearnerId, String)>, StoreError> {
        self.inner.learners_with_key(key)
    }

    fn learner_keys(&self, learner: LearnerId, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.learner_keys(learner, prefix)
    }
}

pub struct Harness {
    pub site: Arc<MemorySite>,
    pub clock: Arc<ManualClock>,
    pub manager: EnrolmentManager,
}

impl Harness {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self::with_config(registry, EnrolConfig::default())
    }

    pub fn with_config(registry: ProviderRegistry, config: EnrolConfig) -> Self {
        let site = Arc::new(MemorySite::new());
        let deps = Collaborators::from_backend(&site);
        Self::from_parts(site, deps, registry, config)
    }

    pub fn from_parts(
        site: Arc<MemorySite>,
        deps: Collaborators,
        registry: ProviderRegistry,
        config: EnrolConfig,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let manager = EnrolmentManager::with_clock(registry, deps, config, clock.clone());
        Self {
            site,
            clock,
            manager,
        }
    }

    pub fn journaled(registry: ProviderRegistry) -> Self {
        let mut config = EnrolConfig::default();
        config.journal.enabled = true;
        Self::with_config(registry, config)
    }

    pub fn published(&self, id: u64) -> CourseId {
        let course = course(id);
        self.site.put_course(course, PublishState::Published).unwrap();
        course
    }

    pub fn learners(&self, ids: impl IntoIterator<Item = u64>) -> Vec<LearnerId> {
        ids.into_iter()
            .map(|id| {
                let learner = learner(id);
                self.site.add_learner(learner).unwrap();
                learner
            })
            .collect()
    }

    pub fn result_blob(&self, learner: LearnerId, course: CourseId) -> Option<String> {
        self.site
            .get(
                MetaScope::Learner(learner),
                &enrol_engine::keys::results(course),
            )
            .unwrap()
    }
}

pub fn registry_with(providers: &[Arc<Toggle>]) -> ProviderRegistry {
    let mut registry = ProviderRegistry::with_defaults();
    for provider in providers {
        registry.register_shared(provider.clone());
    }
    registry
}
