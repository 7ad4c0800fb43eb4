//! Ordered registry of enrolment providers.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::manual::ManualEnrolmentProvider;
use crate::provider::EnrolmentProvider;
use crate::salt;

/// Bumped by hand whenever the combination algorithm itself changes.
pub const ALGORITHM_VERSION: &str = "enrol-calculation-3";

/// Providers keyed by id, in registration order.
///
/// Built once at startup with explicit [`ProviderRegistry::register`] calls,
/// then handed to the engine.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: IndexMap<String, Arc<dyn EnrolmentProvider>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.providers.keys()).finish()
    }
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding only the built-in manual provider.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ManualEnrolmentProvider);
        registry
    }

    /// Add a provider. A provider with an id already registered replaces the
    /// earlier one in its original position.
    pub fn register(&mut self, provider: impl EnrolmentProvider + 'static) {
        self.register_shared(Arc::new(provider));
    }

    pub fn register_shared(&mut self, provider: Arc<dyn EnrolmentProvider>) {
        let id = provider.id().to_string();
        if self.providers.insert(id.clone(), provider).is_some() {
            tracing::debug!(provider = %id, "replaced registered enrolment provider");
        }
    }

    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<Arc<dyn EnrolmentProvider>> {
        self.providers.get(id).cloned()
    }

    /// Every provider in registration order.
    pub fn get_all(&self) -> impl Iterator<Item = &Arc<dyn EnrolmentProvider>> {
        self.providers.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Fingerprint of the algorithm constant and every registered provider's
    /// `id:version`, in registration order.
    #[must_use]
    pub fn calculation_version(&self) -> String {
        let parts: Vec<String> = self
            .providers
            .values()
            .map(|p| format!("{}:{}", p.id(), p.version()))
            .collect();
        salt::fingerprint(std::iter::once(ALGORITHM_VERSION).chain(parts.iter().map(String::as_str)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::ProviderContext;
    use enrol_core::{CourseId, LearnerId};

    struct Fixed {
        id: &'static str,
        version: u32,
        answer: bool,
    }

    impl EnrolmentProvider for Fixed {
        fn id(&self) -> &str {
            self.id
        }

        fn version(&self) -> u32 {
            self.version
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
            Ok(self.answer)
        }
    }

    fn fixed(id: &'static str, version: u32) -> Fixed {
        Fixed {
            id,
            version,
            answer: true,
        }
    }

    #[test]
    fn lookup_by_id() {
        let registry = ProviderRegistry::with_defaults();
        assert!(registry.get_by_id("manual").is_some());
        assert!(registry.get_by_id("membership").is_none());
    }

    #[test]
    fn duplicates_overwrite_in_place() {
        let mut registry = ProviderRegistry::new();
        registry.register(fixed("a", 1));
        registry.register(fixed("b", 1));
        registry.register(fixed("a", 2));

        let ids: Vec<_> = registry.get_all().map(|p| p.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(registry.get_by_id("a").map(|p| p.version()), Some(2));
    }

    #[test]
    fn calculation_version_tracks_provider_set() {
        let mut registry = ProviderRegistry::with_defaults();
        let base = registry.calculation_version();
        assert_eq!(base, ProviderRegistry::with_defaults().calculation_version());

        registry.register(fixed("membership", 1));
        let with_membership = registry.calculation_version();
        assert_ne!(base, with_membership);

        registry.register(fixed("membership", 2));
        assert_ne!(with_membership, registry.calculation_version());
    }
}
