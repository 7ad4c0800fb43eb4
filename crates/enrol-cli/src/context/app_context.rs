use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use enrol_config::EnrolConfig;
use enrol_engine::store::{Collaborators, FileSite};
use enrol_engine::{EnrolmentManager, ProviderRegistry};

/// Site document and the engine running over it.
pub struct AppContext {
    pub site: Arc<FileSite>,
    pub manager: EnrolmentManager,
}

impl AppContext {
    /// Open (or start) the site document at `path`.
    pub fn open(path: &Path, config: EnrolConfig) -> anyhow::Result<Self> {
        let site = Arc::new(
            FileSite::open(path)
                .with_context(|| format!("failed to read site document {}", path.display()))?,
        );
        let manager = EnrolmentManager::new(
            ProviderRegistry::with_defaults(),
            Collaborators::from_backend(&site),
            config,
        );
        Ok(Self { site, manager })
    }
}
