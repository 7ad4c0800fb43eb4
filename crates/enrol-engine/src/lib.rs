//! # enrol-engine
//!
//! Decides whether a learner is enrolled in a course by consulting every
//! registered [`EnrolmentProvider`], caches the combined answer per
//! (learner, course), journals status transitions, and reconciles cached
//! results in the background when providers or salts change.
//!
//! Storage, course content, learner listing, association tagging and job
//! scheduling are collaborators described in [`store`]; [`store::MemorySite`]
//! and [`store::FileSite`] implement all of them.
//!
//! ```
//! use std::sync::Arc;
//!
//! use enrol_config::EnrolConfig;
//! use enrol_core::enums::PublishState;
//! use enrol_core::{CourseId, LearnerId};
//! use enrol_engine::store::{Collaborators, MemorySite};
//! use enrol_engine::{EnrolmentManager, ProviderRegistry};
//!
//! let site = Arc::new(MemorySite::new());
//! let course = CourseId::new(1).unwrap();
//! let learner = LearnerId::new(2).unwrap();
//! site.put_course(course, PublishState::Published).unwrap();
//!
//! let manager = EnrolmentManager::new(
//!     ProviderRegistry::with_defaults(),
//!     Collaborators::from_backend(&site),
//!     EnrolConfig::default(),
//! );
//! assert!(!manager.is_enrolled(learner, course, true).unwrap());
//! manager.enrol(learner, course).unwrap();
//! assert!(manager.is_enrolled(learner, course, true).unwrap());
//! ```

pub mod course;
pub mod error;
pub mod jobs;
pub mod journal;
pub mod keys;
pub mod manager;
pub mod manual;
pub mod provider;
pub mod registry;
mod salt;
pub mod store;

pub use course::{CourseEnrolment, ProviderDebug};
pub use error::{EngineError, ProviderError, StoreError};
pub use jobs::JobHandle;
pub use manager::{DebugReport, EnrolmentManager};
pub use manual::{MANUAL_PROVIDER_ID, ManualEnrolmentProvider};
pub use provider::{EnrolmentProvider, ProviderContext};
pub use registry::ProviderRegistry;
