//! # enrol-core
//!
//! Core types shared by every enrolment crate.
//!
//! This crate is pure data: nothing here touches storage. It provides:
//! - Learner and course identifiers
//! - Course publish state and job status enums
//! - Persisted record types with their historical JSON shapes
//!   (`ProviderResultSet`, `ProviderState`, `ProviderStateStore`, journals)
//! - Persisted job state records for background recalculation
//! - A millisecond clock abstraction
//! - Cross-cutting error types

pub mod enums;
pub mod errors;
pub mod ids;
pub mod jobs;
pub mod journal;
pub mod results;
pub mod state;
pub mod time;

pub use errors::CoreError;
pub use ids::{CourseId, LearnerId};
