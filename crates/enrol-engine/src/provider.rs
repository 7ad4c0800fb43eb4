//! The pluggable enrolment provider contract.
//!
//! A provider is a unit of business logic with its own opinion on whether a
//! learner is enrolled in a course. Providers hold no state of their own;
//! anything they need to remember between evaluations goes through the
//! [`ProviderContext`] handed to them, which is scoped to their id and the
//! (learner, course) pair being evaluated.

use enrol_core::state::ProviderState;
use enrol_core::{CourseId, LearnerId};
use serde_json::Value;

use crate::error::ProviderError;

/// Working state handed to a provider for one (learner, course).
pub struct ProviderContext<'a> {
    state: &'a mut ProviderState,
    now: i64,
}

impl<'a> ProviderContext<'a> {
    pub const fn new(state: &'a mut ProviderState, now: i64) -> Self {
        Self { state, now }
    }

    #[must_use]
    pub const fn state(&self) -> &ProviderState {
        self.state
    }

    pub const fn state_mut(&mut self) -> &mut ProviderState {
        self.state
    }

    /// Evaluation time in epoch milliseconds.
    #[must_use]
    pub const fn now(&self) -> i64 {
        self.now
    }

    #[must_use]
    pub fn stored_value(&self, key: &str) -> Option<&Value> {
        self.state.get_stored_value(key)
    }

    pub fn set_stored_value(&mut self, key: &str, value: Value) {
        self.state.set_stored_value(key, value);
    }

    /// Append a log line stamped with the evaluation time.
    pub fn log(&mut self, message: impl Into<String>) {
        self.state.add_log_message(self.now, message);
    }
}

/// A source of enrolment opinion.
pub trait EnrolmentProvider: Send + Sync {
    /// Stable identifier; also the namespace of the provider's state.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str {
        self.id()
    }

    /// Bump when the provider's algorithm changes. Feeds the calculation
    /// version, so a bump triggers background recalculation.
    fn version(&self) -> u32 {
        1
    }

    /// Whether this provider has an opinion on `course` at all.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the provider cannot decide; the provider is
    /// then skipped for that round.
    fn handles(&self, course: CourseId) -> Result<bool, ProviderError>;

    /// Whether this provider grants `learner` enrolment in `course`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` on failure; the round records `false` for this
    /// provider and carries on with the others.
    fn is_enrolled(
        &self,
        ctx: &mut ProviderContext<'_>,
        learner: LearnerId,
        course: CourseId,
    ) -> Result<bool, ProviderError>;

    /// Free-form diagnostic lines for admin tooling.
    fn debug(&self, _state: &ProviderState, _learner: LearnerId, _course: CourseId) -> Vec<String> {
        Vec::new()
    }

    /// Grant enrolment directly.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Unsupported` unless the provider implements it.
    fn enrol(
        &self,
        _ctx: &mut ProviderContext<'_>,
        _learner: LearnerId,
        _course: CourseId,
    ) -> Result<bool, ProviderError> {
        Err(ProviderError::Unsupported {
            provider: self.id().to_string(),
            operation: "enrol",
        })
    }

    /// Revoke directly granted enrolment.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Unsupported` unless the provider implements it.
    fn withdraw(
        &self,
        _ctx: &mut ProviderContext<'_>,
        _learner: LearnerId,
        _course: CourseId,
    ) -> Result<bool, ProviderError> {
        Err(ProviderError::Unsupported {
            provider: self.id().to_string(),
            operation: "withdraw",
        })
    }
}
