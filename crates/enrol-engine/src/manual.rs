//! Built-in manual enrolment provider.
//!
//! Handles every course. A learner is enrolled iff an admin (or a
//! self-service signup) explicitly enrolled them and nobody withdrew them
//! since.

use enrol_core::state::ProviderState;
use enrol_core::{CourseId, LearnerId};
use serde_json::Value;

use crate::error::ProviderError;
use crate::provider::{EnrolmentProvider, ProviderContext};

pub const MANUAL_PROVIDER_ID: &str = "manual";

const ENROLLED_KEY: &str = "enrolled";

#[derive(Debug, Clone, Copy, Default)]
pub struct ManualEnrolmentProvider;

impl ManualEnrolmentProvider {
    fn stored_status(state: &ProviderState) -> bool {
        state
            .get_stored_value(ENROLLED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl EnrolmentProvider for ManualEnrolmentProvider {
    fn id(&self) -> &str {
        MANUAL_PROVIDER_ID
    }

    fn name(&self) -> &str {
        "Manual"
    }

    fn handles(&self, _course: CourseId) -> Result<bool, ProviderError> {
        Ok(true)
    }

    fn is_enrolled(
        &self,
        ctx: &mut ProviderContext<'_>,
        _learner: LearnerId,
        _course: CourseId,
    ) -> Result<bool, ProviderError> {
        Ok(Self::stored_status(ctx.state()))
    }

    fn debug(&self, state: &ProviderState, _learner: LearnerId, _course: CourseId) -> Vec<String> {
        if Self::stored_status(state) {
            vec!["Learner was enrolled manually.".to_string()]
        } else {
            vec!["Learner has no manual enrolment.".to_string()]
        }
    }

    fn enrol(
        &self,
        ctx: &mut ProviderContext<'_>,
        _learner: LearnerId,
        _course: CourseId,
    ) -> Result<bool, ProviderError> {
        if !Self::stored_status(ctx.state()) {
            ctx.set_stored_value(ENROLLED_KEY, Value::Bool(true));
            ctx.log("Learner enrolled manually");
        }
        Ok(true)
    }

    fn withdraw(
        &self,
        ctx: &mut ProviderContext<'_>,
        _learner: LearnerId,
        _course: CourseId,
    ) -> Result<bool, ProviderError> {
        if Self::stored_status(ctx.state()) {
            ctx.set_stored_value(ENROLLED_KEY, Value::Bool(false));
            ctx.log("Learner withdrawn manually");
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (LearnerId, CourseId) {
        (LearnerId::new(1).unwrap(), CourseId::new(2).unwrap())
    }

    #[test]
    fn enrol_then_withdraw() {
        let (learner, course) = ids();
        let provider = ManualEnrolmentProvider;
        let mut state = ProviderState::new(30);

        let mut ctx = ProviderContext::new(&mut state, 10);
        assert!(!provider.is_enrolled(&mut ctx, learner, course).unwrap());
        assert!(provider.enrol(&mut ctx, learner, course).unwrap());
        assert!(provider.is_enrolled(&mut ctx, learner, course).unwrap());
        assert!(provider.withdraw(&mut ctx, learner, course).unwrap());
        assert!(!provider.is_enrolled(&mut ctx, learner, course).unwrap());

        let messages: Vec<_> = state.get_logs().iter().map(|(_, m)| m.as_str()).collect();
        assert_eq!(
            messages,
            vec!["Learner enrolled manually", "Learner withdrawn manually"]
        );
    }

    #[test]
    fn repeated_enrol_logs_once() {
        let (learner, course) = ids();
        let mut state = ProviderState::new(30);
        let mut ctx = ProviderContext::new(&mut state, 10);
        ManualEnrolmentProvider.enrol(&mut ctx, learner, course).unwrap();
        ManualEnrolmentProvider.enrol(&mut ctx, learner, course).unwrap();
        assert_eq!(state.get_logs().len(), 1);
    }
}
