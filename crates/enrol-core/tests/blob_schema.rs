//! Persisted blob shapes validated against their generated JSON Schemas.

use indexmap::IndexMap;
use schemars::schema_for;
use serde::Serialize;
use serde_json::json;

use enrol_core::CourseId;
use enrol_core::enums::JobStatus;
use enrol_core::jobs::{CourseJobState, LearnerJobState};
use enrol_core::journal::LearnerJournal;
use enrol_core::results::ProviderResultSet;
use enrol_core::state::ProviderState;

/// Validate a JSON value against a schemars-generated schema.
fn validate_against_schema(
    schema: &serde_json::Value,
    instance: &serde_json::Value,
) -> Vec<String> {
    let validator = jsonschema::validator_for(schema).expect("schema should be valid");
    validator
        .iter_errors(instance)
        .map(|e| format!("{e}"))
        .collect()
}

fn assert_matches_schema<T: Serialize>(schema: &serde_json::Value, value: &T, name: &str) {
    let instance = serde_json::to_value(value).unwrap();
    let errors = validate_against_schema(schema, &instance);
    assert!(errors.is_empty(), "Schema validation failed for {name}: {errors:?}");
}

macro_rules! validate_blob {
    ($name:ident, $ty:ty, $instance:expr) => {
        #[test]
        fn $name() {
            let val: $ty = $instance;
            let schema = serde_json::to_value(schema_for!($ty)).unwrap();
            assert_matches_schema(&schema, &val, stringify!($ty));
        }
    };
}

validate_blob!(
    result_set_matches_schema,
    ProviderResultSet,
    {
        let mut results = IndexMap::new();
        results.insert("manual".to_string(), true);
        results.insert("membership".to_string(), false);
        ProviderResultSet::new(results, 1_760_000_000_000, "abc123".into())
    }
);

validate_blob!(
    provider_state_matches_schema,
    ProviderState,
    {
        let mut state = ProviderState::new(30);
        state.set_stored_value("enrolled", json!(true));
        state.set_stored_value("source", json!({"order": 991}));
        state.add_log_message(1_760_000_000_000, "Enrolled manually");
        state
    }
);

validate_blob!(
    learner_journal_matches_schema,
    LearnerJournal,
    {
        let mut journal = LearnerJournal::default();
        let course = CourseId::new(12).unwrap();
        let provider = journal.provider_mut(course, "manual");
        provider.record_status(1, Some(true), 30);
        provider.record_status(2, None, 30);
        provider.add_log(2, "Provider removed", 30);
        journal
    }
);

validate_blob!(
    learner_job_state_matches_schema,
    LearnerJobState,
    LearnerJobState {
        status: JobStatus::Running,
        version: Some("v".into()),
        batch: 2,
    }
);

validate_blob!(
    course_job_state_matches_schema,
    CourseJobState,
    CourseJobState::new(CourseId::new(3).unwrap(), true)
);

#[test]
fn historical_state_blob_parses() {
    // Shape written by earlier releases.
    let blob = r#"{"d":{"legacy_migrated":true},"l":[[1700000000000,"Migrated from legacy enrolment"]]}"#;
    let state = ProviderState::from_json(blob, 30);
    assert_eq!(state.get_stored_value("legacy_migrated"), Some(&json!(true)));
    assert_eq!(state.get_logs().len(), 1);
    assert_eq!(state.to_json().unwrap(), blob);
}
