use anyhow::bail;
use enrol_core::jobs::{CourseJobState, LearnerJobState};
use enrol_core::journal::LearnerJournal;
use enrol_core::results::ProviderResultSet;
use enrol_core::state::ProviderState;
use schemars::schema_for;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::SchemaArgs;
use crate::output::output;

/// Handle `enrolctl schema`.
pub fn handle(args: &SchemaArgs, flags: &GlobalFlags) -> anyhow::Result<()> {
    let schema = match args.type_name.as_str() {
        "results" => schema_for!(ProviderResultSet),
        "state" => schema_for!(ProviderState),
        "journal" => schema_for!(LearnerJournal),
        "learner-job" => schema_for!(LearnerJobState),
        "course-job" => schema_for!(CourseJobState),
        other => bail!(
            "unknown record type '{other}' (expected results, state, journal, learner-job or course-job)"
        ),
    };
    output(&schema, flags.format)
}
