use enrol_engine::store::LearnerDirectory;
use serde_json::json;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::LearnerCommands;
use crate::context::AppContext;
use crate::output::output;

/// Handle `enrolctl learner`.
pub fn handle(action: &LearnerCommands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match action {
        LearnerCommands::Add { id, owner } => {
            if *owner {
                ctx.site.set_site_owner(*id)?;
            } else {
                ctx.site.add_learner(*id)?;
            }
            output(&json!({"id": id, "owner": owner}), flags.format)
        }
        LearnerCommands::List => {
            let owner = ctx.site.site_owner()?;
            let learners = ctx.site.learner_ids()?;
            output(&json!({"owner": owner, "learners": learners}), flags.format)
        }
    }
}
