use enrol_core::enums::PublishState;
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::CourseCommands;
use crate::context::AppContext;
use crate::output::output;

#[derive(Serialize)]
struct CourseRow {
    id: u64,
    state: PublishState,
}

/// Handle `enrolctl course`.
pub fn handle(action: &CourseCommands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let (id, state) = match action {
        CourseCommands::Add { id, draft } => {
            let state = if *draft {
                PublishState::Draft
            } else {
                PublishState::Published
            };
            (*id, state)
        }
        CourseCommands::Publish { id } => (*id, PublishState::Published),
        CourseCommands::Draft { id } => (*id, PublishState::Draft),
        CourseCommands::List => {
            let rows: Vec<CourseRow> = ctx
                .site
                .courses()
                .into_iter()
                .map(|(id, state)| CourseRow { id: id.get(), state })
                .collect();
            return output(&rows, flags.format);
        }
    };

    ctx.site.put_course(id, state)?;
    output(&CourseRow { id: id.get(), state }, flags.format)
}
