use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;
use crate::context::AppContext;

/// Dispatch a parsed command to the corresponding handler module.
pub fn dispatch(command: Commands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match command {
        Commands::Course { action } => commands::course::handle(&action, ctx, flags),
        Commands::Learner { action } => commands::learner::handle(&action, ctx, flags),
        Commands::Status(args) => commands::enrolment::status(&args, ctx, flags),
        Commands::Enrol(args) => commands::enrolment::enrol(&args, ctx, flags),
        Commands::Withdraw(args) => commands::enrolment::withdraw(&args, ctx, flags),
        Commands::Remove(args) => commands::enrolment::remove(&args, ctx, flags),
        Commands::Restore(args) => commands::enrolment::restore(&args, ctx, flags),
        Commands::Enrolled(args) => commands::enrolment::enrolled(&args, ctx, flags),
        Commands::Recalculate(args) => commands::enrolment::recalculate(&args, ctx, flags),
        Commands::History(args) => commands::audit::history(&args, ctx, flags),
        Commands::Snapshot(args) => commands::audit::snapshot(&args, ctx, flags),
        Commands::Debug(args) => commands::audit::debug(&args, ctx, flags),
        Commands::Version => commands::jobs::version(ctx, flags),
        Commands::Tick => commands::jobs::tick(ctx, flags),
        Commands::Worker(_) | Commands::Schema(_) => {
            unreachable!("worker/schema are pre-dispatched in main")
        }
    }
}
