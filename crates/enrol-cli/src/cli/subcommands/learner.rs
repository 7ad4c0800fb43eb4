use clap::Subcommand;
use enrol_core::LearnerId;

/// Learner commands.
#[derive(Clone, Debug, Subcommand)]
pub enum LearnerCommands {
    /// Register a learner.
    Add {
        id: LearnerId,
        /// Make this learner the site owner.
        #[arg(long)]
        owner: bool,
    },
    /// List learners.
    List,
}
