use clap::{Args, Subcommand};
use enrol_core::{CourseId, LearnerId};

use crate::cli::subcommands::{CourseCommands, LearnerCommands};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Courses known to the site.
    Course {
        #[command(subcommand)]
        action: CourseCommands,
    },
    /// Learners known to the site.
    Learner {
        #[command(subcommand)]
        action: LearnerCommands,
    },
    /// Whether a learner is enrolled in a course.
    Status(StatusArgs),
    /// Enrol a learner manually.
    Enrol(PairArgs),
    /// Withdraw a manual enrolment.
    Withdraw(PairArgs),
    /// Exclude a learner from a course regardless of providers.
    Remove(PairArgs),
    /// Lift a removal.
    Restore(PairArgs),
    /// Learners with a current positive result for a course.
    Enrolled(CourseArgs),
    /// Invalidate a course's results and schedule recomputation.
    Recalculate(RecalculateArgs),
    /// Journaled status transitions of one provider.
    History(HistoryArgs),
    /// Journaled status of every provider at a point in time.
    Snapshot(SnapshotArgs),
    /// Live diagnostic view of one learner in one course.
    Debug(PairArgs),
    /// Calculation version and job states.
    Version,
    /// Run one tick of every scheduled job.
    Tick,
    /// Run ticks on an interval until interrupted.
    Worker(WorkerArgs),
    /// Print the JSON schema of a persisted record.
    Schema(SchemaArgs),
}

/// A (learner, course) pair.
#[derive(Clone, Debug, Args)]
pub struct PairArgs {
    pub learner: LearnerId,
    pub course: CourseId,
}

/// Arguments for `enrolctl status`.
#[derive(Clone, Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub pair: PairArgs,
    /// Recompute instead of reading the cached result.
    #[arg(long)]
    pub no_cache: bool,
}

/// Arguments for commands scoped to one course.
#[derive(Clone, Debug, Args)]
pub struct CourseArgs {
    pub course: CourseId,
}

/// Arguments for `enrolctl recalculate`.
#[derive(Clone, Debug, Args)]
pub struct RecalculateArgs {
    pub course: CourseId,
    /// Only revisit learners who already have a cached result.
    #[arg(long)]
    pub current_only: bool,
}

/// Arguments for `enrolctl history`.
#[derive(Clone, Debug, Args)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub pair: PairArgs,
    /// Provider id.
    #[arg(long, default_value = "manual")]
    pub provider: String,
}

/// Arguments for `enrolctl snapshot`.
#[derive(Clone, Debug, Args)]
pub struct SnapshotArgs {
    #[command(flatten)]
    pub pair: PairArgs,
    /// Epoch milliseconds (defaults to now).
    #[arg(long)]
    pub at: Option<i64>,
}

/// Arguments for `enrolctl worker`.
#[derive(Clone, Debug, Args)]
pub struct WorkerArgs {
    /// Seconds between ticks (defaults to `jobs.tick_interval_secs`).
    #[arg(long)]
    pub interval: Option<u64>,
}

/// Arguments for `enrolctl schema`.
#[derive(Clone, Debug, Args)]
pub struct SchemaArgs {
    /// Record type: results, state, journal, learner-job, course-job
    pub type_name: String,
}
