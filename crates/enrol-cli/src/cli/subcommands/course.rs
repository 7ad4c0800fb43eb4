use clap::Subcommand;
use enrol_core::CourseId;

/// Course commands.
#[derive(Clone, Debug, Subcommand)]
pub enum CourseCommands {
    /// Create a course (published unless `--draft`).
    Add {
        id: CourseId,
        #[arg(long)]
        draft: bool,
    },
    /// Publish a course.
    Publish { id: CourseId },
    /// Move a course back to draft.
    Draft { id: CourseId },
    /// List courses.
    List,
}
