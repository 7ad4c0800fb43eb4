mod course;
mod learner;

pub use course::CourseCommands;
pub use learner::LearnerCommands;
