pub mod audit;
pub mod course;
pub mod dispatch;
pub mod enrolment;
pub mod jobs;
pub mod learner;
pub mod schema;
