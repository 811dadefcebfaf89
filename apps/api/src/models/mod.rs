pub mod proctor;
pub mod submission;
pub mod task;
