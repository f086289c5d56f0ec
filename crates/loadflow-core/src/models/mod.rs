pub mod error;
pub mod task;

pub use error::{CoreError, CoreErrorKind};
pub use task::{Task, TaskFailure, TaskId, TaskOutcome, TaskStatus};
