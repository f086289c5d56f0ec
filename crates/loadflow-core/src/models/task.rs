use std::any::Any;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::models::{CoreError, CoreErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for TaskId {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value).map(Self).map_err(|error| CoreError {
            task: None,
            kind: CoreErrorKind::InvalidInput,
            message: format!("'{value}' is not a valid task id: {error}"),
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Created,
    Running,
    Finished,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Created => "CREATED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Finished => "FINISHED",
            TaskStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Finished | TaskStatus::Failed)
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of a computation that did not produce a result.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub message: String,
}

impl TaskFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn from_error(error: impl Display) -> Self {
        Self::new(error.to_string())
    }

    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(format!("computation panicked: {detail}"))
    }
}

impl Display for TaskFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TaskOutcome<R> {
    Finished(R),
    Failed(TaskFailure),
}

impl<R> TaskOutcome<R> {
    pub fn status(&self) -> TaskStatus {
        match self {
            TaskOutcome::Finished(_) => TaskStatus::Finished,
            TaskOutcome::Failed(_) => TaskStatus::Failed,
        }
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        match self {
            TaskOutcome::Finished(_) => None,
            TaskOutcome::Failed(failure) => Some(failure),
        }
    }
}

#[derive(Debug)]
enum TaskState<R> {
    Created,
    Running,
    Terminal(TaskOutcome<R>),
}

/// One unit of asynchronous work tracked by id.
///
/// The status only moves forward: `Created` → `Running` → `Finished` | `Failed`.
/// The outcome is stored together with the terminal status, so a task can never
/// report a result and a failure at the same time.
#[derive(Debug)]
pub struct Task<R> {
    id: TaskId,
    state: TaskState<R>,
    created_at: Instant,
    completed_at: Option<Instant>,
    marked_for_removal: bool,
}

impl<R> Task<R> {
    pub fn new() -> Self {
        Self::with_created_at(Instant::now())
    }

    pub fn with_created_at(created_at: Instant) -> Self {
        Self {
            id: TaskId::new(),
            state: TaskState::Created,
            created_at,
            completed_at: None,
            marked_for_removal: false,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn status(&self) -> TaskStatus {
        match &self.state {
            TaskState::Created => TaskStatus::Created,
            TaskState::Running => TaskStatus::Running,
            TaskState::Terminal(outcome) => outcome.status(),
        }
    }

    pub fn outcome(&self) -> Option<&TaskOutcome<R>> {
        match &self.state {
            TaskState::Terminal(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn into_outcome(self) -> Option<TaskOutcome<R>> {
        match self.state {
            TaskState::Terminal(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        self.outcome()
            .and_then(TaskOutcome::failure)
            .map(|failure| failure.message.as_str())
    }

    pub fn age_seconds(&self) -> u64 {
        self.created_at.elapsed().as_secs()
    }

    pub fn seconds_since_completion(&self) -> Option<u64> {
        self.completed_at.map(|completed| completed.elapsed().as_secs())
    }

    pub fn is_marked_for_removal(&self) -> bool {
        self.marked_for_removal
    }

    pub(crate) fn mark_for_removal(&mut self) {
        self.marked_for_removal = true;
    }

    pub fn start(&mut self) -> Result<(), CoreError> {
        match self.state {
            TaskState::Created => {
                self.state = TaskState::Running;
                Ok(())
            }
            _ => Err(CoreError::invalid_transition(
                self.id,
                self.status(),
                TaskStatus::Running,
            )),
        }
    }

    pub fn complete(&mut self, outcome: TaskOutcome<R>) -> Result<(), CoreError> {
        match self.state {
            TaskState::Running => {
                self.state = TaskState::Terminal(outcome);
                self.completed_at = Some(Instant::now());
                Ok(())
            }
            _ => Err(CoreError::invalid_transition(
                self.id,
                self.status(),
                outcome.status(),
            )),
        }
    }
}

impl<R> Default for Task<R> {
    fn default() -> Self {
        Self::new()
    }
}
