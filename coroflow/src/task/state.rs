/// Lifecycle of a task frame.
///
/// ```text
/// NotStarted -> Running <-> Suspended
///                  |
///                  +-> Completed | Failed | Cancelled
/// ```
///
/// `Cancelled` is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Created lazily and never polled.
    NotStarted,

    /// The frame is being polled right now.
    Running,

    /// The frame is parked on an external event or another task.
    Suspended,

    /// The body returned a value.
    Completed,

    /// The body panicked.
    Failed,

    /// The frame was destroyed before it finished.
    Cancelled,
}

impl TaskState {
    /// Returns `true` once the task can no longer make progress.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}
