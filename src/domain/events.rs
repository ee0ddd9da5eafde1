//! Task and run states of a crawl.

use serde::Serialize;

/// Lifecycle of a single page task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    /// Enumerated, waiting for a concurrency slot
    Pending,
    /// Network request in flight (including retries)
    Fetching,
    /// Page content is being parsed
    Extracting,
    /// Extracted readings written to the aggregate
    Merged,
    /// Fetch failed permanently
    Failed,
    /// Coordinate already present in a resumed aggregate
    Resumed,
    /// Never started because the run was cancelled
    Cancelled,
}

impl TaskState {
    /// Legal transitions of the per-page state machine
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Fetching | Self::Resumed | Self::Cancelled)
                | (Self::Fetching, Self::Extracting | Self::Failed)
                | (Self::Extracting, Self::Merged)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Merged | Self::Failed | Self::Resumed | Self::Cancelled)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Merged => "merged",
            Self::Failed => "failed",
            Self::Resumed => "resumed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Overall state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Running,
    /// Every dispatched page merged
    Completed,
    /// At least one page failed; the rest was still aggregated and persisted
    CompletedWithFailures,
    /// Stopped before every page was dispatched
    Cancelled,
}

impl RunState {
    /// Terminal state from the run's tallies. Cancellation takes precedence.
    #[must_use]
    pub const fn settle(failed: usize, cancelled: usize) -> Self {
        if cancelled > 0 {
            Self::Cancelled
        } else if failed > 0 {
            Self::CompletedWithFailures
        } else {
            Self::Completed
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::CompletedWithFailures => "completed with failures",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
