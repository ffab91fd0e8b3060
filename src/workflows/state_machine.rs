// Stage tracking for one account round trip.
// Forward moves go one step at a time; Cleanup is reachable from any
// stage before Done, and Done only from Cleanup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use super::errors::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WorkflowStage {
    Idle,
    Authenticated,
    EntitiesCreated,
    Exported,
    BranchCreated,
    Augmented,
    Pushed,
    Updated,
    Cleanup,
    Done,
}

impl WorkflowStage {
    /// The stage the pipeline moves to after this one succeeds.
    pub fn next(self) -> Option<WorkflowStage> {
        use WorkflowStage::*;
        match self {
            Idle => Some(Authenticated),
            Authenticated => Some(EntitiesCreated),
            EntitiesCreated => Some(Exported),
            Exported => Some(BranchCreated),
            BranchCreated => Some(Augmented),
            Augmented => Some(Pushed),
            Pushed => Some(Updated),
            Updated => Some(Cleanup),
            Cleanup => Some(Done),
            Done => None,
        }
    }

    pub fn can_transition_to(self, to: WorkflowStage) -> bool {
        match to {
            WorkflowStage::Cleanup => self < WorkflowStage::Cleanup,
            _ => self.next() == Some(to),
        }
    }

    pub fn is_terminal(self) -> bool {
        self == WorkflowStage::Done
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: WorkflowStage,
    pub to: WorkflowStage,
    pub at: DateTime<Utc>,
}

/// Current stage plus the ordered history of every accepted move.
#[derive(Debug, Clone)]
pub struct StageTracker {
    current: WorkflowStage,
    history: Vec<StageTransition>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self {
            current: WorkflowStage::Idle,
            history: Vec::new(),
        }
    }
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> WorkflowStage {
        self.current
    }

    pub fn history(&self) -> &[StageTransition] {
        &self.history
    }

    /// Fail unless the tracker currently sits at `expected`.
    pub fn require(&self, expected: WorkflowStage) -> Result<(), WorkflowError> {
        if self.current == expected {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition {
                from: self.current,
                to: expected.next().unwrap_or(expected),
            })
        }
    }

    pub fn advance(&mut self, to: WorkflowStage) -> Result<(), WorkflowError> {
        if !self.current.can_transition_to(to) {
            return Err(WorkflowError::InvalidTransition {
                from: self.current,
                to,
            });
        }

        info!(from = %self.current, to = %to, "Workflow stage transition");
        self.history.push(StageTransition {
            from: self.current,
            to,
            at: Utc::now(),
        });
        self.current = to;
        Ok(())
    }
}
