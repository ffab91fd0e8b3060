// Account round trip orchestration: stage tracking, the pipeline itself,
// and the compensation pass that always follows it.

pub mod cleanup;
pub mod errors;
pub mod orchestrator;
pub mod state_machine;

pub use cleanup::{run_cleanup, sweep_by_prefix, CleanupError, CleanupReport, TrackedResources};
pub use errors::WorkflowError;
pub use orchestrator::{
    OrchestratorSettings, RunReport, RunRequest, UpdateFailure, UpdateMode, UpdateSummary,
    WorkflowOrchestrator, INVALID_ID,
};
pub use state_machine::{StageTracker, StageTransition, WorkflowStage};
