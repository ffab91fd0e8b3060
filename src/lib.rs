// Account Round Trip Library - CRM + GitHub data workflow
// This exposes the core components for testing and integration

pub mod cli;
pub mod config;
pub mod crm;
pub mod csv_pipeline;
pub mod factory;
pub mod github;
pub mod mocks;
pub mod models;
pub mod retry;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use config::{AccountRoundtripConfig, ConfigError};
pub use crm::{CrmClient, CrmError, SalesforceClient};
pub use csv_pipeline::{augment_with_phone, export, parse, CsvError};
pub use factory::{AccountFactory, ConstraintViolation};
pub use github::{DeleteOutcome, GitHubClient, ScmClient, ScmError};
pub use models::{Account, AccountFields, Country, CrmRecord, ResourceHandle, RunId};
pub use retry::{retry, RetryConfig, RetryExecutor, RetryExhausted};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflows::{
    CleanupReport, RunReport, RunRequest, UpdateMode, UpdateSummary, WorkflowError,
    WorkflowOrchestrator, WorkflowStage,
};
