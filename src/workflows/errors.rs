use thiserror::Error;

use super::orchestrator::UpdateSummary;
use super::state_machine::WorkflowStage;
use crate::crm::CrmError;
use crate::csv_pipeline::CsvError;
use crate::factory::ConstraintViolation;
use crate::github::ScmError;
use crate::retry::RetryExhausted;

/// Reasons a round trip aborts before reaching cleanup on its own.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("CRM authentication failed: {0}")]
    Auth(#[source] CrmError),

    #[error("CRM request failed: {0}")]
    Crm(#[from] CrmError),

    #[error("GitHub request failed: {0}")]
    Scm(ScmError),

    #[error("generated batch is invalid: {0}")]
    Validation(#[from] ConstraintViolation),

    #[error("CSV processing failed: {0}")]
    Csv(#[from] CsvError),

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("account creation gave up: {0}")]
    RetryExhausted(#[from] RetryExhausted<CrmError>),

    #[error("cannot move workflow from {from} to {to}")]
    InvalidTransition {
        from: WorkflowStage,
        to: WorkflowStage,
    },

    /// Strict mode with zero successes. Carries the per-record failures.
    #[error("no account was updated ({} attempted)", .summary.attempted)]
    NoRecordsUpdated { summary: UpdateSummary },
}

impl From<ScmError> for WorkflowError {
    fn from(err: ScmError) -> Self {
        match err {
            ScmError::NotFound { resource } => WorkflowError::NotFound { resource },
            other => WorkflowError::Scm(other),
        }
    }
}

impl WorkflowError {
    /// Business-rule or phone-format problems, raised before dependent writes.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WorkflowError::Validation(_) | WorkflowError::Csv(CsvError::InvalidPhone { .. })
        )
    }

    pub fn is_auth(&self) -> bool {
        match self {
            WorkflowError::Auth(_) => true,
            WorkflowError::Crm(err) => err.is_auth(),
            _ => false,
        }
    }
}
