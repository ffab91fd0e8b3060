use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("CRM authentication failed (HTTP {status}): {body}")]
    Auth { status: u16, body: String },

    #[error("CRM client is not authenticated; call authenticate() first")]
    NotAuthenticated,

    #[error("CRM {operation} failed (HTTP {status}): {body}")]
    Api {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("CRM record not found: {id}")]
    NotFound { id: String },

    #[error("CRM transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected CRM response: {0}")]
    InvalidResponse(String),
}

impl CrmError {
    /// Auth failures abort a run; everything else is a per-call failure.
    pub fn is_auth(&self) -> bool {
        matches!(self, CrmError::Auth { .. } | CrmError::NotAuthenticated)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CrmError::NotFound { .. })
    }
}
