use octocrab::Error as OctocrabError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScmError {
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("GitHub API error: {0}")]
    Api(#[from] OctocrabError),

    #[error("GitHub rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("branch {branch} already exists at {actual}, expected base commit {expected}")]
    BranchDiverged {
        branch: String,
        expected: String,
        actual: String,
    },

    #[error("Unexpected GitHub response: {0}")]
    InvalidResponse(String),
}

impl ScmError {
    pub fn is_not_found(&self) -> bool {
        match self {
            ScmError::NotFound { .. } => true,
            ScmError::Rejected { status, .. } => *status == 404,
            ScmError::Api(err) => status_code(err) == Some(404),
            _ => false,
        }
    }

    /// Short operator guidance keyed on the HTTP status, if there is one.
    pub fn hint(&self) -> Option<&'static str> {
        let status = match self {
            ScmError::Api(err) => status_code(err)?,
            ScmError::Rejected { status, .. } => *status,
            ScmError::BranchDiverged { .. } => {
                return Some("Delete the stale branch or pick a fresh run id (RUN_ID)")
            }
            _ => return None,
        };

        match status {
            401 => Some("Token is invalid or expired; refresh GITHUB_TOKEN"),
            403 => Some("Token lacks 'repo' scope or the rate limit was hit"),
            404 => Some("Check GITHUB_OWNER / GITHUB_REPO and repository access"),
            422 => Some("Request data was rejected; the ref or file may already exist"),
            _ => None,
        }
    }
}

/// HTTP status carried by an octocrab error, when GitHub answered at all.
pub fn status_code(err: &OctocrabError) -> Option<u16> {
    match err {
        OctocrabError::GitHub { source, .. } => Some(source.status_code.as_u16()),
        _ => None,
    }
}
