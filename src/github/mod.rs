pub mod client;
pub mod errors;

use async_trait::async_trait;
use tracing::info;

pub use client::GitHubClient;
pub use errors::ScmError;

/// Result of a best-effort removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

/// Access to the version-controlled file store.
///
/// Writes follow an explicit probe protocol: look up the content hash at
/// the path, then create (absent) or update with that hash (present).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ScmClient: Send + Sync {
    async fn get_branch_head_sha(&self, branch: &str) -> Result<String, ScmError>;

    /// Create `new_branch` at the head of `from_branch`. An existing
    /// `new_branch` is not an error.
    async fn create_branch(&self, new_branch: &str, from_branch: &str) -> Result<(), ScmError>;

    /// Content hash of the file at `path`, or `None` when there is no file.
    async fn probe_file_sha(&self, branch: &str, path: &str) -> Result<Option<String>, ScmError>;

    async fn create_file(
        &self,
        branch: &str,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<(), ScmError>;

    async fn update_file(
        &self,
        branch: &str,
        path: &str,
        content: &[u8],
        message: &str,
        sha: &str,
    ) -> Result<(), ScmError>;

    async fn put_file(
        &self,
        branch: &str,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<(), ScmError> {
        match self.probe_file_sha(branch, path).await? {
            Some(sha) => {
                info!(path, branch, "GitHub: updating existing file");
                self.update_file(branch, path, content, message, &sha).await
            }
            None => {
                info!(path, branch, "GitHub: creating new file");
                self.create_file(branch, path, content, message).await
            }
        }
    }

    async fn get_file(&self, branch: &str, path: &str) -> Result<Vec<u8>, ScmError>;

    async fn delete_file(
        &self,
        branch: &str,
        path: &str,
        message: &str,
    ) -> Result<DeleteOutcome, ScmError>;

    async fn delete_branch(&self, branch: &str) -> Result<DeleteOutcome, ScmError>;
}
