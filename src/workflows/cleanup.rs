// Compensation: remove everything a run created, one target at a time.
// Failures are collected and logged; they never stop the remaining deletes.

use thiserror::Error;
use tracing::{info, warn};

use crate::crm::{CrmClient, CrmError};
use crate::github::{DeleteOutcome, ScmClient, ScmError};

/// Resources a run has created so far, recorded as soon as each exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedResources {
    pub account_ids: Vec<String>,
    pub file_path: Option<String>,
    pub branch_name: Option<String>,
}

impl TrackedResources {
    pub fn is_empty(&self) -> bool {
        self.account_ids.is_empty() && self.file_path.is_none() && self.branch_name.is_none()
    }

    pub fn track_account(&mut self, id: impl Into<String>) {
        self.account_ids.push(id.into());
    }
}

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("failed to delete account {id}: {source}")]
    Account {
        id: String,
        #[source]
        source: CrmError,
    },

    #[error("failed to delete file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: ScmError,
    },

    #[error("failed to delete branch {branch}: {source}")]
    Branch {
        branch: String,
        #[source]
        source: ScmError,
    },
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub accounts_deleted: usize,
    pub file: Option<DeleteOutcome>,
    pub branch: Option<DeleteOutcome>,
    pub failures: Vec<CleanupError>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Delete every tracked account, then the published file on `base_branch`,
/// then the side branch.
pub async fn run_cleanup<C, S>(
    crm: &C,
    scm: &S,
    tracked: &TrackedResources,
    base_branch: &str,
    commit_message: &str,
) -> CleanupReport
where
    C: CrmClient + ?Sized,
    S: ScmClient + ?Sized,
{
    let mut report = CleanupReport::default();
    delete_accounts(crm, &tracked.account_ids, &mut report).await;

    if let Some(path) = &tracked.file_path {
        match scm.delete_file(base_branch, path, commit_message).await {
            Ok(outcome) => report.file = Some(outcome),
            Err(source) => {
                warn!(path = %path, error = %source, "Cleanup: file delete failed");
                report.failures.push(CleanupError::File {
                    path: path.clone(),
                    source,
                });
            }
        }
    }

    if let Some(branch) = &tracked.branch_name {
        match scm.delete_branch(branch).await {
            Ok(outcome) => report.branch = Some(outcome),
            Err(source) => {
                warn!(branch = %branch, error = %source, "Cleanup: branch delete failed");
                report.failures.push(CleanupError::Branch {
                    branch: branch.clone(),
                    source,
                });
            }
        }
    }

    info!(
        accounts_deleted = report.accounts_deleted,
        failures = report.failures.len(),
        "Cleanup finished"
    );
    report
}

/// Delete every account whose name starts with `prefix`. Used to clear
/// leftovers of runs that died before their own cleanup.
pub async fn sweep_by_prefix<C>(crm: &C, prefix: &str) -> Result<CleanupReport, CrmError>
where
    C: CrmClient + ?Sized,
{
    let ids: Vec<String> = crm
        .query_by_name_prefix(prefix)
        .await?
        .into_iter()
        .map(|record| record.id)
        .collect();
    info!(prefix, found = ids.len(), "Sweeping leftover accounts");

    let mut report = CleanupReport::default();
    delete_accounts(crm, &ids, &mut report).await;
    Ok(report)
}

async fn delete_accounts<C>(crm: &C, ids: &[String], report: &mut CleanupReport)
where
    C: CrmClient + ?Sized,
{
    for id in ids {
        match crm.delete_account(id).await {
            Ok(()) => report.accounts_deleted += 1,
            Err(source) => {
                warn!(account_id = %id, error = %source, "Cleanup: account delete failed");
                report.failures.push(CleanupError::Account {
                    id: id.clone(),
                    source,
                });
            }
        }
    }
}
