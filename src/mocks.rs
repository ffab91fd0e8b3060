// In-memory CRM and GitHub stand-ins - no network side effects.
// Used by the integration tests and by `run --offline`.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::crm::{CrmClient, CrmError};
use crate::github::{DeleteOutcome, ScmClient, ScmError};
use crate::models::{AccountFields, CrmRecord};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn injected(operation: &'static str) -> CrmError {
    CrmError::Api {
        operation,
        status: 503,
        body: "injected failure".to_string(),
    }
}

#[derive(Debug, Default)]
struct CrmState {
    authenticated: bool,
    next_id: u64,
    records: BTreeMap<String, CrmRecord>,
    create_calls: usize,
    update_calls: usize,
    deleted: Vec<String>,
}

/// CRM that keeps accounts in a map.
#[derive(Debug, Default)]
pub struct InMemoryCrm {
    state: Mutex<CrmState>,
    reject_auth: Mutex<bool>,
    create_failures: Mutex<usize>,
    create_limit: Mutex<Option<usize>>,
    fail_updates: Mutex<bool>,
    failing_deletes: Mutex<HashSet<String>>,
}

impl InMemoryCrm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reject_auth(&self, reject: bool) {
        *lock(&self.reject_auth) = reject;
    }

    /// The next `count` create calls fail with a 503.
    pub fn fail_next_creates(&self, count: usize) {
        *lock(&self.create_failures) = count;
    }

    /// Creates fail once `limit` accounts exist, until the limit is lifted.
    pub fn limit_creates(&self, limit: Option<usize>) {
        *lock(&self.create_limit) = limit;
    }

    pub fn set_fail_updates(&self, fail: bool) {
        *lock(&self.fail_updates) = fail;
    }

    pub fn fail_deletes_for(&self, id: &str) {
        lock(&self.failing_deletes).insert(id.to_string());
    }

    /// Seed a record directly, bypassing authentication.
    pub fn insert(&self, record: CrmRecord) {
        lock(&self.state).records.insert(record.id.clone(), record);
    }

    pub fn record(&self, id: &str) -> Option<CrmRecord> {
        lock(&self.state).records.get(id).cloned()
    }

    pub fn record_count(&self) -> usize {
        lock(&self.state).records.len()
    }

    pub fn create_calls(&self) -> usize {
        lock(&self.state).create_calls
    }

    pub fn update_calls(&self) -> usize {
        lock(&self.state).update_calls
    }

    /// Ids passed to `delete_account`, in call order.
    pub fn deleted_ids(&self) -> Vec<String> {
        lock(&self.state).deleted.clone()
    }

    fn ensure_authenticated(state: &CrmState) -> Result<(), CrmError> {
        if state.authenticated {
            Ok(())
        } else {
            Err(CrmError::NotAuthenticated)
        }
    }
}

#[async_trait]
impl CrmClient for InMemoryCrm {
    async fn authenticate(&self) -> Result<(), CrmError> {
        if *lock(&self.reject_auth) {
            return Err(CrmError::Auth {
                status: 400,
                body: r#"{"error":"invalid_client"}"#.to_string(),
            });
        }
        lock(&self.state).authenticated = true;
        Ok(())
    }

    async fn create_account(&self, fields: &AccountFields) -> Result<String, CrmError> {
        let mut state = lock(&self.state);
        Self::ensure_authenticated(&state)?;
        state.create_calls += 1;

        let mut failures = lock(&self.create_failures);
        if *failures > 0 {
            *failures -= 1;
            return Err(injected("create"));
        }
        if lock(&self.create_limit).is_some_and(|limit| state.records.len() >= limit) {
            return Err(injected("create"));
        }

        state.next_id += 1;
        let id = format!("001MEM{:012}", state.next_id);
        let record = CrmRecord {
            id: id.clone(),
            name: fields.name.clone().unwrap_or_default(),
            billing_country: fields.billing_country.clone(),
            number_of_employees: fields.number_of_employees,
            phone: fields.phone.clone(),
        };
        state.records.insert(id.clone(), record);
        Ok(id)
    }

    async fn update_account(&self, id: &str, fields: &AccountFields) -> Result<(), CrmError> {
        let mut state = lock(&self.state);
        Self::ensure_authenticated(&state)?;
        state.update_calls += 1;

        if *lock(&self.fail_updates) {
            return Err(injected("update"));
        }

        let record = state
            .records
            .get_mut(id)
            .ok_or_else(|| CrmError::NotFound { id: id.to_string() })?;
        if let Some(name) = &fields.name {
            record.name = name.clone();
        }
        if let Some(country) = &fields.billing_country {
            record.billing_country = Some(country.clone());
        }
        if let Some(employees) = fields.number_of_employees {
            record.number_of_employees = Some(employees);
        }
        if let Some(phone) = &fields.phone {
            record.phone = Some(phone.clone());
        }
        Ok(())
    }

    async fn delete_account(&self, id: &str) -> Result<(), CrmError> {
        let mut state = lock(&self.state);
        Self::ensure_authenticated(&state)?;
        state.deleted.push(id.to_string());

        if lock(&self.failing_deletes).contains(id) {
            return Err(injected("delete"));
        }

        // Missing records count as deleted.
        state.records.remove(id);
        Ok(())
    }

    async fn query_by_name_prefix(&self, prefix: &str) -> Result<Vec<CrmRecord>, CrmError> {
        let state = lock(&self.state);
        Self::ensure_authenticated(&state)?;
        Ok(state
            .records
            .values()
            .filter(|record| record.name.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone)]
struct StoredFile {
    content: Vec<u8>,
    sha: String,
}

#[derive(Debug, Clone)]
struct Branch {
    head: String,
    files: BTreeMap<String, StoredFile>,
}

#[derive(Debug, Default)]
struct ScmState {
    branches: HashMap<String, Branch>,
    next_object: u64,
    commit_messages: Vec<String>,
}

impl ScmState {
    fn next_sha(&mut self, kind: &str) -> String {
        self.next_object += 1;
        format!("{kind}{:036}", self.next_object)
    }

    fn branch_mut(&mut self, name: &str) -> Result<&mut Branch, ScmError> {
        self.branches.get_mut(name).ok_or_else(|| ScmError::NotFound {
            resource: format!("branch {name}"),
        })
    }

    fn commit(&mut self, branch: &str, message: &str) -> Result<(), ScmError> {
        let head = self.next_sha("c");
        self.branch_mut(branch)?.head = head;
        self.commit_messages.push(message.to_string());
        Ok(())
    }
}

/// Repository with branches and files held in memory.
#[derive(Debug)]
pub struct InMemoryScm {
    state: Mutex<ScmState>,
    failing_branch_deletes: Mutex<bool>,
}

impl Default for InMemoryScm {
    fn default() -> Self {
        Self::new("main")
    }
}

impl InMemoryScm {
    /// Repository containing a single empty `base_branch`.
    pub fn new(base_branch: &str) -> Self {
        let mut state = ScmState::default();
        let head = state.next_sha("c");
        state.branches.insert(
            base_branch.to_string(),
            Branch {
                head,
                files: BTreeMap::new(),
            },
        );
        Self {
            state: Mutex::new(state),
            failing_branch_deletes: Mutex::new(false),
        }
    }

    pub fn set_fail_branch_deletes(&self, fail: bool) {
        *lock(&self.failing_branch_deletes) = fail;
    }

    pub fn branch_exists(&self, branch: &str) -> bool {
        lock(&self.state).branches.contains_key(branch)
    }

    pub fn file(&self, branch: &str, path: &str) -> Option<Vec<u8>> {
        lock(&self.state)
            .branches
            .get(branch)
            .and_then(|b| b.files.get(path))
            .map(|f| f.content.clone())
    }

    pub fn files_on(&self, branch: &str) -> Vec<String> {
        lock(&self.state)
            .branches
            .get(branch)
            .map(|b| b.files.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn commit_messages(&self) -> Vec<String> {
        lock(&self.state).commit_messages.clone()
    }

    /// Advance a branch head as if someone else pushed to it.
    pub fn push_foreign_commit(&self, branch: &str) -> Result<(), ScmError> {
        lock(&self.state).commit(branch, "foreign commit")
    }
}

#[async_trait]
impl ScmClient for InMemoryScm {
    async fn get_branch_head_sha(&self, branch: &str) -> Result<String, ScmError> {
        let mut state = lock(&self.state);
        Ok(state.branch_mut(branch)?.head.clone())
    }

    async fn create_branch(&self, new_branch: &str, from_branch: &str) -> Result<(), ScmError> {
        let mut state = lock(&self.state);
        if state.branches.contains_key(new_branch) {
            return Ok(());
        }
        let source = state.branch_mut(from_branch)?.clone();
        state.branches.insert(new_branch.to_string(), source);
        Ok(())
    }

    async fn probe_file_sha(&self, branch: &str, path: &str) -> Result<Option<String>, ScmError> {
        let mut state = lock(&self.state);
        Ok(state.branch_mut(branch)?.files.get(path).map(|f| f.sha.clone()))
    }

    async fn create_file(
        &self,
        branch: &str,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<(), ScmError> {
        let mut state = lock(&self.state);
        let sha = state.next_sha("b");
        let files = &mut state.branch_mut(branch)?.files;
        if files.contains_key(path) {
            return Err(ScmError::Rejected {
                status: 422,
                message: format!("\"sha\" wasn't supplied for {path}"),
            });
        }
        files.insert(
            path.to_string(),
            StoredFile {
                content: content.to_vec(),
                sha,
            },
        );
        state.commit(branch, message)
    }

    async fn update_file(
        &self,
        branch: &str,
        path: &str,
        content: &[u8],
        message: &str,
        sha: &str,
    ) -> Result<(), ScmError> {
        let mut state = lock(&self.state);
        let new_sha = state.next_sha("b");
        let file = state
            .branch_mut(branch)?
            .files
            .get_mut(path)
            .ok_or_else(|| ScmError::NotFound {
                resource: format!("{path} on {branch}"),
            })?;
        if file.sha != sha {
            return Err(ScmError::Rejected {
                status: 409,
                message: format!("{path} does not match {sha}"),
            });
        }
        file.content = content.to_vec();
        file.sha = new_sha;
        state.commit(branch, message)
    }

    async fn get_file(&self, branch: &str, path: &str) -> Result<Vec<u8>, ScmError> {
        let mut state = lock(&self.state);
        state
            .branch_mut(branch)?
            .files
            .get(path)
            .map(|f| f.content.clone())
            .ok_or_else(|| ScmError::NotFound {
                resource: format!("{path} on {branch}"),
            })
    }

    async fn delete_file(
        &self,
        branch: &str,
        path: &str,
        message: &str,
    ) -> Result<DeleteOutcome, ScmError> {
        let mut state = lock(&self.state);
        let Some(target) = state.branches.get_mut(branch) else {
            return Ok(DeleteOutcome::AlreadyAbsent);
        };
        if target.files.remove(path).is_none() {
            return Ok(DeleteOutcome::AlreadyAbsent);
        }
        state.commit(branch, message)?;
        Ok(DeleteOutcome::Deleted)
    }

    async fn delete_branch(&self, branch: &str) -> Result<DeleteOutcome, ScmError> {
        if *lock(&self.failing_branch_deletes) {
            return Err(ScmError::Rejected {
                status: 500,
                message: "injected failure".to_string(),
            });
        }
        match lock(&self.state).branches.remove(branch) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::AlreadyAbsent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_crm_requires_authentication() {
        let crm = InMemoryCrm::new();
        let err = crm
            .create_account(&AccountFields::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CrmError::NotAuthenticated));

        crm.authenticate().await.unwrap();
        let id = crm.create_account(&AccountFields::default()).await.unwrap();
        assert!(crm.record(&id).is_some());
    }

    #[tokio::test]
    async fn test_crm_update_of_missing_record_fails_but_delete_succeeds() {
        let crm = InMemoryCrm::new();
        crm.authenticate().await.unwrap();

        let err = crm
            .update_account("missing", &AccountFields::phone_only("+15550000000"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(crm.delete_account("missing").await.is_ok());
    }

    #[tokio::test]
    async fn test_put_file_creates_then_updates() {
        let scm = InMemoryScm::new("main");
        scm.put_file("main", "a.csv", b"one", "first").await.unwrap();
        scm.put_file("main", "a.csv", b"two", "second").await.unwrap();

        assert_eq!(scm.file("main", "a.csv").unwrap(), b"two");
        assert_eq!(scm.commit_messages(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_branch_copies_files_and_deletes_are_idempotent() {
        let scm = InMemoryScm::new("main");
        scm.create_file("main", "a.csv", b"data", "add").await.unwrap();
        scm.create_branch("side", "main").await.unwrap();
        scm.create_branch("side", "main").await.unwrap();

        assert_eq!(scm.get_file("side", "a.csv").await.unwrap(), b"data");
        assert_eq!(
            scm.delete_file("main", "a.csv", "rm").await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            scm.delete_file("main", "a.csv", "rm").await.unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
        assert_eq!(scm.delete_branch("side").await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(
            scm.delete_branch("side").await.unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
    }
}
