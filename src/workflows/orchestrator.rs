use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

use super::cleanup::{run_cleanup, CleanupReport, TrackedResources};
use super::errors::WorkflowError;
use super::state_machine::{StageTracker, StageTransition, WorkflowStage};
use crate::config::AccountRoundtripConfig;
use crate::crm::{CrmClient, CrmError};
use crate::csv_pipeline::{self, CountryPhoneGenerator, CsvError, PhoneSource};
use crate::factory::AccountFactory;
use crate::github::ScmClient;
use crate::models::{run_timestamp, Account, AccountFields, ResourceHandle, RunId};
use crate::retry::{RetryConfig, RetryExecutor};
use crate::telemetry::{create_workflow_span, generate_correlation_id};

/// Id written into the first row when the negative scenario is requested.
pub const INVALID_ID: &str = "INVALID_ID";

/// How the update stage treats a run where no record was updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Zero successes fails the stage.
    #[default]
    Strict,
    /// Zero successes is reported but accepted.
    TolerateErrors,
}

#[derive(Debug)]
pub struct UpdateFailure {
    pub account_id: String,
    pub error: CrmError,
}

/// Outcome of the bulk phone update.
#[derive(Debug, Default)]
pub struct UpdateSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<UpdateFailure>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub namespace: String,
    pub base_branch: String,
    pub retry: RetryConfig,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            namespace: "data-autotest".to_string(),
            base_branch: "main".to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl From<&AccountRoundtripConfig> for OrchestratorSettings {
    fn from(config: &AccountRoundtripConfig) -> Self {
        Self {
            namespace: config.workflow.namespace.clone(),
            base_branch: config.github.base_branch.clone(),
            retry: config.retry(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub count: usize,
    pub inject_invalid_row: bool,
    pub mode: UpdateMode,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            count: 5,
            inject_invalid_row: false,
            mode: UpdateMode::Strict,
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub correlation_id: String,
    /// Last stage the pipeline reached before cleanup took over.
    pub stage_reached: WorkflowStage,
    pub accounts_created: usize,
    pub outcome: Result<UpdateSummary, WorkflowError>,
    pub cleanup: CleanupReport,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Drives one account round trip: CRM create, CSV publish, branch and
/// augment, push, bulk update, and an unconditional cleanup.
///
/// Each stage method checks the current stage before doing any work, so
/// stages can also be driven one by one (see `tests/orchestrator_tests.rs`).
pub struct WorkflowOrchestrator<C, S>
where
    C: CrmClient + ?Sized,
    S: ScmClient + ?Sized,
{
    crm: Arc<C>,
    scm: Arc<S>,
    run_id: RunId,
    settings: OrchestratorSettings,
    factory: AccountFactory,
    retry: RetryExecutor,
    phones: Box<dyn PhoneSource + Send>,
    stages: StageTracker,
    tracked: TrackedResources,
    timestamp: String,
    accounts: Vec<Account>,
    augmented: Option<Vec<u8>>,
    cleaned_up: bool,
}

impl<C, S> WorkflowOrchestrator<C, S>
where
    C: CrmClient + ?Sized,
    S: ScmClient + ?Sized,
{
    pub fn new(crm: Arc<C>, scm: Arc<S>, run_id: RunId, settings: OrchestratorSettings) -> Self {
        Self {
            crm,
            scm,
            factory: AccountFactory::new(run_id.clone()),
            retry: RetryExecutor::new(settings.retry.clone()),
            run_id,
            settings,
            phones: Box::new(CountryPhoneGenerator::with_rng(StdRng::from_os_rng())),
            stages: StageTracker::new(),
            tracked: TrackedResources::default(),
            timestamp: run_timestamp(),
            accounts: Vec::new(),
            augmented: None,
            cleaned_up: false,
        }
    }

    pub fn with_phone_source(mut self, phones: Box<dyn PhoneSource + Send>) -> Self {
        self.phones = phones;
        self
    }

    /// Fix the timestamp used in the file path and branch name.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn stage(&self) -> WorkflowStage {
        self.stages.current()
    }

    pub fn history(&self) -> &[StageTransition] {
        self.stages.history()
    }

    pub fn tracked(&self) -> &TrackedResources {
        &self.tracked
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Run every stage, then clean up no matter how far the pipeline got.
    pub async fn run(&mut self, request: RunRequest) -> RunReport {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span(self.run_id.as_str(), &correlation_id);

        async {
            info!(
                count = request.count,
                inject_invalid_row = request.inject_invalid_row,
                mode = ?request.mode,
                "Starting account round trip"
            );

            let outcome = self.run_stages(&request).await;
            let stage_reached = self.stage();
            if let Err(e) = &outcome {
                error!(stage = %stage_reached, error = %e, "Pipeline aborted");
            }

            let cleanup = self.cleanup().await;

            RunReport {
                run_id: self.run_id.clone(),
                correlation_id: correlation_id.clone(),
                stage_reached,
                accounts_created: self.accounts.len(),
                outcome,
                cleanup,
            }
        }
        .instrument(span)
        .await
    }

    async fn run_stages(&mut self, request: &RunRequest) -> Result<UpdateSummary, WorkflowError> {
        self.authenticate().await?;
        self.create_accounts(request.count).await?;
        self.export_and_publish().await?;
        self.branch_and_augment().await?;
        self.push_augmented(request.inject_invalid_row).await?;
        self.apply_updates(request.mode).await
    }

    pub async fn authenticate(&mut self) -> Result<(), WorkflowError> {
        self.stages.require(WorkflowStage::Idle)?;
        self.crm.authenticate().await.map_err(WorkflowError::Auth)?;
        self.stages.advance(WorkflowStage::Authenticated)
    }

    /// Generate and create `count` accounts. Each id is tracked for cleanup
    /// the moment the CRM returns it.
    pub async fn create_accounts(&mut self, count: usize) -> Result<&[Account], WorkflowError> {
        self.stages.require(WorkflowStage::Authenticated)?;
        let accounts = self.factory.build(count)?;

        for mut account in accounts {
            let fields = account.to_fields();
            let crm = &self.crm;
            let id = self
                .retry
                .execute(|| crm.create_account(&fields))
                .await?;

            info!(account_id = %id, name = %account.name, country = %account.country, "Account created");
            self.tracked.track_account(id.clone());
            account.id = id;
            self.accounts.push(account);
        }

        self.stages.advance(WorkflowStage::EntitiesCreated)?;
        Ok(self.accounts.as_slice())
    }

    /// Export the created accounts and publish them to a fresh path on the
    /// base branch.
    pub async fn export_and_publish(&mut self) -> Result<String, WorkflowError> {
        self.stages.require(WorkflowStage::EntitiesCreated)?;
        let csv = csv_pipeline::export(&self.accounts)?;
        let path =
            ResourceHandle::file_path_for(&self.settings.namespace, &self.run_id, &self.timestamp);

        self.tracked.file_path = Some(path.clone());
        self.scm
            .create_file(
                &self.settings.base_branch,
                &path,
                &csv,
                &format!("feat: export accounts without phone ({})", self.run_id),
            )
            .await?;

        info!(path = %path, rows = self.accounts.len(), "Published CSV");
        self.stages.advance(WorkflowStage::Exported)?;
        Ok(path)
    }

    /// Cut the side branch, fetch the published file from the base branch
    /// and add a validated phone column.
    pub async fn branch_and_augment(&mut self) -> Result<&[u8], WorkflowError> {
        self.stages.require(WorkflowStage::Exported)?;
        let path = self.published_path()?;
        let branch = ResourceHandle::branch_name_for(&self.run_id, &self.timestamp);

        self.tracked.branch_name = Some(branch.clone());
        self.scm
            .create_branch(&branch, &self.settings.base_branch)
            .await?;
        info!(branch = %branch, from = %self.settings.base_branch, "Branch ready");
        self.stages.advance(WorkflowStage::BranchCreated)?;

        let published = self.scm.get_file(&self.settings.base_branch, &path).await?;
        let augmented = csv_pipeline::augment_with_phone_using(&published, &mut *self.phones)?;
        ensure_valid_phones(&augmented)?;

        self.stages.advance(WorkflowStage::Augmented)?;
        Ok(self.augmented.insert(augmented).as_slice())
    }

    /// Publish the augmented file to the side branch. With
    /// `inject_invalid_row` the first row's Id is replaced by [`INVALID_ID`].
    pub async fn push_augmented(&mut self, inject_invalid_row: bool) -> Result<(), WorkflowError> {
        self.stages.require(WorkflowStage::Augmented)?;
        let path = self.published_path()?;
        let branch = self.side_branch()?;
        let augmented = self.augmented.as_deref().unwrap_or_default();

        let payload = if inject_invalid_row {
            warn!(replacement = INVALID_ID, "Corrupting first row before push");
            csv_pipeline::corrupt_first_id(augmented, INVALID_ID)?
        } else {
            augmented.to_vec()
        };

        self.scm
            .put_file(
                &branch,
                &path,
                &payload,
                &format!("feat: add phone numbers ({})", self.run_id),
            )
            .await?;
        info!(branch = %branch, path = %path, "Pushed augmented CSV");
        self.stages.advance(WorkflowStage::Pushed)
    }

    /// Fetch the augmented file from the side branch and set each account's
    /// phone. Per-record failures are collected, not raised.
    pub async fn apply_updates(&mut self, mode: UpdateMode) -> Result<UpdateSummary, WorkflowError> {
        self.stages.require(WorkflowStage::Pushed)?;
        let path = self.published_path()?;
        let branch = self.side_branch()?;

        let bytes = self.scm.get_file(&branch, &path).await?;
        let rows = csv_pipeline::parse(&bytes)?;
        let mut summary = UpdateSummary {
            attempted: rows.len(),
            ..Default::default()
        };

        for row in rows {
            let Some(phone) = row.phone else {
                debug!(account_id = %row.id, "Row has no phone, skipping");
                continue;
            };

            match self
                .crm
                .update_account(&row.id, &AccountFields::phone_only(phone))
                .await
            {
                Ok(()) => {
                    info!(account_id = %row.id, "Phone updated");
                    summary.succeeded += 1;
                }
                Err(e) => {
                    error!(account_id = %row.id, error = %e, "Phone update failed");
                    summary.failures.push(UpdateFailure {
                        account_id: row.id,
                        error: e,
                    });
                }
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failures.len(),
            attempted = summary.attempted,
            "Bulk update finished"
        );

        if summary.succeeded == 0 {
            match mode {
                UpdateMode::Strict => {
                    return Err(WorkflowError::NoRecordsUpdated { summary })
                }
                UpdateMode::TolerateErrors => warn!("No account was updated; tolerated"),
            }
        }

        self.stages.advance(WorkflowStage::Updated)?;
        Ok(summary)
    }

    /// Remove every tracked resource. Runs once; later calls return an
    /// empty report.
    pub async fn cleanup(&mut self) -> CleanupReport {
        if self.cleaned_up {
            debug!("Cleanup already ran");
            return CleanupReport::default();
        }
        self.cleaned_up = true;

        if let Err(e) = self.stages.advance(WorkflowStage::Cleanup) {
            warn!(error = %e, "Unexpected stage before cleanup");
        }

        let tracked = std::mem::take(&mut self.tracked);
        let report = run_cleanup(
            self.crm.as_ref(),
            self.scm.as_ref(),
            &tracked,
            &self.settings.base_branch,
            &format!("chore: cleanup test CSV ({})", self.run_id),
        )
        .await;

        if let Err(e) = self.stages.advance(WorkflowStage::Done) {
            warn!(error = %e, "Unexpected stage after cleanup");
        }
        report
    }

    fn published_path(&self) -> Result<String, WorkflowError> {
        self.tracked
            .file_path
            .clone()
            .ok_or_else(|| WorkflowError::NotFound {
                resource: "published CSV path".to_string(),
            })
    }

    fn side_branch(&self) -> Result<String, WorkflowError> {
        self.tracked
            .branch_name
            .clone()
            .ok_or_else(|| WorkflowError::NotFound {
                resource: "side branch".to_string(),
            })
    }
}

impl<C, S> Drop for WorkflowOrchestrator<C, S>
where
    C: CrmClient + ?Sized,
    S: ScmClient + ?Sized,
{
    fn drop(&mut self) {
        if !self.cleaned_up && !self.tracked.is_empty() {
            warn!(
                run_id = %self.run_id,
                accounts = self.tracked.account_ids.len(),
                "Orchestrator dropped before cleanup; resources left behind"
            );
        }
    }
}

fn ensure_valid_phones(csv: &[u8]) -> Result<(), CsvError> {
    for (idx, account) in csv_pipeline::parse(csv)?.into_iter().enumerate() {
        match account.phone {
            Some(phone) if csv_pipeline::is_valid_e164(&phone) => {}
            phone => {
                return Err(CsvError::InvalidPhone {
                    row: idx + 1,
                    country: account.country,
                    phone: phone.unwrap_or_default(),
                })
            }
        }
    }
    Ok(())
}
