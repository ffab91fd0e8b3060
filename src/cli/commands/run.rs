use anyhow::{Context, Result};
use std::sync::Arc;

use super::Command;
use crate::config::AccountRoundtripConfig;
use crate::crm::{CrmClient, SalesforceClient};
use crate::github::{GitHubClient, ScmClient};
use crate::mocks::{InMemoryCrm, InMemoryScm};
use crate::models::RunId;
use crate::workflows::{
    OrchestratorSettings, RunReport, RunRequest, UpdateMode, WorkflowError, WorkflowOrchestrator,
};

pub struct RunCommand {
    pub config: AccountRoundtripConfig,
    pub count: Option<usize>,
    pub inject_invalid_row: bool,
    pub tolerate_errors: bool,
    pub offline: bool,
}

impl RunCommand {
    pub fn new(config: AccountRoundtripConfig) -> Self {
        Self {
            config,
            count: None,
            inject_invalid_row: false,
            tolerate_errors: false,
            offline: false,
        }
    }

    pub fn with_count(mut self, count: Option<usize>) -> Self {
        self.count = count;
        self
    }

    pub fn with_inject_invalid_row(mut self, inject: bool) -> Self {
        self.inject_invalid_row = inject;
        self
    }

    pub fn with_tolerate_errors(mut self, tolerate: bool) -> Self {
        self.tolerate_errors = tolerate;
        self
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    fn request(&self) -> RunRequest {
        RunRequest {
            count: self.count.unwrap_or(self.config.workflow.account_count),
            inject_invalid_row: self.inject_invalid_row,
            mode: if self.tolerate_errors {
                UpdateMode::TolerateErrors
            } else {
                UpdateMode::Strict
            },
        }
    }
}

impl Command for RunCommand {
    async fn execute(&self) -> Result<()> {
        let run_id = self.config.run_id();
        let settings = OrchestratorSettings::from(&self.config);

        println!("🔁 Account round trip {run_id}");
        if self.offline {
            println!("🧪 Offline mode: in-memory CRM and GitHub");
        }
        println!();

        let report = if self.offline {
            let crm = Arc::new(InMemoryCrm::new());
            let scm = Arc::new(InMemoryScm::new(&settings.base_branch));
            run_with(crm, scm, run_id, settings, self.request()).await
        } else {
            let crm = Arc::new(
                SalesforceClient::from_config(&self.config.salesforce, self.config.http_timeout())
                    .context("Salesforce client is not configured")?,
            );
            let scm = Arc::new(
                GitHubClient::from_config(&self.config.github)
                    .context("GitHub client is not configured")?,
            );
            run_with(crm, scm, run_id, settings, self.request()).await
        };

        print_report(&report);
        report.outcome.map(|_| ()).context("round trip aborted")
    }
}

async fn run_with<C, S>(
    crm: Arc<C>,
    scm: Arc<S>,
    run_id: RunId,
    settings: OrchestratorSettings,
    request: RunRequest,
) -> RunReport
where
    C: CrmClient + ?Sized,
    S: ScmClient + ?Sized,
{
    let mut orchestrator = WorkflowOrchestrator::new(crm, scm, run_id, settings);
    orchestrator.run(request).await
}

fn print_report(report: &RunReport) {
    println!("📊 RUN SUMMARY ({})", report.correlation_id);
    println!("────────────────");
    println!("  Stage reached:    {}", report.stage_reached);
    println!("  Accounts created: {}", report.accounts_created);

    match &report.outcome {
        Ok(summary) => {
            println!(
                "  Phones updated:   {}/{}",
                summary.succeeded, summary.attempted
            );
            for failure in &summary.failures {
                println!("    ❌ {}: {}", failure.account_id, failure.error);
            }
        }
        Err(e) => {
            println!("  ❌ Aborted: {e}");
            if let WorkflowError::NoRecordsUpdated { summary } = e {
                for failure in &summary.failures {
                    println!("    ❌ {}: {}", failure.account_id, failure.error);
                }
            }
        }
    }

    let cleanup = &report.cleanup;
    println!();
    println!("🧹 CLEANUP");
    println!("  Accounts deleted: {}", cleanup.accounts_deleted);
    if let Some(file) = cleanup.file {
        println!("  CSV file:         {file:?}");
    }
    if let Some(branch) = cleanup.branch {
        println!("  Side branch:      {branch:?}");
    }
    for failure in &cleanup.failures {
        println!("  ⚠️  {failure}");
    }
    println!();
}
