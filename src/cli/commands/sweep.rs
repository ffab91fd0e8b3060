use anyhow::{Context, Result};

use super::Command;
use crate::config::AccountRoundtripConfig;
use crate::crm::{CrmClient, SalesforceClient};
use crate::factory::AccountFactory;
use crate::workflows::sweep_by_prefix;

pub struct SweepCommand {
    pub config: AccountRoundtripConfig,
    pub prefix: Option<String>,
}

impl SweepCommand {
    pub fn new(config: AccountRoundtripConfig) -> Self {
        Self {
            config,
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix;
        self
    }
}

impl Command for SweepCommand {
    async fn execute(&self) -> Result<()> {
        let prefix = match &self.prefix {
            Some(prefix) if !prefix.trim().is_empty() => prefix.trim().to_string(),
            _ => AccountFactory::new(self.config.run_id()).name_prefix(),
        };

        println!("🧹 Sweeping CRM accounts named '{prefix}*'");
        let crm = SalesforceClient::from_config(&self.config.salesforce, self.config.http_timeout())
            .context("Salesforce client is not configured")?;
        crm.authenticate().await?;

        let report = sweep_by_prefix(&crm, &prefix).await?;
        println!("✅ Deleted {} account(s)", report.accounts_deleted);
        for failure in &report.failures {
            println!("  ⚠️  {failure}");
        }
        Ok(())
    }
}
