use anyhow::{Context, Result};
use std::io::Write;

use super::Command;
use crate::config::AccountRoundtripConfig;
use crate::csv_pipeline;
use crate::factory::AccountFactory;

pub struct GenerateCommand {
    pub config: AccountRoundtripConfig,
    pub count: Option<usize>,
}

impl GenerateCommand {
    pub fn new(config: AccountRoundtripConfig) -> Self {
        Self {
            config,
            count: None,
        }
    }

    pub fn with_count(mut self, count: Option<usize>) -> Self {
        self.count = count;
        self
    }
}

impl Command for GenerateCommand {
    async fn execute(&self) -> Result<()> {
        let count = self.count.unwrap_or(self.config.workflow.account_count);
        let accounts = AccountFactory::new(self.config.run_id())
            .build(count)
            .context("generated batch violates account rules")?;
        let csv = csv_pipeline::export(&accounts)?;

        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&csv)?;
        stdout.flush()?;
        Ok(())
    }
}
