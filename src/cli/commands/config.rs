use anyhow::Result;
use std::path::PathBuf;

use super::Command;
use crate::config::AccountRoundtripConfig;

pub struct ConfigCommand {
    pub config: AccountRoundtripConfig,
    pub write: Option<PathBuf>,
}

impl ConfigCommand {
    pub fn new(config: AccountRoundtripConfig) -> Self {
        Self {
            config,
            write: None,
        }
    }

    pub fn with_write(mut self, path: Option<PathBuf>) -> Self {
        self.write = path;
        self
    }

    /// Effective configuration with secrets masked, for display.
    fn redacted(&self) -> AccountRoundtripConfig {
        let mut shown = self.config.clone();
        for secret in [
            &mut shown.salesforce.client_secret,
            &mut shown.github.token,
        ] {
            if secret.is_some() {
                *secret = Some("***".to_string());
            }
        }
        shown
    }
}

impl Command for ConfigCommand {
    async fn execute(&self) -> Result<()> {
        match &self.write {
            Some(path) => {
                self.config.save_to_file(path)?;
                println!("✅ Configuration written to {}", path.display());
            }
            None => {
                println!("# run id: {}", self.config.run_id());
                print!("{}", toml::to_string_pretty(&self.redacted())?);
            }
        }
        Ok(())
    }
}
