use anyhow::Result;

pub mod config;
pub mod generate;
pub mod run;
pub mod sweep;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

pub async fn show_how_to_get_started() -> Result<()> {
    println!("🔁 Account Round Trip - CRM + GitHub workflow check");
    println!();
    println!("To get started:");
    println!("  🧪 account-roundtrip run --offline   # Full pipeline against in-memory services");
    println!("  🚀 account-roundtrip run             # Full pipeline against Salesforce + GitHub");
    println!("  📄 account-roundtrip generate        # Print a generated batch as CSV");
    println!();
    println!("Maintenance:");
    println!("  🧹 account-roundtrip sweep           # Delete accounts left by crashed runs");
    println!("  ⚙️  account-roundtrip config          # Show effective configuration");
    println!();
    println!("💡 Credentials come from SF_* and GITHUB_* variables or account-roundtrip.toml");
    Ok(())
}
