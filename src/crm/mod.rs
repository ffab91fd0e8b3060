pub mod client;
pub mod errors;

use async_trait::async_trait;

use crate::models::{AccountFields, CrmRecord};

pub use client::SalesforceClient;
pub use errors::CrmError;

/// Access to the remote business-record system.
///
/// Updates treat a missing record as a failure; deletes treat it as success.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CrmClient: Send + Sync {
    async fn authenticate(&self) -> Result<(), CrmError>;

    /// Create an account and return the id the CRM assigned.
    async fn create_account(&self, fields: &AccountFields) -> Result<String, CrmError>;

    async fn update_account(&self, id: &str, fields: &AccountFields) -> Result<(), CrmError>;

    async fn delete_account(&self, id: &str) -> Result<(), CrmError>;

    async fn query_by_name_prefix(&self, prefix: &str) -> Result<Vec<CrmRecord>, CrmError>;
}
