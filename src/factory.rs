use rand::Rng;
use std::collections::HashSet;
use std::ops::Range;
use thiserror::Error;
use tracing::debug;

use crate::models::{Account, Country, RunId};

pub const NAME_PREFIX: &str = "AutoAcct";

/// Employee count range for US accounts. Lower bound stays above the
/// business rule's 100 so every draw passes validation.
pub const US_EMPLOYEES: Range<u32> = 150..500;
/// Employee count range for every other country.
pub const OTHER_EMPLOYEES: Range<u32> = 20..120;

/// A generated batch broke a business rule. Raised before anything is sent
/// to the CRM.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintViolation {
    #[error("duplicate Name+Country pair: {name}|{country}")]
    DuplicateNameCountry { name: String, country: String },

    #[error("US account must have NumberOfEmployees > 100: {name} has {employees}")]
    UsEmployeeCount { name: String, employees: u32 },
}

/// Builds batches of synthetic accounts namespaced by a run identifier.
#[derive(Debug, Clone)]
pub struct AccountFactory {
    run_id: RunId,
}

impl AccountFactory {
    pub fn new(run_id: RunId) -> Self {
        Self { run_id }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Prefix shared by every account name this factory produces.
    pub fn name_prefix(&self) -> String {
        format!("{}-{}", NAME_PREFIX, self.run_id)
    }

    pub fn build(&self, count: usize) -> Result<Vec<Account>, ConstraintViolation> {
        self.build_with_rng(count, &mut rand::rng())
    }

    pub fn build_with_rng<R: Rng>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Account>, ConstraintViolation> {
        let accounts: Vec<Account> = (0..count).map(|idx| self.build_single(idx, rng)).collect();
        validate_batch(&accounts)?;
        debug!(run_id = %self.run_id, count = accounts.len(), "Generated account batch");
        Ok(accounts)
    }

    fn build_single<R: Rng>(&self, idx: usize, rng: &mut R) -> Account {
        let country = Country::ALL[idx % Country::ALL.len()];
        let employees = match country {
            Country::US => rng.random_range(US_EMPLOYEES),
            _ => rng.random_range(OTHER_EMPLOYEES),
        };
        let suffix = uuid::Uuid::new_v4().simple().to_string();

        Account::builder()
            .name(format!("{}-{}", self.name_prefix(), &suffix[..8]))
            .country(country.code())
            .employees(employees)
            .build()
    }
}

/// Check the batch-level business rules: (name, country) pairs are unique
/// and every US account has more than 100 employees.
pub fn validate_batch(accounts: &[Account]) -> Result<(), ConstraintViolation> {
    let mut seen = HashSet::with_capacity(accounts.len());

    for account in accounts {
        if !seen.insert((account.name.as_str(), account.country.as_str())) {
            return Err(ConstraintViolation::DuplicateNameCountry {
                name: account.name.clone(),
                country: account.country.clone(),
            });
        }
        if account.is_us() && account.employee_count <= 100 {
            return Err(ConstraintViolation::UsEmployeeCount {
                name: account.name.clone(),
                employees: account.employee_count,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> AccountFactory {
        AccountFactory::new(RunId::new("unit-run"))
    }

    #[test]
    fn test_build_returns_requested_count() {
        let accounts = factory().build(12).unwrap();
        assert_eq!(accounts.len(), 12);
        assert!(accounts.iter().all(|a| a.id.is_empty() && a.phone.is_none()));
    }

    #[test]
    fn test_countries_cycle_in_fixed_order() {
        let accounts = factory().build(7).unwrap();
        let countries: Vec<&str> = accounts.iter().map(|a| a.country.as_str()).collect();
        assert_eq!(countries, vec!["US", "GB", "DE", "FR", "UA", "US", "GB"]);
    }

    #[test]
    fn test_employee_ranges() {
        for account in factory().build(50).unwrap() {
            if account.is_us() {
                assert!(account.employee_count > 100);
            } else {
                assert!(account.employee_count < 150);
            }
        }
    }

    #[test]
    fn test_names_embed_run_id() {
        let accounts = factory().build(3).unwrap();
        for account in &accounts {
            assert!(account.name.starts_with("AutoAcct-unit-run-"));
            assert_eq!(account.name.len(), "AutoAcct-unit-run-".len() + 8);
        }
    }

    #[test]
    fn test_validate_rejects_duplicate_pair() {
        let a = Account::builder().name("A").country("GB").employees(30).build();
        let err = validate_batch(&[a.clone(), a]).unwrap_err();
        assert!(matches!(err, ConstraintViolation::DuplicateNameCountry { .. }));
    }

    #[test]
    fn test_validate_allows_same_name_in_other_country() {
        let a = Account::builder().name("A").country("GB").employees(30).build();
        let b = Account::builder().name("A").country("DE").employees(30).build();
        assert!(validate_batch(&[a, b]).is_ok());
    }

    #[test]
    fn test_validate_rejects_small_us_account() {
        let a = Account::builder().name("A").country("US").employees(100).build();
        assert_eq!(
            validate_batch(&[a]).unwrap_err(),
            ConstraintViolation::UsEmployeeCount {
                name: "A".to_string(),
                employees: 100
            }
        );
    }
}
