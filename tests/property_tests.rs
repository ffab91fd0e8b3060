// Property-based tests for batch generation and the CSV transforms.

use account_roundtrip::csv_pipeline::{self, CountryPhoneGenerator};
use account_roundtrip::factory::{validate_batch, AccountFactory};
use account_roundtrip::models::{Account, Country, RunId};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;
use std::collections::HashSet;

fn country_strategy() -> impl Strategy<Value = Country> {
    prop::sample::select(Country::ALL.to_vec())
}

// Names with the characters that force CSV quoting.
fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ,\"'-]{1,24}"
}

fn account_strategy() -> impl Strategy<Value = Account> {
    (
        "[0-9A-Za-z]{0,18}",
        name_strategy(),
        country_strategy(),
        0u32..100_000,
    )
        .prop_map(|(id, name, country, employees)| {
            Account::builder()
                .id(id)
                .name(name)
                .country(country.code())
                .employees(employees)
                .build()
        })
}

proptest! {
    #[test]
    fn prop_factory_batches_satisfy_business_rules(count in 0usize..60, seed in any::<u64>()) {
        let factory = AccountFactory::new(RunId::new("prop-run"));
        let mut rng = StdRng::seed_from_u64(seed);
        let accounts = factory.build_with_rng(count, &mut rng).unwrap();

        prop_assert_eq!(accounts.len(), count);
        let pairs: HashSet<_> = accounts.iter().map(|a| (&a.name, &a.country)).collect();
        prop_assert_eq!(pairs.len(), count);
        for account in &accounts {
            if account.is_us() {
                prop_assert!(account.employee_count > 100);
            } else {
                prop_assert!(account.employee_count < 150);
            }
            prop_assert!(account.name.starts_with("AutoAcct-prop-run-"));
            prop_assert!(account.id.is_empty());
        }
        prop_assert!(validate_batch(&accounts).is_ok());
    }

    #[test]
    fn prop_export_then_parse_recovers_base_columns(
        accounts in prop::collection::vec(account_strategy(), 0..20)
    ) {
        let csv = csv_pipeline::export(&accounts).unwrap();
        let text = String::from_utf8(csv.clone()).unwrap();
        prop_assert!(text.starts_with("Id,Name,Country,NumberOfEmployees\n"));

        let parsed = csv_pipeline::parse(&csv).unwrap();
        prop_assert_eq!(parsed, accounts);
    }

    #[test]
    fn prop_augmented_phones_match_country_format(
        accounts in prop::collection::vec(account_strategy(), 1..20),
        seed in any::<u64>(),
    ) {
        let us = Regex::new(r"^\+1\d{10}$").unwrap();
        let fr = Regex::new(r"^\+33\d{9}$").unwrap();

        let csv = csv_pipeline::export(&accounts).unwrap();
        let mut phones = CountryPhoneGenerator::with_rng(StdRng::seed_from_u64(seed));
        let augmented = csv_pipeline::augment_with_phone_using(&csv, &mut phones).unwrap();
        let rows = csv_pipeline::parse(&augmented).unwrap();

        prop_assert_eq!(rows.len(), accounts.len());
        for (row, original) in rows.iter().zip(&accounts) {
            let phone = row.phone.as_deref().unwrap();
            prop_assert!(csv_pipeline::is_valid_e164(phone));
            prop_assert_eq!(&row.id, &original.id);
            prop_assert_eq!(&row.name, &original.name);
            match row.country.as_str() {
                "US" => prop_assert!(us.is_match(phone), "{}", phone),
                "FR" => prop_assert!(fr.is_match(phone), "{}", phone),
                _ => {}
            }
        }
    }
}
