use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Country codes the record factory knows how to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Country {
    US,
    GB,
    DE,
    FR,
    UA,
}

impl Country {
    /// Fixed generation order; the factory cycles through it by index.
    pub const ALL: [Country; 5] = [Country::US, Country::GB, Country::DE, Country::FR, Country::UA];

    pub fn code(&self) -> &'static str {
        match self {
            Country::US => "US",
            Country::GB => "GB",
            Country::DE => "DE",
            Country::FR => "FR",
            Country::UA => "UA",
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Country {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Country::ALL
            .iter()
            .copied()
            .find(|c| c.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unsupported country code: {s}"))
    }
}

/// A CRM account record as it moves through the round trip.
///
/// `id` stays empty until the CRM assigns one on create. `country` is kept as
/// the raw code so files carrying codes outside [`Country::ALL`] still parse.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub country: String,
    pub employee_count: u32,
    pub phone: Option<String>,
}

impl Account {
    pub fn builder() -> AccountBuilder {
        AccountBuilder::default()
    }

    pub fn is_us(&self) -> bool {
        self.country.eq_ignore_ascii_case(Country::US.code())
    }

    /// Fields sent to the CRM when the account is created.
    pub fn to_fields(&self) -> AccountFields {
        AccountFields {
            name: Some(self.name.clone()),
            billing_country: Some(self.country.clone()),
            number_of_employees: Some(self.employee_count),
            phone: self.phone.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct AccountBuilder {
    account: Account,
}

impl AccountBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.account.id = id.into();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.account.name = name.into();
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.account.country = country.into();
        self
    }

    pub fn employees(mut self, employees: u32) -> Self {
        self.account.employee_count = employees;
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.account.phone = Some(phone.into());
        self
    }

    pub fn build(self) -> Account {
        self.account
    }
}

/// CRM sObject field payload. Absent fields are left out of the request body,
/// so the same type serves creates and partial updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFields {
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "BillingCountry", skip_serializing_if = "Option::is_none")]
    pub billing_country: Option<String>,
    #[serde(rename = "NumberOfEmployees", skip_serializing_if = "Option::is_none")]
    pub number_of_employees: Option<u32>,
    #[serde(rename = "Phone", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl AccountFields {
    pub fn phone_only(phone: impl Into<String>) -> Self {
        Self {
            phone: Some(phone.into()),
            ..Default::default()
        }
    }
}

/// Record shape returned by CRM queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmRecord {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "BillingCountry", default)]
    pub billing_country: Option<String>,
    #[serde(rename = "NumberOfEmployees", default)]
    pub number_of_employees: Option<u32>,
    #[serde(rename = "Phone", default)]
    pub phone: Option<String>,
}

/// Namespace token stamped on every name, path and branch a run creates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// A non-blank override wins; otherwise `<prefix>-<yyyymmdd>-autotest`.
    pub fn resolve(override_value: Option<&str>, prefix: &str, today: NaiveDate) -> Self {
        match override_value.map(str::trim) {
            Some(v) if !v.is_empty() => Self(v.to_string()),
            _ => Self(format!("{}-{}-autotest", prefix, today.format("%Y%m%d"))),
        }
    }

    pub fn resolve_today(override_value: Option<&str>, prefix: &str) -> Self {
        Self::resolve(override_value, prefix, Local::now().date_naive())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sortable numeric timestamp used in file and branch names.
pub fn run_timestamp() -> String {
    Local::now().format("%Y%m%d%H%M%S").to_string()
}

/// SCM-side resources a run may create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceHandle {
    pub branch_name: Option<String>,
    pub file_path: Option<String>,
}

impl ResourceHandle {
    pub fn file_path_for(namespace: &str, run_id: &RunId, timestamp: &str) -> String {
        format!(
            "{}/accounts-{}-{}.csv",
            namespace.trim_end_matches('/'),
            run_id,
            timestamp
        )
    }

    pub fn branch_name_for(run_id: &RunId, timestamp: &str) -> String {
        format!("phones-{run_id}-{timestamp}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_override_is_trimmed() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let id = RunId::resolve(Some("  ci-42 "), "roundtrip", today);
        assert_eq!(id.as_str(), "ci-42");
    }

    #[test]
    fn test_run_id_blank_override_falls_back_to_date() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(
            RunId::resolve(Some("   "), "roundtrip", today).as_str(),
            "roundtrip-20261019-autotest"
        );
        assert_eq!(
            RunId::resolve(None, "rei", today).as_str(),
            "rei-20261019-autotest"
        );
    }

    #[test]
    fn test_file_path_convention() {
        let run = RunId::new("r1");
        assert_eq!(
            ResourceHandle::file_path_for("data-autotest/", &run, "20261019101500"),
            "data-autotest/accounts-r1-20261019101500.csv"
        );
        assert_eq!(
            ResourceHandle::branch_name_for(&run, "20261019101500"),
            "phones-r1-20261019101500"
        );
    }

    #[test]
    fn test_phone_only_fields_serialize_minimal_body() {
        let body = serde_json::to_value(AccountFields::phone_only("+15551234567")).unwrap();
        assert_eq!(body, serde_json::json!({"Phone": "+15551234567"}));
    }

    #[test]
    fn test_country_parse_is_case_insensitive() {
        assert_eq!("fr".parse::<Country>().unwrap(), Country::FR);
        assert!("BR".parse::<Country>().is_err());
    }
}
