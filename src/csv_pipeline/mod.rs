//! Account <-> CSV transformations.
//!
//! All functions here are pure over byte buffers: UTF-8, comma-delimited,
//! header row first, standard quoting for embedded commas. Remote systems
//! never see anything but the bytes these functions produce.

pub mod phone;

use csv::{ReaderBuilder, StringRecord, Writer};
use thiserror::Error;
use tracing::debug;

use crate::models::Account;
pub use phone::{is_valid_e164, CountryPhoneGenerator, PhoneFormat, PhoneSource};

pub const HEADER: [&str; 4] = ["Id", "Name", "Country", "NumberOfEmployees"];
pub const HEADER_WITH_PHONE: [&str; 5] = ["Id", "Name", "Country", "NumberOfEmployees", "Phone"];

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("CSV codec error: {0}")]
    Codec(#[from] csv::Error),

    #[error("I/O error while writing CSV: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing required column: {0}")]
    MissingColumn(&'static str),

    #[error("row {row}: invalid {column} value '{value}'")]
    InvalidField {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: generated phone '{phone}' for country {country} is not E.164")]
    InvalidPhone {
        row: usize,
        country: String,
        phone: String,
    },
}

/// Column positions resolved from a header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    id: usize,
    name: usize,
    country: usize,
    employees: usize,
    phone: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self, CsvError> {
        let find = |column: &'static str| headers.iter().position(|h| h.trim() == column);
        let require = |column: &'static str| find(column).ok_or(CsvError::MissingColumn(column));

        Ok(Self {
            id: require("Id")?,
            name: require("Name")?,
            country: require("Country")?,
            employees: require("NumberOfEmployees")?,
            phone: find("Phone"),
        })
    }

    fn get<'r>(&self, record: &'r StringRecord, idx: usize) -> &'r str {
        record.get(idx).unwrap_or("")
    }
}

fn reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    ReaderBuilder::new().has_headers(true).from_reader(bytes)
}

/// Serialize accounts without the phone column.
pub fn export(accounts: &[Account]) -> Result<Vec<u8>, CsvError> {
    let mut buf = Vec::new();
    {
        let mut writer = Writer::from_writer(&mut buf);
        writer.write_record(HEADER)?;
        for account in accounts {
            let employees = account.employee_count.to_string();
            writer.write_record([
                account.id.as_str(),
                account.name.as_str(),
                account.country.as_str(),
                employees.as_str(),
            ])?;
        }
        writer.flush()?;
    }
    debug!(rows = accounts.len(), bytes = buf.len(), "Exported accounts to CSV");
    Ok(buf)
}

/// Parse accounts from a file with or without a trailing `Phone` column.
/// An empty phone cell reads as no phone.
pub fn parse(bytes: &[u8]) -> Result<Vec<Account>, CsvError> {
    let mut reader = reader(bytes);
    let columns = Columns::resolve(reader.headers()?)?;
    let mut accounts = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let row = idx + 1;
        let raw_employees = columns.get(&record, columns.employees);
        let employee_count =
            raw_employees
                .trim()
                .parse::<u32>()
                .map_err(|_| CsvError::InvalidField {
                    row,
                    column: "NumberOfEmployees",
                    value: raw_employees.to_string(),
                })?;
        let phone = columns
            .phone
            .map(|i| columns.get(&record, i))
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        accounts.push(Account {
            id: columns.get(&record, columns.id).to_string(),
            name: columns.get(&record, columns.name).to_string(),
            country: columns.get(&record, columns.country).to_string(),
            employee_count,
            phone,
        });
    }

    Ok(accounts)
}

/// Re-emit every row with the four base columns plus a generated `Phone`.
pub fn augment_with_phone(bytes: &[u8]) -> Result<Vec<u8>, CsvError> {
    augment_with_phone_using(bytes, &mut CountryPhoneGenerator::new())
}

/// Same as [`augment_with_phone`] with a caller-supplied phone strategy.
///
/// Every generated number is checked against E.164 and the first mismatch
/// fails the whole augmentation, so no partially valid file is produced.
pub fn augment_with_phone_using(
    bytes: &[u8],
    source: &mut dyn PhoneSource,
) -> Result<Vec<u8>, CsvError> {
    let mut reader = reader(bytes);
    let columns = Columns::resolve(reader.headers()?)?;
    let mut buf = Vec::new();
    let mut rows = 0;
    {
        let mut writer = Writer::from_writer(&mut buf);
        writer.write_record(HEADER_WITH_PHONE)?;

        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            let country = columns.get(&record, columns.country);
            let phone = source.phone_for(country);
            if !is_valid_e164(&phone) {
                return Err(CsvError::InvalidPhone {
                    row: idx + 1,
                    country: country.to_string(),
                    phone,
                });
            }
            writer.write_record([
                columns.get(&record, columns.id),
                columns.get(&record, columns.name),
                country,
                columns.get(&record, columns.employees),
                phone.as_str(),
            ])?;
            rows += 1;
        }
        writer.flush()?;
    }
    debug!(rows, "Augmented CSV with phone column");
    Ok(buf)
}

/// Replace the Id of the first data row, keeping every other cell as is.
/// A file with no data rows comes back unchanged.
pub fn corrupt_first_id(bytes: &[u8], replacement: &str) -> Result<Vec<u8>, CsvError> {
    let mut reader = reader(bytes);
    let headers = reader.headers()?.clone();
    let columns = Columns::resolve(&headers)?;
    let mut buf = Vec::new();
    {
        let mut writer = Writer::from_writer(&mut buf);
        writer.write_record(&headers)?;
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            if idx == 0 {
                let rewritten: StringRecord = record
                    .iter()
                    .enumerate()
                    .map(|(i, cell)| if i == columns.id { replacement } else { cell })
                    .collect();
                writer.write_record(&rewritten)?;
            } else {
                writer.write_record(&record)?;
            }
        }
        writer.flush()?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPhone(&'static str);

    impl PhoneSource for FixedPhone {
        fn phone_for(&mut self, _country: &str) -> String {
            self.0.to_string()
        }
    }

    fn sample() -> Vec<Account> {
        vec![
            Account::builder().id("001A").name("Acme, Inc").country("US").employees(150).build(),
            Account::builder().id("001B").name("Globex").country("FR").employees(42).build(),
        ]
    }

    #[test]
    fn test_export_header_and_quoting() {
        let text = String::from_utf8(export(&sample()).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Id,Name,Country,NumberOfEmployees");
        assert_eq!(lines[1], "001A,\"Acme, Inc\",US,150");
        assert_eq!(lines[2], "001B,Globex,FR,42");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_export_excludes_phone() {
        let mut accounts = sample();
        accounts[0].phone = Some("+15551234567".to_string());
        let text = String::from_utf8(export(&accounts).unwrap()).unwrap();
        assert!(!text.contains("Phone"));
        assert!(!text.contains("+1555"));
    }

    #[test]
    fn test_parse_without_phone_column() {
        let parsed = parse(&export(&sample()).unwrap()).unwrap();
        assert_eq!(parsed, sample());
        assert!(parsed.iter().all(|a| a.phone.is_none()));
    }

    #[test]
    fn test_parse_with_phone_column() {
        let input = b"Id,Name,Country,NumberOfEmployees,Phone\n1,A,US,120,+15550001111\n2,B,GB,30,\n";
        let parsed = parse(input).unwrap();
        assert_eq!(parsed[0].phone.as_deref(), Some("+15550001111"));
        assert_eq!(parsed[1].phone, None);
    }

    #[test]
    fn test_parse_rejects_bad_employee_count() {
        let err = parse(b"Id,Name,Country,NumberOfEmployees\n1,A,US,many\n").unwrap_err();
        assert!(matches!(
            err,
            CsvError::InvalidField { row: 1, column: "NumberOfEmployees", .. }
        ));
    }

    #[test]
    fn test_parse_requires_base_columns() {
        let err = parse(b"Id,Name,NumberOfEmployees\n1,A,12\n").unwrap_err();
        assert!(matches!(err, CsvError::MissingColumn("Country")));
    }

    #[test]
    fn test_augment_adds_valid_phone_per_row() {
        let augmented = augment_with_phone(&export(&sample()).unwrap()).unwrap();
        let text = String::from_utf8(augmented.clone()).unwrap();
        assert!(text.starts_with("Id,Name,Country,NumberOfEmployees,Phone\n"));

        let parsed = parse(&augmented).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed[0].phone.as_deref().unwrap().starts_with("+1"));
        assert!(parsed[1].phone.as_deref().unwrap().starts_with("+33"));
        assert!(parsed.iter().all(|a| is_valid_e164(a.phone.as_deref().unwrap())));
    }

    #[test]
    fn test_augment_fails_on_defective_strategy() {
        let err = augment_with_phone_using(&export(&sample()).unwrap(), &mut FixedPhone("555-0100"))
            .unwrap_err();
        assert!(matches!(err, CsvError::InvalidPhone { row: 1, .. }));
    }

    #[test]
    fn test_augment_replaces_existing_phone_column() {
        let input = b"Id,Name,Country,NumberOfEmployees,Phone\n1,A,DE,12,bogus\n";
        let out = augment_with_phone_using(input, &mut FixedPhone("+491234567890")).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Id,Name,Country,NumberOfEmployees,Phone\n1,A,DE,12,+491234567890\n"
        );
    }

    #[test]
    fn test_corrupt_first_id_only_touches_first_row() {
        let augmented =
            augment_with_phone_using(&export(&sample()).unwrap(), &mut FixedPhone("+15550001111"))
                .unwrap();
        let corrupted = parse(&corrupt_first_id(&augmented, "INVALID_ID").unwrap()).unwrap();
        assert_eq!(corrupted[0].id, "INVALID_ID");
        assert_eq!(corrupted[0].name, "Acme, Inc");
        assert_eq!(corrupted[1].id, "001B");
        assert_eq!(corrupted[0].phone.as_deref(), Some("+15550001111"));
    }

    #[test]
    fn test_corrupt_empty_file_is_noop() {
        let header_only = export(&[]).unwrap();
        assert_eq!(corrupt_first_id(&header_only, "X").unwrap(), header_only);
    }
}
