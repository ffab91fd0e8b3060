use rand::Rng;
use regex::Regex;
use std::sync::LazyLock;

static E164: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+[1-9]\d{7,14}$").expect("E.164 pattern is a valid regex")
});

/// `+` followed by 8 to 15 digits, the first one non-zero.
pub fn is_valid_e164(phone: &str) -> bool {
    E164.is_match(phone)
}

/// Dialing prefix plus a fixed count of random national digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhoneFormat {
    pub prefix: &'static str,
    pub digits: usize,
}

pub const DEFAULT_FORMAT: PhoneFormat = PhoneFormat { prefix: "+1", digits: 10 };

const FORMATS: &[(&str, PhoneFormat)] = &[
    ("US", PhoneFormat { prefix: "+1", digits: 10 }),
    ("GB", PhoneFormat { prefix: "+44", digits: 10 }),
    ("DE", PhoneFormat { prefix: "+49", digits: 10 }),
    ("FR", PhoneFormat { prefix: "+33", digits: 9 }),
    ("UA", PhoneFormat { prefix: "+380", digits: 9 }),
];

/// Format for a country code; unknown codes get [`DEFAULT_FORMAT`].
pub fn format_for(country: &str) -> PhoneFormat {
    FORMATS
        .iter()
        .find(|(code, _)| *code == country)
        .map(|(_, format)| *format)
        .unwrap_or(DEFAULT_FORMAT)
}

/// Strategy that supplies a phone number for a given country code.
pub trait PhoneSource {
    fn phone_for(&mut self, country: &str) -> String;
}

/// Default strategy: country table lookup with random digits.
#[derive(Debug)]
pub struct CountryPhoneGenerator<R: Rng> {
    rng: R,
}

impl CountryPhoneGenerator<rand::rngs::ThreadRng> {
    pub fn new() -> Self {
        Self { rng: rand::rng() }
    }
}

impl Default for CountryPhoneGenerator<rand::rngs::ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> CountryPhoneGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> PhoneSource for CountryPhoneGenerator<R> {
    fn phone_for(&mut self, country: &str) -> String {
        let format = format_for(country);
        let mut phone = String::with_capacity(format.prefix.len() + format.digits);
        phone.push_str(format.prefix);
        for _ in 0..format.digits {
            let digit = self.rng.random_range(0..10u8);
            phone.push(char::from(b'0' + digit));
        }
        phone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_e164_bounds() {
        assert!(is_valid_e164("+12345678"));
        assert!(is_valid_e164("+123456789012345"));
        assert!(!is_valid_e164("+1234567"));
        assert!(!is_valid_e164("+1234567890123456"));
        assert!(!is_valid_e164("+0123456789"));
        assert!(!is_valid_e164("15551234567"));
        assert!(!is_valid_e164("+1 555 123 4567"));
        assert!(!is_valid_e164(""));
    }

    #[test]
    fn test_generated_numbers_follow_country_table() {
        let mut generator = CountryPhoneGenerator::new();
        let us = Regex::new(r"^\+1\d{10}$").unwrap();
        let fr = Regex::new(r"^\+33\d{9}$").unwrap();
        let ua = Regex::new(r"^\+380\d{9}$").unwrap();

        for _ in 0..20 {
            assert!(us.is_match(&generator.phone_for("US")));
            assert!(fr.is_match(&generator.phone_for("FR")));
            assert!(ua.is_match(&generator.phone_for("UA")));
        }
    }

    #[test]
    fn test_unknown_country_uses_default_format() {
        assert_eq!(format_for("BR"), DEFAULT_FORMAT);
        let phone = CountryPhoneGenerator::new().phone_for("BR");
        assert!(phone.starts_with("+1"));
        assert_eq!(phone.len(), 12);
    }

    #[test]
    fn test_every_table_format_is_valid_e164() {
        let mut generator = CountryPhoneGenerator::new();
        for (code, _) in FORMATS {
            assert!(is_valid_e164(&generator.phone_for(code)), "bad format for {code}");
        }
    }
}
