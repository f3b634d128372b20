//! Field validators for lead contact data.
//!
//! These are deliberately permissive heuristics, not format parsers:
//! - email: an `@`, and a `.` somewhere after the last `@`
//! - phone: at least 9 digits once everything else is stripped
//! - website: starts with `http://`, `https://` or `www.`
//!
//! "Invalid" is an ordinary `false`, never an error.

use crate::errors::AppError;
use crate::models::{Lead, LeadChanges};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum number of digits for a phone number to count as valid.
pub const MIN_PHONE_DIGITS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Email,
    Phone,
    Website,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Email => "email",
            FieldKind::Phone => "phone",
            FieldKind::Website => "website",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "email" => Ok(FieldKind::Email),
            "phone" => Ok(FieldKind::Phone),
            "website" => Ok(FieldKind::Website),
            other => Err(AppError::InvalidInput(format!(
                "Unknown validation type '{}'",
                other
            ))),
        }
    }
}

/// Per-field verdict. Transient; only the verified flag it implies is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub field: FieldKind,
    pub value: String,
    pub valid: bool,
}

pub fn is_valid_email(email: &str) -> bool {
    match email.rfind('@') {
        Some(at) => email[at + 1..].contains('.'),
        None => false,
    }
}

pub fn is_valid_phone(phone: &str) -> bool {
    phone.chars().filter(|c| c.is_ascii_digit()).count() >= MIN_PHONE_DIGITS
}

pub fn is_valid_website(website: &str) -> bool {
    website.starts_with("http://") || website.starts_with("https://") || website.starts_with("www.")
}

pub fn validate_field(kind: FieldKind, value: &str) -> ValidationResult {
    let valid = match kind {
        FieldKind::Email => is_valid_email(value),
        FieldKind::Phone => is_valid_phone(value),
        FieldKind::Website => is_valid_website(value),
    };
    ValidationResult {
        field: kind,
        value: value.to_string(),
        valid,
    }
}

/// Runs the requested validators over one lead.
///
/// Absent or empty values are not judged. Returns the individual verdicts and
/// the verified-flag patch they imply.
pub fn verify_lead(lead: &Lead, kinds: &[FieldKind]) -> (Vec<ValidationResult>, LeadChanges) {
    let mut results = Vec::new();
    let mut changes = LeadChanges::default();

    for kind in kinds {
        let value = match kind {
            FieldKind::Email => lead.email.as_deref(),
            FieldKind::Phone => lead.phone.as_deref(),
            FieldKind::Website => lead.company_website.as_deref(),
        };
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            continue;
        };

        let result = validate_field(*kind, value);
        match kind {
            FieldKind::Email => changes.verified_email = Some(result.valid),
            FieldKind::Phone => changes.verified_phone = Some(result.valid),
            FieldKind::Website => changes.verified_website = Some(result.valid),
        }
        results.push(result);
    }

    (results, changes)
}

/// Valid/invalid tallies for a validation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationCounts {
    pub valid_emails: u64,
    pub invalid_emails: u64,
    pub valid_phones: u64,
    pub invalid_phones: u64,
    pub valid_websites: u64,
    pub invalid_websites: u64,
}

impl ValidationCounts {
    pub fn record(&mut self, result: &ValidationResult) {
        let slot = match (result.field, result.valid) {
            (FieldKind::Email, true) => &mut self.valid_emails,
            (FieldKind::Email, false) => &mut self.invalid_emails,
            (FieldKind::Phone, true) => &mut self.valid_phones,
            (FieldKind::Phone, false) => &mut self.invalid_phones,
            (FieldKind::Website, true) => &mut self.valid_websites,
            (FieldKind::Website, false) => &mut self.invalid_websites,
        };
        *slot += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewLead;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn email_uses_the_last_at_sign() {
        assert!(is_valid_email("a@b.c"));
        assert!(is_valid_email("weird@name@example.com"));
        assert!(!is_valid_email("a.b@example"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("trailing@"));
    }

    #[test]
    fn phone_counts_digits_only() {
        assert!(is_valid_phone("+34 912 345 678"));
        assert!(is_valid_phone("123456789"));
        assert!(!is_valid_phone("12345678"));
        assert!(!is_valid_phone("(91) 234-56"));
    }

    #[test]
    fn website_checks_prefix_only() {
        assert!(is_valid_website("https://solar.es"));
        assert!(is_valid_website("http://x"));
        assert!(is_valid_website("www.solar.es"));
        assert!(!is_valid_website("solar.es"));
        assert!(!is_valid_website("HTTPS://SOLAR.ES"));
    }

    #[test]
    fn verify_lead_skips_absent_values() {
        let lead = NewLead {
            email: Some("info@solar.es".to_string()),
            phone: Some("123".to_string()),
            ..NewLead::new("Solar", "Energía")
        }
        .into_lead(Uuid::new_v4(), Utc::now());

        let (results, changes) = verify_lead(
            &lead,
            &[FieldKind::Email, FieldKind::Phone, FieldKind::Website],
        );

        assert_eq!(results.len(), 2);
        assert_eq!(changes.verified_email, Some(true));
        assert_eq!(changes.verified_phone, Some(false));
        assert_eq!(changes.verified_website, None);
    }

    #[test]
    fn counts_follow_results() {
        let mut counts = ValidationCounts::default();
        counts.record(&validate_field(FieldKind::Email, "x@y.z"));
        counts.record(&validate_field(FieldKind::Website, "ftp://x"));
        assert_eq!(counts.valid_emails, 1);
        assert_eq!(counts.invalid_websites, 1);
    }

    #[test]
    fn unknown_validation_type_is_rejected() {
        assert!("fax".parse::<FieldKind>().is_err());
        assert_eq!("phone".parse::<FieldKind>().unwrap(), FieldKind::Phone);
    }
}
