/// Unit tests for the contact field validators
/// Covers email, phone and website heuristics and the per-lead verification patch
use ritter_leads_api::models::NewLead;
use ritter_leads_api::validation::{
    is_valid_email, is_valid_phone, is_valid_website, validate_field, verify_lead, FieldKind,
};

#[cfg(test)]
mod email_validation_tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("test.user@example.com"));
        assert!(is_valid_email("user+tag@example.co.uk"));
        assert!(is_valid_email("a@b.c"));
    }

    #[test]
    fn test_permissive_by_design() {
        // Only "@" plus a "." after the last "@" is required
        assert!(is_valid_email("@example.com"));
        assert!(is_valid_email("a@@b.c"));
        assert!(is_valid_email("spaces are@fine.ok"));
        assert!(is_valid_email("a@."));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("userexample.com"));
        assert!(!is_valid_email("user@examplecom"));
        assert!(!is_valid_email("user@"));
        // The dot must follow the last "@"
        assert!(!is_valid_email("first.last@host@intranet"));
    }
}

#[cfg(test)]
mod phone_validation_tests {
    use super::*;

    #[test]
    fn test_nine_digits_is_the_threshold() {
        assert!(is_valid_phone("912345678"));
        assert!(!is_valid_phone("91234567"));
    }

    #[test]
    fn test_formatting_is_ignored() {
        assert!(is_valid_phone("+34 912-345-678"));
        assert!(is_valid_phone("(11) 98765-4321"));
        assert!(is_valid_phone("tel: 600.000.000"));
        assert!(!is_valid_phone("call me maybe"));
        assert!(!is_valid_phone(""));
    }
}

#[cfg(test)]
mod website_validation_tests {
    use super::*;

    #[test]
    fn test_accepted_prefixes() {
        assert!(is_valid_website("http://example.com"));
        assert!(is_valid_website("https://example.com/path"));
        assert!(is_valid_website("www.example.com"));
    }

    #[test]
    fn test_rejected_values() {
        assert!(!is_valid_website("example.com"));
        assert!(!is_valid_website("ftp://example.com"));
        assert!(!is_valid_website(" https://example.com"));
        assert!(!is_valid_website(""));
    }
}

#[cfg(test)]
mod lead_verification_tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_validate_field_reports_value() {
        let result = validate_field(FieldKind::Website, "www.ritter.es");
        assert_eq!(result.field, FieldKind::Website);
        assert_eq!(result.value, "www.ritter.es");
        assert!(result.valid);
    }

    #[test]
    fn test_only_requested_kinds_are_checked() {
        let lead = NewLead {
            email: Some("nope".to_string()),
            phone: Some("600 000 000".to_string()),
            company_website: Some("https://acme.es".to_string()),
            ..NewLead::new("Acme", "Retail")
        }
        .into_lead(Uuid::new_v4(), Utc::now());

        let (results, changes) = verify_lead(&lead, &[FieldKind::Phone]);

        assert_eq!(results.len(), 1);
        assert_eq!(changes.verified_phone, Some(true));
        assert_eq!(changes.verified_email, None);
        assert_eq!(changes.verified_website, None);
    }

    #[test]
    fn test_invalid_values_clear_the_flag() {
        let lead = NewLead {
            email: Some("nope".to_string()),
            verified_email: true,
            ..NewLead::new("Acme", "Retail")
        }
        .into_lead(Uuid::new_v4(), Utc::now());

        let (_, changes) = verify_lead(&lead, &[FieldKind::Email]);
        assert_eq!(changes.verified_email, Some(false));
    }
}
