// ✅ Form Validation - field format and cross-field checks
//
// Draft: only check the format of fields the traveler already filled.
// Submission: additionally require every field the destination needs and
// enforce cross-field rules (passport validity, date ordering).

use crate::completion::compute_completion;
use crate::destinations::Destination;
use crate::entry::EntryInfo;
use regex::Regex;
use std::sync::LazyLock;

static PASSPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{6,12}$").unwrap());
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{5,15}$").unwrap());
static FLIGHT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{2}[0-9]{1,4}[A-Z]?$").unwrap());

// ============================================================================
// CONTEXT & ERRORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationContext {
    Draft,
    Submission,
}

impl ValidationContext {
    pub fn name(&self) -> &str {
        match self {
            ValidationContext::Draft => "Draft",
            ValidationContext::Submission => "Submission",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub context: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>, context: ValidationContext) -> Self {
        ValidationError {
            field: field.to_string(),
            message: message.into(),
            context: context.name().to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), Vec<ValidationError>>;

// ============================================================================
// FIELD CHECKS
// ============================================================================

/// Normalize a free-text code (passport, flight): trim, drop spaces, uppercase
pub fn normalize_code(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

pub fn is_valid_passport_number(value: &str) -> bool {
    PASSPORT_RE.is_match(&normalize_code(value))
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

/// Digits only after removing spaces, dashes and a leading '+'
pub fn is_valid_phone(value: &str) -> bool {
    let digits: String = value
        .trim()
        .trim_start_matches('+')
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();
    PHONE_RE.is_match(&digits)
}

pub fn is_valid_flight_number(value: &str) -> bool {
    FLIGHT_RE.is_match(&normalize_code(value))
}

fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// ENTRY VALIDATION
// ============================================================================

pub fn validate_entry_info(
    info: &EntryInfo,
    destination: &Destination,
    context: ValidationContext,
) -> ValidationResult {
    let mut errors = Vec::new();

    // Format checks on whatever is filled
    if let Some(number) = filled(&info.passport.passport_number) {
        if !is_valid_passport_number(number) {
            errors.push(ValidationError::new(
                "passport.passport_number",
                "Must be 6-12 letters or digits",
                context,
            ));
        }
    }

    if let Some(email) = filled(&info.personal_info.email) {
        if !is_valid_email(email) {
            errors.push(ValidationError::new(
                "personal_info.email",
                format!("Invalid email address: {}", email),
                context,
            ));
        }
    }

    if let Some(phone) = filled(&info.personal_info.phone_number) {
        if !is_valid_phone(phone) {
            errors.push(ValidationError::new(
                "personal_info.phone_number",
                "Must contain 5-15 digits",
                context,
            ));
        }
    }

    for (field, value) in [
        ("travel.arrival_flight_number", &info.travel.arrival_flight_number),
        ("travel.departure_flight_number", &info.travel.departure_flight_number),
    ] {
        if let Some(flight) = filled(value) {
            if !is_valid_flight_number(flight) {
                errors.push(ValidationError::new(
                    field,
                    format!("Invalid flight number: {}", flight),
                    context,
                ));
            }
        }
    }

    for (i, fund) in info.funds.iter().enumerate() {
        if fund.amount.map_or(false, |a| a < 0.0 || !a.is_finite()) {
            errors.push(ValidationError::new(
                &format!("funds[{}].amount", i),
                "Must be a non-negative number",
                context,
            ));
        }
    }

    if let (Some(dob), Some(expiry)) = (info.passport.date_of_birth, info.passport.expiry_date) {
        if expiry <= dob {
            errors.push(ValidationError::new(
                "passport.expiry_date",
                "Must be after date of birth",
                context,
            ));
        }
    }

    if let (Some(arrival), Some(departure)) = (info.travel.arrival_date, info.travel.departure_date) {
        if departure < arrival {
            errors.push(ValidationError::new(
                "travel.departure_date",
                "Must not be before the arrival date",
                context,
            ));
        }
    }

    if context == ValidationContext::Submission {
        // Every required field present
        let completion = compute_completion(info, destination);
        for missing in completion.missing_fields() {
            errors.push(ValidationError::new(&missing, "Required field is empty", context));
        }

        // Passport must still be valid when leaving (or arriving, if no departure)
        let last_day = info.travel.departure_date.or(info.travel.arrival_date);
        if let (Some(expiry), Some(last_day)) = (info.passport.expiry_date, last_day) {
            if expiry < last_day {
                errors.push(ValidationError::new(
                    "passport.expiry_date",
                    format!("Passport expires before the trip ends ({})", last_day),
                    context,
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::tests::complete_thailand_entry;
    use crate::destinations::DestinationRegistry;
    use crate::entry::{FundItem, FundType};
    use chrono::NaiveDate;

    #[test]
    fn test_field_formats() {
        assert!(is_valid_passport_number("e1234 5678"));
        assert!(!is_valid_passport_number("E12"));
        assert!(!is_valid_passport_number("E1234-5678"));

        assert!(is_valid_email("li.ming@example.com"));
        assert!(!is_valid_email("li.ming@example"));

        assert!(is_valid_phone("+86 138-0013-8000"));
        assert!(!is_valid_phone("12ab"));

        assert!(is_valid_flight_number("TG665"));
        assert!(is_valid_flight_number("mh 370"));
        assert!(is_valid_flight_number("3K521"));
        assert!(!is_valid_flight_number("THAI"));
    }

    #[test]
    fn test_complete_entry_passes_submission() {
        let registry = DestinationRegistry::new();
        let th = registry.find("TH").unwrap();
        assert!(validate_entry_info(&complete_thailand_entry(), th, ValidationContext::Submission).is_ok());
    }

    #[test]
    fn test_draft_ignores_missing_fields() {
        let registry = DestinationRegistry::new();
        let th = registry.find("TH").unwrap();
        let info = EntryInfo::new("traveler-1", "TH");

        assert!(validate_entry_info(&info, th, ValidationContext::Draft).is_ok());

        let errors = validate_entry_info(&info, th, ValidationContext::Submission).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "passport.passport_number"));
        assert!(errors.iter().all(|e| e.context == "Submission"));
    }

    #[test]
    fn test_draft_checks_formats() {
        let registry = DestinationRegistry::new();
        let th = registry.find("TH").unwrap();
        let mut info = EntryInfo::new("traveler-1", "TH");
        info.personal_info.email = Some("not-an-email".to_string());
        info.funds.push(FundItem::new(FundType::Cash, Some(-10.0), Some("THB")));

        let errors = validate_entry_info(&info, th, ValidationContext::Draft).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["personal_info.email", "funds[0].amount"]);
        assert_eq!(
            errors[0].to_string(),
            "[Draft] personal_info.email: Invalid email address: not-an-email"
        );
    }

    #[test]
    fn test_cross_field_rules() {
        let registry = DestinationRegistry::new();
        let th = registry.find("TH").unwrap();
        let mut info = complete_thailand_entry();

        info.travel.departure_date = NaiveDate::from_ymd_opt(2026, 10, 30);
        info.passport.expiry_date = NaiveDate::from_ymd_opt(2026, 11, 1);

        let errors = validate_entry_info(&info, th, ValidationContext::Submission).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"travel.departure_date"));
        // Departure (Oct 30) is before expiry, so only the ordering rule fires
        assert!(!fields.contains(&"passport.expiry_date"));

        info.travel.departure_date = NaiveDate::from_ymd_opt(2026, 11, 9);
        let errors = validate_entry_info(&info, th, ValidationContext::Submission).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "passport.expiry_date");
    }
}
