// Validation utilities module
// Provides custom validation functions for domain-specific rules

use validator::ValidationError;

/// Validates a coupon code: 3 to 30 characters of letters, digits, '-' or '_'
/// Case is ignored; codes are stored upper-cased
pub fn validate_coupon_code(code: &str) -> Result<(), ValidationError> {
    let code = code.trim();
    let valid_chars = code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if (3..=30).contains(&code.len()) && valid_chars {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_coupon_code"))
    }
}

/// Validates that a string contains something other than whitespace
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("must_not_be_blank"))
    } else {
        Ok(())
    }
}

/// Validates a phone number: 7 to 15 digits, optionally prefixed with '+'
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.trim().strip_prefix('+').unwrap_or(phone.trim());
    if (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_phone"))
    }
}

/// Canonical form of a coupon code
pub fn normalize_coupon_code(code: &str) -> String {
    code.trim().to_uppercase()
}
