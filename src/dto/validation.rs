//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a value contains at least one non-whitespace character.
///
/// # Examples
///
/// ```ignore
/// validate_not_blank("5")   // Ok
/// validate_not_blank("  ")  // Err
/// ```
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("5").is_ok());
        assert!(validate_not_blank(" XL ").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank(" \t\n").is_err());
    }
}
