// Validation utilities module
// Custom field validators used by the request DTOs

use validator::ValidationError;

/// Rejects empty and whitespace-only values
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("must_not_be_blank"))
    } else {
        Ok(())
    }
}
