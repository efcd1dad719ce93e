//! Validation helpers for DTOs.

use validator::ValidationError;

/// Shortest username accepted at registration.
pub const USERNAME_MIN: usize = 3;
/// Longest username accepted at registration.
pub const USERNAME_MAX: usize = 32;

/// Validates that a username is 3 to 32 characters of `A-Z a-z 0-9 _ -`.
///
/// # Examples
///
/// ```ignore
/// validate_username("kira_42")   // Ok
/// validate_username("k")         // Err - too short
/// validate_username("kira jane") // Err - space
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.len() < USERNAME_MIN || username.len() > USERNAME_MAX {
        let mut err = ValidationError::new("username_length");
        err.message = Some(
            format!(
                "username must be {USERNAME_MIN} to {USERNAME_MAX} characters (got {})",
                username.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        let mut err = ValidationError::new("username_format");
        err.message =
            Some("username may only contain letters, digits, underscores and dashes".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a join code is uppercase alphanumeric of the generated length.
pub fn validate_join_code(code: &str) -> Result<(), ValidationError> {
    if code.is_empty() || code.len() > 12 {
        let mut err = ValidationError::new("join_code_length");
        err.message = Some(format!("join code has implausible length {}", code.len()).into());
        return Err(err);
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
    {
        let mut err = ValidationError::new("join_code_format");
        err.message = Some("join code must contain only digits and uppercase letters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_within_charset_pass() {
        assert!(validate_username("kira").is_ok());
        assert!(validate_username("kira_42").is_ok());
        assert!(validate_username("Kira-Jane-III").is_ok());
        assert!(validate_username("abc").is_ok());
        assert!(validate_username(&"a".repeat(32)).is_ok());
    }

    #[test]
    fn username_length_is_bounded() {
        assert!(validate_username("").is_err());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(33)).is_err());
    }

    #[test]
    fn username_rejects_exotic_characters() {
        assert!(validate_username("kira jane").is_err());
        assert!(validate_username("kira!").is_err());
        assert!(validate_username("キラ").is_err());
    }

    #[test]
    fn join_codes_are_uppercase_alphanumeric() {
        assert!(validate_join_code("A1B2C3").is_ok());
        assert!(validate_join_code("ZZZZZZ").is_ok());
        assert!(validate_join_code("").is_err());
        assert!(validate_join_code("a1b2c3").is_err());
        assert!(validate_join_code("AB 123").is_err());
        assert!(validate_join_code(&"A".repeat(13)).is_err());
    }
}
