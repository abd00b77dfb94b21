//! Input validation. The storage constraints stay authoritative for
//! uniqueness; these checks exist for early, friendly failures.

use crate::ContentLimits;

pub fn validate_username(username: &str) -> Result<(), String> {
    if username.len() < 2 {
        return Err("Username must be at least 2 characters long".to_string());
    }

    if username.len() > 20 {
        return Err("Username must be at most 20 characters long".to_string());
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err("Username can only contain letters, numbers, and underscores".to_string());
    }

    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    if email.contains(char::is_whitespace) {
        return Err("Invalid email address".to_string());
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err("Invalid email address".to_string());
    };
    if local.is_empty()
        || domain.is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 6 {
        return Err("Password must be at least 6 characters long".to_string());
    }

    if password.len() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    Ok(())
}

pub fn validate_content(content: &str, limits: ContentLimits) -> Result<(), String> {
    let len = content.chars().count();

    if len < limits.min {
        return Err(format!(
            "Message must be at least {} characters long",
            limits.min
        ));
    }

    if len > limits.max {
        return Err(format!(
            "Message must be at most {} characters long",
            limits.max
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_bounds_and_charset() {
        assert!(validate_username("ada_99").is_ok());
        assert!(validate_username("a").is_err());
        assert!(validate_username("a".repeat(21).as_str()).is_err());
        assert!(validate_username("ada lovelace").is_err());
        assert!(validate_username("ada!").is_err());
    }

    #[test]
    fn email_shapes() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("ada+tag@sub.example.co").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("ada").is_err());
        assert!(validate_email("ada@nodot").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada@.com").is_err());
        assert!(validate_email("ada @example.com").is_err());
    }

    #[test]
    fn password_bounds() {
        assert!(validate_password("hunter22").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password("p".repeat(129).as_str()).is_err());
    }

    #[test]
    fn content_bounds_come_from_policy() {
        let limits = ContentLimits { min: 10, max: 300 };
        assert!(validate_content("a perfectly fine message", limits).is_ok());
        assert!(validate_content("too short", limits).is_err());
        assert!(validate_content("x".repeat(301).as_str(), limits).is_err());

        let tighter = ContentLimits { min: 1, max: 5 };
        assert!(validate_content("hi", tighter).is_ok());
    }
}
