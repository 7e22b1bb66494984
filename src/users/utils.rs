use regex::Regex;

use crate::types::ValidationError;

const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"(?i)\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(pattern).unwrap()
    };
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        Err(ValidationError::from("email", "email should not be empty"))
    } else if !EMAIL_RE.is_match(email) {
        Err(ValidationError::from("email", format!("Invalid email: {}", email)))
    } else {
        Ok(())
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        Err(ValidationError::from(
            "password",
            format!("password must be at least {} characters", MIN_PASSWORD_LEN),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        Err(ValidationError::from("userName", "userName should not be empty"))
    } else {
        Ok(())
    }
}

/// New accounts are named after the local part of their email.
pub fn username_from_email(email: &str) -> String {
    match email.find('@') {
        Some(at) => email[..at].to_owned(),
        None => email.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_addresses() {
        assert!(validate_email("reader@example.com").is_ok());
        assert!(validate_email("Book.Worm+shelf@mail.example.org").is_ok());
    }

    #[test]
    fn rejects_malformed_addresses() {
        for email in &["", "reader", "reader@", "@example.com", "reader@example..com"] {
            assert!(validate_email(email).is_err(), "{} should be rejected", email);
        }
    }

    #[test]
    fn password_needs_eight_characters() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn blank_username_is_rejected() {
        assert!(validate_username("   ").is_err());
        assert!(validate_username("ishmael").is_ok());
    }

    #[test]
    fn username_is_local_part() {
        assert_eq!(username_from_email("ishmael@pequod.example"), "ishmael");
        assert_eq!(username_from_email("nobody"), "nobody");
    }
}
