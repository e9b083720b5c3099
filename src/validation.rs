// 7.0: form level checks for registration, login and trade entry.
// these only check shape. nothing here is an authentication mechanism.

use rust_decimal::Decimal;

pub const MIN_NAME_LEN: usize = 2;

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::Required("email"));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }

    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    };

    // domain needs at least one dot with something on each side
    let domain_ok = domain
        .rsplit_once('.')
        .map(|(host, tld)| !host.is_empty() && tld.len() >= 2 && !host.ends_with('.'))
        .unwrap_or(false);

    if local.is_empty() || !domain_ok || domain.starts_with('.') {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

pub fn validate_password(password: &str, min_len: usize) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::Required("password"));
    }
    if password.chars().count() < min_len {
        return Err(ValidationError::PasswordTooShort { min: min_len });
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::Required("name"));
    }
    if name.chars().count() < MIN_NAME_LEN {
        return Err(ValidationError::NameTooShort { min: MIN_NAME_LEN });
    }
    Ok(())
}

pub fn validate_amount(field: &'static str, amount: Decimal) -> Result<(), ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NotPositive(field));
    }
    Ok(())
}

/// Lowercased, trimmed form used as the lookup key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Name must be at least {min} characters")]
    NameTooShort { min: usize },

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("Email already registered: {0}")]
    EmailTaken(String),
}
