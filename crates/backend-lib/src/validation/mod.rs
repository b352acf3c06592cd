// ============================
// authority-backend/src/validation/mod.rs
// ============================
//! Input validation for account fields.

use crate::auth::password::{validate_password_strength, PasswordRequirements, MAX_PASSWORD_LENGTH};
use crate::error::AppError;
use authority_common::{AdminUpdateRequest, SignupRequest, UpdateProfileRequest};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 50;
const MAX_FULL_NAME_LENGTH: usize = 100;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid username regex"));
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});
static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{6,15}$").expect("valid phone regex"));
static FULL_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^<>/\\{}\[\];]*$").expect("valid name regex"));

/// Possible validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhonenumber(String),

    #[error("Invalid full name: {0}")]
    InvalidFullName(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

pub fn validate_username(username: &str) -> ValidationResult<&str> {
    if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::InvalidUsername(format!(
            "Username must be between {MIN_USERNAME_LENGTH} and {MAX_USERNAME_LENGTH} characters"
        )));
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(ValidationError::InvalidUsername(
            "Username may contain only letters, digits, '.', '_' and '-'".to_string(),
        ));
    }

    Ok(username)
}

pub fn validate_email(email: &str) -> ValidationResult<&str> {
    if email.is_empty() {
        return Err(ValidationError::InvalidEmail(
            "Email address cannot be empty".to_string(),
        ));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "Email address cannot exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Invalid email address format".to_string(),
        ));
    }

    Ok(email)
}

pub fn validate_phonenumber(phonenumber: &str) -> ValidationResult<&str> {
    if !PHONE_REGEX.is_match(phonenumber) {
        return Err(ValidationError::InvalidPhonenumber(
            "Phone number must be 6 to 15 digits with an optional leading '+'".to_string(),
        ));
    }
    Ok(phonenumber)
}

pub fn validate_full_name(full_name: &str) -> ValidationResult<&str> {
    if full_name.chars().count() > MAX_FULL_NAME_LENGTH {
        return Err(ValidationError::InvalidFullName(format!(
            "Full name cannot exceed {MAX_FULL_NAME_LENGTH} characters"
        )));
    }

    if !FULL_NAME_REGEX.is_match(full_name) {
        return Err(ValidationError::InvalidFullName(
            "Full name contains invalid characters".to_string(),
        ));
    }

    Ok(full_name)
}

pub fn validate_password<'a>(
    password: &'a str,
    requirements: &PasswordRequirements,
) -> ValidationResult<&'a str> {
    if validate_password_strength(password, requirements) {
        return Ok(password);
    }

    let mut rules = vec![format!(
        "between {} and {MAX_PASSWORD_LENGTH} characters",
        requirements.min_length
    )];
    if requirements.require_uppercase {
        rules.push("an uppercase letter".to_string());
    }
    if requirements.require_lowercase {
        rules.push("a lowercase letter".to_string());
    }
    if requirements.require_digit {
        rules.push("a digit".to_string());
    }
    if requirements.require_special {
        rules.push("a special character".to_string());
    }
    Err(ValidationError::InvalidPassword(format!(
        "Password must have {}",
        rules.join(", ")
    )))
}

/// Validate every field of a signup request
pub fn validate_signup(
    request: &SignupRequest,
    requirements: &PasswordRequirements,
) -> ValidationResult<()> {
    validate_username(&request.username)?;
    // empty optional fields are stored as absent
    if let Some(email) = present(&request.email) {
        validate_email(email)?;
    }
    if let Some(phonenumber) = present(&request.phonenumber) {
        validate_phonenumber(phonenumber)?;
    }
    if let Some(full_name) = present(&request.full_name) {
        validate_full_name(full_name)?;
    }
    validate_password(&request.password, requirements)?;
    Ok(())
}

/// Validate the fields present in a profile update. An empty string clears
/// the field and needs no check.
pub fn validate_profile_update(update: &UpdateProfileRequest) -> ValidationResult<()> {
    if let Some(email) = present(&update.email) {
        validate_email(email)?;
    }
    if let Some(phonenumber) = present(&update.phonenumber) {
        validate_phonenumber(phonenumber)?;
    }
    if let Some(full_name) = present(&update.full_name) {
        validate_full_name(full_name)?;
    }
    Ok(())
}

/// Validate an administrator's edit of another account
pub fn validate_admin_update(update: &AdminUpdateRequest) -> ValidationResult<()> {
    if let Some(username) = &update.username {
        validate_username(username.trim())?;
    }
    if let Some(email) = present(&update.email) {
        validate_email(email)?;
    }
    if let Some(phonenumber) = present(&update.phonenumber) {
        validate_phonenumber(phonenumber)?;
    }
    if let Some(full_name) = present(&update.full_name) {
        validate_full_name(full_name)?;
    }
    Ok(())
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("alice.smith-99_x").is_ok());
        assert!(validate_username("al").is_err());
        assert!(validate_username(&"a".repeat(51)).is_err());
        assert!(validate_username("alice smith").is_err());
        assert!(validate_username("alice<script>").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("alice").is_err());
        assert!(validate_email("alice@example").is_err());
    }

    #[test]
    fn test_validate_phonenumber() {
        assert!(validate_phonenumber("0123456789").is_ok());
        assert!(validate_phonenumber("+84123456789").is_ok());
        assert!(validate_phonenumber("12345").is_err());
        assert!(validate_phonenumber("012-345-6789").is_err());
    }

    #[test]
    fn test_validate_full_name() {
        assert!(validate_full_name("Alice Nguyễn").is_ok());
        assert!(validate_full_name("<b>Alice</b>").is_err());
        assert!(validate_full_name(&"a".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_password_message_lists_rules() {
        let requirements = PasswordRequirements {
            require_digit: true,
            ..PasswordRequirements::default()
        };
        assert!(validate_password("password1", &requirements).is_ok());

        let err = validate_password("password", &requirements).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("a digit"));
        assert!(message.contains("between 8 and 128"));
    }

    #[test]
    fn test_validate_signup() {
        let requirements = PasswordRequirements::default();
        let mut request = SignupRequest {
            username: "alice".to_string(),
            email: Some("alice@example.com".to_string()),
            phonenumber: None,
            full_name: Some("Alice".to_string()),
            password: "yourpassword".to_string(),
        };
        assert!(validate_signup(&request, &requirements).is_ok());

        request.email = Some(String::new());
        assert!(validate_signup(&request, &requirements).is_ok());

        request.email = Some("nope".to_string());
        assert!(matches!(
            validate_signup(&request, &requirements),
            Err(ValidationError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_validate_admin_update() {
        let mut update = AdminUpdateRequest {
            username: Some("alice2".to_string()),
            email: Some(String::new()),
            disabled: Some(true),
            ..Default::default()
        };
        assert!(validate_admin_update(&update).is_ok());

        // the username cannot be cleared
        update.username = Some(String::new());
        assert!(matches!(
            validate_admin_update(&update),
            Err(ValidationError::InvalidUsername(_))
        ));

        update.username = None;
        update.phonenumber = Some("abc".to_string());
        assert!(matches!(
            validate_admin_update(&update),
            Err(ValidationError::InvalidPhonenumber(_))
        ));
    }
}
