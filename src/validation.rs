//! Field rules shared by registration, login and the live probes.
//!
//! Every rule reports its first applicable failure only, in a fixed
//! order, so the form and the API always show identical wording.

use serde::Serialize;
use validator::{ValidateEmail, ValidationError, ValidationErrors};

use crate::error::Result;
use crate::user::repository::UserRepository;

pub const REQUIRED: &str = "This field is required.";
pub const EMAIL_INVALID: &str = "Enter a valid email address.";
pub const EMAIL_TAKEN: &str = "A user with that email already exists.";
pub const USERNAME_TAKEN: &str =
    "A user with that username already exists.";
pub const PASSWORD_TOO_SHORT: &str =
    "This password is too short. It must contain at least 8 characters.";
pub const PASSWORD_NUMERIC: &str = "This password is entirely numeric.";
pub const PASSWORD_COMMON: &str = "This password is too common.";
pub const PASSWORD_MISMATCH: &str =
    "The two password fields didn't match.";
pub const TERMS_REQUIRED: &str =
    "You must accept the terms and conditions.";
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

const MIN_PASSWORD_LENGTH: usize = 8;

/// Outcome of a single field check.
#[derive(Debug, PartialEq, Serialize)]
pub struct Verdict {
    pub valid: bool,
    pub message: String,
    pub errors: Vec<String>,
}

impl Verdict {
    fn ok() -> Self {
        Self {
            valid: true,
            message: String::default(),
            errors: Vec::new(),
        }
    }

    fn fail(message: &str) -> Self {
        Self {
            valid: false,
            message: message.to_owned(),
            errors: vec![message.to_owned()],
        }
    }
}

/// Password verdict, with its strength score alongside.
#[derive(Debug, PartialEq, Serialize)]
pub struct PasswordVerdict {
    #[serde(flatten)]
    pub verdict: Verdict,
    /// 0 to 4, one point per satisfied strength rule.
    pub strength: u8,
}

/// A username is only refused when another account already claimed it,
/// case-insensitively. Empty input is left to the registration check.
pub async fn check_username(
    repo: &UserRepository,
    username: &str,
) -> Result<Verdict> {
    if !username.is_empty() && repo.username_taken(username).await? {
        return Ok(Verdict::fail(USERNAME_TAKEN));
    }

    Ok(Verdict::ok())
}

/// Email checks, in order: presence, syntax, availability.
pub async fn check_email(
    repo: &UserRepository,
    email: &str,
) -> Result<Verdict> {
    if email.is_empty() {
        return Ok(Verdict::fail(REQUIRED));
    }
    if !email.validate_email() {
        return Ok(Verdict::fail(EMAIL_INVALID));
    }
    if repo.email_taken(email).await? {
        return Ok(Verdict::fail(EMAIL_TAKEN));
    }

    Ok(Verdict::ok())
}

/// Strength score: length, letter case, digit, symbol.
pub fn password_strength(password: &str) -> u8 {
    let mut score = 0;

    if password.chars().count() >= MIN_PASSWORD_LENGTH {
        score += 1;
    }
    // Any cased letter at all earns the point.
    if password != password.to_lowercase()
        || password != password.to_uppercase()
    {
        score += 1;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        score += 1;
    }
    if password.chars().any(|c| !c.is_alphanumeric()) {
        score += 1;
    }

    score
}

/// Password checks, in order: presence, length, all-numeric, common
/// value, confirmation mismatch. Strength is reported either way.
pub fn check_password(
    password: &str,
    confirmation: Option<&str>,
) -> PasswordVerdict {
    let strength = password_strength(password);

    let verdict = if password.is_empty() {
        Verdict::fail(REQUIRED)
    } else if password.chars().count() < MIN_PASSWORD_LENGTH {
        Verdict::fail(PASSWORD_TOO_SHORT)
    } else if password.chars().all(|c| c.is_ascii_digit()) {
        Verdict::fail(PASSWORD_NUMERIC)
    } else if password.to_lowercase() == "password" {
        Verdict::fail(PASSWORD_COMMON)
    } else if confirmation.is_some_and(|confirmation| confirmation != password)
    {
        Verdict::fail(PASSWORD_MISMATCH)
    } else {
        Verdict::ok()
    };

    PasswordVerdict { verdict, strength }
}

/// `This field is required.`, under whatever field the caller picks.
pub(crate) fn required() -> ValidationError {
    ValidationError::new("required").with_message(REQUIRED.into())
}

/// The one error every login refusal shares, so unknown emails, wrong
/// passwords and disabled accounts read identically from outside.
pub(crate) fn invalid_credentials() -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add(
        "non_field_errors",
        ValidationError::new("invalid_credentials")
            .with_message(INVALID_CREDENTIALS.into()),
    );

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_scoring() {
        assert_eq!(password_strength(""), 0);
        assert_eq!(password_strength("abc"), 1);
        assert_eq!(password_strength("12345678"), 2);
        assert_eq!(password_strength("abcdefg1"), 3);
        assert_eq!(password_strength("ABCDEFG1"), 3);
        assert_eq!(password_strength("Abcdef1!"), 4);
        assert_eq!(password_strength("passw0rd extra long!"), 4);
    }

    #[test]
    fn test_empty_password_is_required() {
        let checked = check_password("", None);

        assert!(!checked.verdict.valid);
        assert_eq!(checked.verdict.message, REQUIRED);
        assert_eq!(checked.strength, 0);
    }

    #[test]
    fn test_short_password_wins_over_numeric() {
        // Both rules match; only the first one in order is reported.
        let checked = check_password("1234567", None);

        assert_eq!(checked.verdict.message, PASSWORD_TOO_SHORT);
        assert_eq!(checked.verdict.errors, vec![PASSWORD_TOO_SHORT]);
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // Four two-byte characters are four characters, not eight.
        let checked = check_password("ääää", None);

        assert_eq!(checked.verdict.message, PASSWORD_TOO_SHORT);
        assert_eq!(checked.strength, 1);

        assert!(check_password("ääääääää", None).verdict.valid);
        assert_eq!(password_strength("ääääääää"), 2);
    }

    #[test]
    fn test_numeric_password_is_refused() {
        let checked = check_password("12345678", None);

        assert_eq!(checked.verdict.message, PASSWORD_NUMERIC);
        assert_eq!(checked.strength, 2);
    }

    #[test]
    fn test_common_password_is_refused() {
        for common in ["password", "PASSWORD", "PaSsWoRd"] {
            let checked = check_password(common, None);
            assert_eq!(checked.verdict.message, PASSWORD_COMMON);
        }
    }

    #[test]
    fn test_mismatched_confirmation() {
        let checked = check_password("abcdefg1", Some("abcdefg2"));

        assert_eq!(checked.verdict.message, PASSWORD_MISMATCH);
        // The failing rule does not hide the strength score.
        assert_eq!(checked.strength, 3);
    }

    #[test]
    fn test_valid_password_with_confirmation() {
        let checked = check_password("abcdefg1", Some("abcdefg1"));

        assert!(checked.verdict.valid);
        assert_eq!(checked.verdict.message, "");
        assert!(checked.verdict.errors.is_empty());
        assert_eq!(checked.strength, 3);
    }

    #[test]
    fn test_missing_confirmation_is_not_a_mismatch() {
        assert!(check_password("abcdefg1", None).verdict.valid);
    }
}
