//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{SocialError, SocialResult};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;
const MAX_TAGS: usize = 32;

fn invalid(msg: impl Into<String>) -> SocialError {
    SocialError::Invalid(msg.into())
}

/// Validate an opaque user id from the identity provider
///
/// `_` is reserved as the pair-key separator.
pub fn validate_user_id(user_id: &str) -> SocialResult<()> {
    static USER_ID_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USER_ID_REGEX
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9-]{1,128}$").expect("Failed to compile user id regex"));

    if !regex.is_match(user_id) {
        return Err(invalid(format!("Malformed user id: {:?}", user_id)));
    }
    Ok(())
}

/// Validate a username (already lowercased by the caller or not)
pub fn validate_username(username: &str) -> SocialResult<()> {
    if username.is_empty() {
        return Err(invalid("Username is required"));
    }

    if username.len() < USERNAME_MIN_LEN {
        return Err(invalid(format!(
            "Username must be at least {} characters long",
            USERNAME_MIN_LEN
        )));
    }

    if username.len() > USERNAME_MAX_LEN {
        return Err(invalid(format!(
            "Username must be at most {} characters long",
            USERNAME_MAX_LEN
        )));
    }

    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._]+$").expect("Failed to compile username regex"));

    if !regex.is_match(username) {
        return Err(invalid(
            "Username can only contain letters, numbers, dots, and underscores",
        ));
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> SocialResult<()> {
    if email.is_empty() {
        return Err(invalid("Email is required"));
    }

    if email.len() > 254 {
        return Err(invalid("Email must be at most 254 characters long"));
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err(invalid("Invalid email format"));
    }

    Ok(())
}

pub fn validate_semester(semester: u8) -> SocialResult<()> {
    if !(1..=8).contains(&semester) {
        return Err(invalid("Semester must be between 1 and 8"));
    }
    Ok(())
}

/// Trim, drop empties, and deduplicate tags keeping first-seen order
pub fn normalize_tags(tags: &[String]) -> SocialResult<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || out.iter().any(|t| t == tag) {
            continue;
        }
        out.push(tag.to_string());
    }
    if out.len() > MAX_TAGS {
        return Err(invalid(format!("At most {} tags are allowed", MAX_TAGS)));
    }
    Ok(out)
}

/// Require a non-blank field, returning it trimmed
pub fn require(field: &str, value: &str) -> SocialResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("kiit.alice_01").is_ok());
        assert!(validate_username("alice smith").is_err());
        assert!(validate_username(&"a".repeat(31)).is_err());
    }

    #[test]
    fn user_ids() {
        assert!(validate_user_id("Xy9-abc").is_ok());
        assert!(validate_user_id("a_b").is_err());
        assert!(validate_user_id("").is_err());
    }

    #[test]
    fn emails() {
        assert!(validate_email("21051234@kiit.ac.in").is_ok());
        assert!(validate_email("not-an-email").is_err());
    }

    #[test]
    fn tags_keep_first_occurrence() {
        let tags = vec![
            " Coding ".to_string(),
            "Chess".to_string(),
            "Coding".to_string(),
            "".to_string(),
        ];
        assert_eq!(normalize_tags(&tags).unwrap(), vec!["Coding", "Chess"]);
    }

    #[test]
    fn semesters() {
        assert!(validate_semester(0).is_err());
        assert!(validate_semester(8).is_ok());
        assert!(validate_semester(9).is_err());
    }
}
