//! Input validation for API requests.
//!
//! Each validator returns `Err(message)` for the offending field. Handlers
//! collect them with `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Account names: ASCII letters, digits and underscores
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();

    /// Deliberately loose email check: something@something.tld
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^@\s]+@[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?)+$"
    ).unwrap();

    static ref AVATAR_URL_REGEX: Regex = Regex::new(r"^https?://[^\s]+$").unwrap();
}

pub const SEX_VALUES: [&str; 3] = ["MALE", "FEMALE", "SECRET"];

fn check_length(value: &str, label: &str, min: usize, max: usize) -> Result<(), String> {
    let len = value.chars().count();
    if len == 0 {
        return Err(format!("{} is required", label));
    }
    if len < min {
        return Err(format!("{} is too short (min {} characters)", label, min));
    }
    if len > max {
        return Err(format!("{} is too long (max {} characters)", label, max));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), String> {
    check_length(username, "Username", 5, 12)?;
    if !USERNAME_REGEX.is_match(username) {
        return Err("Username may only contain letters, digits and underscores".to_string());
    }
    Ok(())
}

pub fn validate_nickname(nickname: &str) -> Result<(), String> {
    check_length(nickname.trim(), "Nickname", 2, 20)
}

pub fn validate_password(password: &str) -> Result<(), String> {
    check_length(password, "Password", 6, 30)
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 64 {
        return Err("Email is too long (max 64 characters)".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

pub fn validate_sex(sex: &str) -> Result<(), String> {
    if SEX_VALUES.contains(&sex) {
        Ok(())
    } else {
        Err("Sex must be one of: MALE, FEMALE, SECRET".to_string())
    }
}

pub fn validate_avatar(avatar: &str) -> Result<(), String> {
    if avatar.len() > 512 {
        return Err("Avatar URL is too long (max 512 characters)".to_string());
    }
    if !AVATAR_URL_REGEX.is_match(avatar) {
        return Err("Avatar must be an http(s) URL".to_string());
    }
    Ok(())
}

/// Post titles and bodies, comment bodies, user agents
pub fn validate_required(value: &str, label: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", label));
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), String> {
    validate_required(title, "Title")?;
    if title.chars().count() > 200 {
        return Err("Title is too long (max 200 characters)".to_string());
    }
    Ok(())
}

/// Highest page number honoured; keeps `(page - 1) * per_page` far from overflow
pub const MAX_PAGE: i64 = 1_000_000;

/// Interpret a `page` parameter. Anything missing, unparsable or below 1 means page 1.
pub fn parse_page(raw: Option<&str>) -> i64 {
    raw.and_then(|p| p.trim().parse::<f64>().ok())
        .filter(|p| p.is_finite() && *p >= 1.0)
        .map(|p| (p.floor() as i64).min(MAX_PAGE))
        .unwrap_or(1)
}
