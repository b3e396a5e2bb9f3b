//! Input validation for registration, login and profile edits.
//!
//! Each validator returns the first failing rule's message, or `None`.

use crate::models::auth::ProfileFields;

const MAX_NAME_LEN: usize = 25;
const MAX_ADDRESS_LEN: usize = 50;
const MIN_PASSWORD_LEN: usize = 8;
const POSTAL_CODE_LEN: usize = 6;
const PASSWORD_SPECIALS: &str = "!@#$%^&*(),.?\":{}|<>";

fn letters_and_spaces(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphabetic() || c.is_whitespace())
}

pub fn validate_name(name: &str) -> Option<String> {
    if name.is_empty() {
        return Some("Please enter your name".into());
    }
    if !letters_and_spaces(name) {
        return Some("Name must only contain letters and spaces".into());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Some(format!("Name cannot exceed {MAX_NAME_LEN} characters"));
    }
    None
}

/// Loose shape check: something, `@`, something, `.`, something, no whitespace.
pub fn validate_email(email: &str) -> Option<String> {
    if email.is_empty() {
        return Some("Please enter your email".into());
    }
    let well_formed = !email.chars().any(char::is_whitespace)
        && email.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty()
                && domain
                    .rsplit_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        });
    if !well_formed {
        return Some("Please provide a valid email address".into());
    }
    None
}

pub fn validate_password(password: &str) -> Option<String> {
    if password.is_empty() {
        return Some("Please enter your password".into());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Some(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        ));
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Some("Password must contain at least one letter and one number".into());
    }
    if !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
        return Some("Password must include at least one special character".into());
    }
    None
}

fn validate_place(value: &str, label: &str, letters_only: bool) -> Option<String> {
    let lower = label.to_lowercase();
    if value.is_empty() {
        return Some(format!("Please enter your {lower}"));
    }
    if letters_only && !letters_and_spaces(value) {
        return Some(format!("{label} must only contain letters and spaces"));
    }
    if value.chars().count() > MAX_ADDRESS_LEN {
        return Some(format!("{label} cannot exceed {MAX_ADDRESS_LEN} characters"));
    }
    None
}

pub fn validate_postal_code(postal_code: &str) -> Option<String> {
    if postal_code.is_empty() {
        return Some("Please enter your postal code".into());
    }
    if postal_code.len() != POSTAL_CODE_LEN || !postal_code.chars().all(|c| c.is_ascii_digit()) {
        return Some(format!(
            "Postal code must be exactly {POSTAL_CODE_LEN} digits"
        ));
    }
    None
}

pub fn validate_profile(profile: &ProfileFields) -> Option<String> {
    validate_place(&profile.address, "Address", false)
        .or_else(|| validate_place(&profile.street, "Street", true))
        .or_else(|| validate_place(&profile.city, "City", true))
        .or_else(|| validate_postal_code(&profile.postal_code))
}

pub fn validate_registration(
    email: &str,
    password: &str,
    name: &str,
    profile: &ProfileFields,
) -> Option<String> {
    validate_name(name)
        .or_else(|| validate_email(email))
        .or_else(|| validate_password(password))
        .or_else(|| validate_profile(profile))
}

/// Login only checks presence and shape; password rules are enforced at
/// registration so that older accounts can still sign in.
pub fn validate_login(email: &str, password: &str) -> Option<String> {
    validate_email(email).or_else(|| {
        password
            .is_empty()
            .then(|| "Please enter your password".to_string())
    })
}
