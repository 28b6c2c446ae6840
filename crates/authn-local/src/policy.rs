//! Password policy enforced on password changes.

/// Minimum password length.
pub const MIN_LENGTH: usize = 12;

/// Maximum password length.
pub const MAX_LENGTH: usize = 128;

/// Check `password` against the appliance's policy.
///
/// Requires 12 to 128 characters with at least two uppercase letters, two
/// lowercase letters, one digit and one special character. Returns the first
/// rule broken.
pub fn check_password(password: &str) -> Result<(), &'static str> {
    let len = password.chars().count();
    if !(MIN_LENGTH..=MAX_LENGTH).contains(&len) {
        return Err("password must be between 12 and 128 characters");
    }

    let count = |f: fn(&char) -> bool| password.chars().filter(f).count();
    if count(char::is_ascii_uppercase) < 2 {
        return Err("password must contain at least 2 uppercase letters");
    }
    if count(char::is_ascii_lowercase) < 2 {
        return Err("password must contain at least 2 lowercase letters");
    }
    if count(char::is_ascii_digit) < 1 {
        return Err("password must contain at least 1 digit");
    }
    if count(|c| !c.is_ascii_alphanumeric()) < 1 {
        return Err("password must contain at least 1 special character");
    }
    if password.chars().any(char::is_control) {
        return Err("password must not contain control characters");
    }
    Ok(())
}
