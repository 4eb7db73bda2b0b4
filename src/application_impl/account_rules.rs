use crate::application_port::AuthError;

pub const MIN_USERNAME_LEN: usize = 2;
pub const MAX_USERNAME_LEN: usize = 32;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_FIELD_LEN: usize = 254;

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, AuthError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AuthError::InvalidInput(format!("{} is required", field)));
    }
    if value.len() > MAX_FIELD_LEN {
        return Err(AuthError::InvalidInput(format!("{} is too long", field)));
    }
    Ok(value)
}

/// Trimmed and lowercased; `[a-z0-9_.-]` only.
pub fn normalize_username(raw: &str) -> Result<String, AuthError> {
    let username = required("username", raw)?.to_lowercase();
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(AuthError::InvalidInput(format!(
            "username must be {}-{} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(AuthError::InvalidInput(
            "username may only contain letters, digits, '_', '.' and '-'".to_string(),
        ));
    }
    Ok(username)
}

pub fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = required("email", raw)?;
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace) =>
        {
            Ok(email.to_string())
        }
        _ => Err(AuthError::InvalidInput("email is not valid".to_string())),
    }
}

pub fn normalize_full_name(raw: &str) -> Result<String, AuthError> {
    required("full name", raw).map(str::to_string)
}

pub fn check_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::InvalidInput(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
