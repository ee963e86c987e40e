//! Field validators for user forms.

use super::error::FieldErrors;

const PASSWORD_SPECIALS: &[char] = &['@', '$', '!', '%', '*', '?', '&'];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `local@domain.tld` where local and domain are word characters, dots or dashes.
pub fn validate_email(email: &str) -> Result<(), String> {
    let invalid = || Err("Enter a valid email address.".to_string());
    let Some((local, domain)) = email.split_once('@') else {
        return invalid();
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return invalid();
    };

    let word_dot_dash = |s: &str| !s.is_empty() && s.chars().all(|c| is_word_char(c) || c == '.' || c == '-');
    if !word_dot_dash(local) || !word_dot_dash(host) || tld.is_empty() || !tld.chars().all(is_word_char) {
        return invalid();
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), String> {
    let len = username.chars().count();
    let allowed = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !(4..=30).contains(&len) || !allowed {
        return Err(
            "Username must be 4-30 characters and only contain letters, numbers and _ . -".into(),
        );
    }
    Ok(())
}

pub fn validate_name(value: &str, field_name: &str) -> Result<(), String> {
    if value.is_empty() || !value.chars().all(char::is_alphabetic) {
        return Err(format!("{} must contain only letters.", field_name));
    }
    Ok(())
}

/// At least 8 characters from letters, digits and `@$!%*?&`, with at least
/// one of each class.
pub fn validate_password(password: &str) -> Result<(), String> {
    let allowed = password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(&c));
    let strong = password.chars().count() >= 8
        && allowed
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(&c));
    if !strong {
        return Err(
            "Password must be at least 8 characters long and include uppercase, lowercase, number, and special character."
                .into(),
        );
    }
    Ok(())
}

/// Collects field errors across several checks.
#[derive(Default)]
pub struct FormErrors {
    errors: FieldErrors,
}

impl FormErrors {
    pub fn check(&mut self, field: &'static str, result: Result<(), String>) {
        if let Err(message) = result {
            self.add(field, message);
        }
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.entry(field).or_default().push(message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}
