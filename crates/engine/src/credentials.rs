//! Password hashing and one-time codes.

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use rand::Rng;

use crate::{EngineError, ResultEngine};

const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 20;

/// Argon2id PHC string of `password` under a fresh random salt.
pub(crate) fn hash_password(password: &str) -> ResultEngine<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| EngineError::Hashing(err.to_string()))
}

/// A stored hash that does not parse never verifies.
pub(crate) fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Six digit code sent by email for verification and password resets.
pub(crate) fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

pub(crate) fn validate_password(password: &str) -> ResultEngine<()> {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(EngineError::InvalidInput(format!(
            "password must be between {PASSWORD_MIN} and {PASSWORD_MAX} characters"
        )));
    }
    if !password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
    {
        return Err(EngineError::InvalidInput(
            "password must contain a special character".to_string(),
        ));
    }
    Ok(())
}

/// Lowercases and checks the rough shape of an email address.
pub(crate) fn normalize_email(email: &str) -> ResultEngine<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(EngineError::InvalidInput(format!("invalid email: {email}")));
    }
    Ok(email)
}
