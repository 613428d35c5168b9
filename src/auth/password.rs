use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, Rng};

use crate::validation::has_sql_injection;

pub const GENERATED_PASSWORD_LENGTH: usize = 12;

// No quote, comment or operator characters. Letters can still spell a bare
// keyword, so the generator redraws those.
const PASSWORD_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!#+,.:?_";

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?
        .to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash).map_err(|err| anyhow!(err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn generate_random_password(length: usize) -> String {
    let mut rng = OsRng;
    loop {
        let password: String = (0..length)
            .map(|_| PASSWORD_ALPHABET[rng.gen_range(0..PASSWORD_ALPHABET.len())] as char)
            .collect();
        if !has_sql_injection(&password) {
            return password;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = hash_password("correct horse").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).expect("verify"));
        assert!(!verify_password("battery staple", &hash).expect("verify"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn generated_passwords_pass_the_injection_check() {
        for _ in 0..200 {
            let password = generate_random_password(GENERATED_PASSWORD_LENGTH);
            assert_eq!(password.chars().count(), GENERATED_PASSWORD_LENGTH);
            assert!(!has_sql_injection(&password), "{password} was flagged");
        }
    }
}
