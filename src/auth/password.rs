use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::HashingConfig;

/// Upper bound on plaintext length, in characters.
pub const MAX_PASSWORD_CHARS: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("invalid password: {0}")]
    InvalidInput(&'static str),
    #[error("stored password hash is malformed")]
    MalformedHash,
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Argon2id hasher configured once at startup.
#[derive(Clone)]
pub struct Passwords {
    argon2: Argon2<'static>,
    // Same cost as real hashes; stands in for accounts that do not exist.
    dummy_hash: String,
}

impl Passwords {
    pub fn new(cfg: HashingConfig) -> Result<Self, PasswordError> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| PasswordError::Hashing(format!("invalid argon2 params: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = argon2
            .hash_password(b"no such account", &SaltString::generate(&mut OsRng))
            .map_err(|e| PasswordError::Hashing(e.to_string()))?
            .to_string();
        Ok(Self { argon2, dummy_hash })
    }

    /// Hashes `plain` with a fresh random salt, returning a PHC string.
    pub fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        if plain.is_empty() {
            return Err(PasswordError::InvalidInput("password must not be empty"));
        }
        if plain.chars().count() > MAX_PASSWORD_CHARS {
            return Err(PasswordError::InvalidInput("password is too long"));
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                PasswordError::Hashing(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// `Ok(false)` on mismatch; an error only when `hash` itself is unusable.
    pub fn verify(&self, plain: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            PasswordError::MalformedHash
        })?;
        if plain.is_empty() || plain.chars().count() > MAX_PASSWORD_CHARS {
            return Ok(false);
        }
        // Cost parameters are read from the PHC string, so hashes made with
        // older settings still verify.
        Ok(self
            .argon2
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    /// Does the work of a failed `verify` for an account that does not
    /// exist, so unknown and known emails take equally long to reject.
    pub fn verify_unknown(&self, plain: &str) {
        let _ = self.verify(plain, &self.dummy_hash);
    }
}

#[cfg(test)]
pub(crate) fn cheap_hashing() -> HashingConfig {
    HashingConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}
