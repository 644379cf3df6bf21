//! Password hashing.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use thiserror::Error;

use crate::config;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("argon2 error: {0}")]
    Argon2(String),
}

/// Manager to handle password hash.
#[derive(Clone, Debug)]
pub struct PasswordManager {
    params: Params,
}

impl PasswordManager {
    /// Create new [`PasswordManager`] instance.
    pub fn new(config: Option<config::Argon2>) -> Result<Self, CryptoError> {
        let config = config.unwrap_or_default();

        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| CryptoError::Argon2(err.to_string()))?;

        Ok(Self { params })
    }

    /// Hash password using argon2id.
    pub fn hash_password(
        &self,
        password: impl AsRef<[u8]>,
    ) -> Result<String, CryptoError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        );

        Ok(argon2
            .hash_password(password.as_ref(), &salt)
            .map_err(|err| CryptoError::Argon2(err.to_string()))?
            .to_string())
    }

    /// Check password validity against its stored hash.
    pub fn verify_password(
        &self,
        password: impl AsRef<[u8]>,
        hash: &str,
    ) -> Result<(), CryptoError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|err| CryptoError::Argon2(err.to_string()))?;

        Argon2::default()
            .verify_password(password.as_ref(), &parsed_hash)
            .map_err(|err| CryptoError::Argon2(err.to_string()))
    }
}
