use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::OnceLock;

use rand::Rng;

use crate::error::{Error, Result};

const ARGON2_MEMORY_KIB: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

const TOKEN_PREFIX: &str = "quire";
const LOOKUP_LENGTH: usize = 8;
const SECRET_LENGTH: usize = 24;
const SECRET_BYTES: usize = 12;

const DECOY_SECRET: &str = "quire-decoy-secret";

/// Hashes and verifies secrets (passwords and session tokens) with Argon2id,
/// and mints session tokens.
pub struct SecretHasher {
    argon2: Argon2<'static>,
    decoy_hash: OnceLock<String>,
}

impl Default for SecretHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretHasher {
    #[must_use]
    pub fn new() -> Self {
        let argon2 = match Params::new(
            ARGON2_MEMORY_KIB,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        ) {
            Ok(params) => Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            Err(_) => Argon2::default(),
        };

        Self {
            argon2,
            decoy_hash: OnceLock::new(),
        }
    }

    /// Generates a new session token with the format: quire_<lookup>_<secret>
    /// Returns (raw_token, lookup, hash)
    pub fn generate_token(&self) -> Result<(String, String, String)> {
        let lookup = generate_lookup();
        let secret = generate_secret();
        let raw_token = build_token(&lookup, &secret);
        let hash = self.hash(&raw_token)?;
        Ok((raw_token, lookup, hash))
    }

    /// Hashes a secret using Argon2id, returning a PHC string.
    pub fn hash(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| Error::Hash(format!("failed to hash secret: {e}")))?;
        Ok(hash.to_string())
    }

    /// Verifies a secret against a stored PHC hash.
    pub fn verify(&self, secret: &str, hash: &str) -> Result<bool> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| Error::Hash(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(secret.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Hash(format!("failed to verify secret: {e}"))),
        }
    }

    /// Verifies a secret against a throwaway hash and always reports a
    /// mismatch. Used when there is no stored hash, so that a missing account
    /// costs the same Argon2 work as a wrong password.
    pub fn verify_decoy(&self, secret: &str) -> Result<bool> {
        let hash = match self.decoy_hash.get() {
            Some(hash) => hash,
            None => {
                let hash = self.hash(DECOY_SECRET)?;
                self.decoy_hash.get_or_init(|| hash)
            }
        };

        self.verify(secret, hash).map(|_| false)
    }
}

/// First 8 chars of a UUID
fn generate_lookup() -> String {
    let mut uuid = uuid::Uuid::new_v4().simple().to_string();
    uuid.truncate(LOOKUP_LENGTH);
    uuid
}

fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill(&mut bytes);
    let mut secret = hex::encode(bytes);
    secret.truncate(SECRET_LENGTH);
    secret
}

fn build_token(lookup: &str, secret: &str) -> String {
    format!("{TOKEN_PREFIX}_{lookup}_{secret}")
}

/// Parses a token string into its components (lookup, secret)
pub fn parse_token(token: &str) -> Result<(String, String)> {
    let rest = token
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or(Error::InvalidTokenFormat)?;

    let (lookup, secret) = rest.split_once('_').ok_or(Error::InvalidTokenFormat)?;

    if lookup.len() != LOOKUP_LENGTH
        || secret.len() != SECRET_LENGTH
        || !lookup.chars().all(|c| c.is_ascii_hexdigit())
        || !secret.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(Error::InvalidTokenFormat);
    }

    Ok((lookup.to_string(), secret.to_string()))
}
