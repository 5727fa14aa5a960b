use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// Pluggable password hashing capability. The service only depends on this
/// trait, so the algorithm can be swapped without touching the workflow.
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password into a self-describing encoded string
    /// embedding the algorithm parameters and a per-call random salt.
    fn hash(&self, plain: &str) -> anyhow::Result<String>;

    /// Recompute the hash of `plain` using the salt stored in `encoded` and
    /// compare. Errors only on a malformed encoded string.
    fn verify(&self, plain: &str, encoded: &str) -> anyhow::Result<bool>;
}

/// Default hasher: Argon2id with library defaults, PHC string output.
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, plain: &str, encoded: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(encoded).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }
}
