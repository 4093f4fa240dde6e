//! Password hashing with Argon2.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{AuthError, AuthResult};

/// Argon2id hasher with configurable cost.
///
/// Verification reads the cost parameters from the stored PHC string, so
/// hashes created under older settings keep verifying after a change.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// Create a hasher with the given memory (KiB) and iteration costs.
    pub fn new(memory_kib: u32, iterations: u32) -> AuthResult<Self> {
        let params = Params::new(memory_kib, iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| AuthError::Config(format!("invalid argon2 parameters: {}", e)))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password into a PHC string.
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Verify a password against a PHC string.
    ///
    /// The comparison is done by the argon2 crate in constant time.
    pub fn verify(&self, password: &str, hash: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AuthError::Internal(format!("Invalid password hash: {}", e)))?;
        Ok(self
            .argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> PasswordHasher {
        PasswordHasher::new(1024, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hasher = cheap();
        let hash = hasher.hash("test_password_123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("test_password_123", &hash).unwrap());
        assert!(!hasher.verify("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = cheap();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn test_verify_uses_params_from_hash() {
        let hash = cheap().hash("pw").unwrap();
        let other = PasswordHasher::new(2048, 2).unwrap();
        assert!(other.verify("pw", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_internal_error() {
        let err = cheap().verify("pw", "not-a-phc-string").unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(matches!(PasswordHasher::new(1, 1), Err(AuthError::Config(_))));
    }
}
