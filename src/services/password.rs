// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Salted password hashing with Argon2id.

use crate::config::{ConfigError, HashCost};
use crate::error::AppError;
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};

/// Hashes and verifies passwords. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    pub fn new(cost: HashCost) -> Result<Self, ConfigError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| ConfigError::Invalid {
                name: "PASSWORD_HASH_*",
                reason: e.to_string(),
            })?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash with a fresh random salt. The result is a PHC string carrying
    /// the algorithm, cost and salt alongside the hash.
    pub fn hash(&self, plaintext: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))
    }

    /// Check `plaintext` against a stored PHC string, using the cost and
    /// salt recorded in it. Malformed hashes verify as false.
    pub fn verify(&self, plaintext: &str, hashed: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hashed) else {
            return false;
        };
        self.argon2()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    /// [`hash`](Self::hash) on the blocking pool.
    pub async fn hash_blocking(&self, plaintext: String) -> Result<String, AppError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))?
    }

    /// [`verify`](Self::verify) on the blocking pool. A failed task is an
    /// error, not a mismatch.
    pub async fn verify_blocking(
        &self,
        plaintext: String,
        hashed: String,
    ) -> Result<bool, AppError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &hashed))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Verification task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(Config::test_default().hash_cost).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("pw1").unwrap();

        assert_ne!(hash, "pw1");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("pw1", &hash));
        assert!(!hasher.verify("wrong", &hash));
    }

    #[test]
    fn test_salt_differs_per_call() {
        let hasher = hasher();
        let hash1 = hasher.hash("same").unwrap();
        let hash2 = hasher.hash("same").unwrap();

        assert_ne!(hash1, hash2);
        assert!(hasher.verify("same", &hash1));
        assert!(hasher.verify("same", &hash2));
    }

    #[test]
    fn test_verify_uses_cost_embedded_in_hash() {
        let cheap = hasher();
        let stronger = PasswordHasher::new(HashCost {
            memory_kib: 64,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();

        let hash = stronger.hash("pw").unwrap();
        assert!(cheap.verify("pw", &hash));
    }

    #[test]
    fn test_verify_malformed_hash_is_false() {
        let hasher = hasher();
        assert!(!hasher.verify("pw", "plaintext-not-a-hash"));
        assert!(!hasher.verify("pw", ""));
    }

    #[test]
    fn test_invalid_cost_rejected() {
        let err = PasswordHasher::new(HashCost {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_blocking_variants() {
        let hasher = hasher();
        let hash = hasher.hash_blocking("pw".to_string()).await.unwrap();
        assert!(hasher
            .verify_blocking("pw".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!hasher
            .verify_blocking("nope".to_string(), hash)
            .await
            .unwrap());
    }

    #[test]
    fn test_verify_task_failure_is_an_error() {
        let hasher = hasher();
        let hash = hasher.hash("pw").unwrap();

        // Blocking tasks spawned after shutdown are cancelled.
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap();
        let handle = runtime.handle().clone();
        runtime.shutdown_background();

        let result = handle.block_on(hasher.verify_blocking("pw".to_string(), hash));
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
