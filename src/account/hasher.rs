/// Password hashing
///
/// bcrypt is CPU-bound, so both directions run on the blocking pool.
use crate::error::{WardenError, WardenResult};
use tokio::sync::OnceCell;

#[derive(Debug)]
pub struct PasswordHasher {
    cost: u32,
    /// Hash used when the account does not exist, so unknown emails take as
    /// long to reject as wrong passwords
    dummy: OnceCell<String>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            dummy: OnceCell::new(),
        }
    }

    /// Hash a plaintext password with a fresh salt
    pub async fn hash(&self, password: &str) -> WardenResult<String> {
        let password = password.to_string();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| WardenError::Internal(format!("Hashing task failed: {}", e)))?
            .map_err(|e| WardenError::Hashing(e.to_string()))
    }

    /// Check a password against a stored hash
    ///
    /// Returns `false` for any mismatch, including a malformed stored hash.
    pub async fn verify(&self, password: &str, hash: &str) -> WardenResult<bool> {
        let password = password.to_string();
        let hash = hash.to_string();

        let result = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| WardenError::Internal(format!("Hashing task failed: {}", e)))?;

        match result {
            Ok(valid) => Ok(valid),
            Err(e) => {
                tracing::warn!(error = %e, "stored password hash could not be parsed");
                Ok(false)
            }
        }
    }

    /// Burn one verification against a throwaway hash
    pub async fn verify_dummy(&self, password: &str) {
        let dummy = self
            .dummy
            .get_or_try_init(|| self.hash("dummy_startup_value"))
            .await;

        match dummy {
            Ok(hash) => {
                let _ = self.verify(password, hash).await;
            }
            Err(e) => tracing::warn!(error = %e, "dummy hash unavailable"),
        }
    }
}
