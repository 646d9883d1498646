use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("password verification task failed: {0}")]
    TaskJoin(String),
}

/// Compare a plaintext password against a stored bcrypt hash. The work runs
/// on the blocking pool; bcrypt is deliberately slow.
pub async fn verify(plain: &str, hashed: &str) -> Result<bool, PasswordError> {
    let plain = plain.to_string();
    let hashed = hashed.to_string();

    tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hashed))
        .await
        .map_err(|e| PasswordError::TaskJoin(e.to_string()))?
        .map_err(PasswordError::from)
}

/// Hash a plaintext password for storage. Used by provisioning only; the
/// request path never writes hashes.
pub async fn hash(plain: &str) -> Result<String, PasswordError> {
    let plain = plain.to_string();

    tokio::task::spawn_blocking(move || bcrypt::hash(plain, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| PasswordError::TaskJoin(e.to_string()))?
        .map_err(PasswordError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn verifies_matching_password() {
        let hashed = hash("pw1").await.unwrap();
        assert!(verify("pw1", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_wrong_password() {
        let hashed = hash("pw1").await.unwrap();
        assert!(!verify("wrongpw", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn hashes_are_salted() {
        let a = hash("pw1").await.unwrap();
        let b = hash("pw1").await.unwrap();
        assert_ne!(a, b);
    }
}
