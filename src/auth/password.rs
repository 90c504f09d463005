use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

// Argon2::default() fixes the work factor; it is not configurable per
// request.

/// Hash a plaintext password on the blocking pool so the argon2 work never
/// stalls the async runtime.
pub async fn hash(plain: String) -> anyhow::Result<String> {
    let hash = tokio::task::spawn_blocking(move || hash_blocking(&plain)).await??;
    Ok(hash)
}

/// Verify a plaintext password against a stored PHC hash, on the blocking
/// pool. Errors only on a malformed hash; a mismatch is `Ok(false)`.
pub async fn verify(plain: String, hash: String) -> anyhow::Result<bool> {
    let ok = tokio::task::spawn_blocking(move || verify_blocking(&plain, &hash)).await??;
    Ok(ok)
}

fn hash_blocking(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

fn verify_blocking(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hashed = hash(password.to_string()).await.expect("hashing should succeed");
        assert!(verify(password.to_string(), hashed)
            .await
            .expect("verify should succeed"));
    }

    #[tokio::test]
    async fn verify_rejects_wrong_password() {
        let hashed = hash("correct-horse-battery-staple".to_string())
            .await
            .expect("hashing should succeed");
        assert!(!verify("wrong-password".to_string(), hashed)
            .await
            .expect("verify should not error"));
    }

    #[tokio::test]
    async fn verify_errors_on_malformed_hash() {
        let err = verify("anything".to_string(), "not-a-valid-hash".to_string())
            .await
            .unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_blocking("same-password").expect("hash");
        let b = hash_blocking("same-password").expect("hash");
        assert_ne!(a, b);
    }
}
