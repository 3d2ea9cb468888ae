use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PassphraseError {
    #[error("Passphrase hashing failed: {0}")]
    Hash(String),

    #[error("Stored passphrase hash is unreadable: {0}")]
    CorruptHash(String),

    #[error("Hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Hashes a passphrase into a PHC string with a fresh salt.
///
/// Runs on the blocking pool; argon2 is deliberately slow.
pub async fn hash_passphrase(passphrase: SecretString) -> Result<String, PassphraseError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(passphrase.expose_secret().as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PassphraseError::Hash(e.to_string()))
    })
    .await?
}

/// Checks an entered passphrase against a stored hash in constant time.
pub async fn verify_passphrase(
    entered: SecretString,
    stored_hash: String,
) -> Result<bool, PassphraseError> {
    tokio::task::spawn_blocking(move || {
        let parsed =
            PasswordHash::new(&stored_hash).map_err(|e| PassphraseError::CorruptHash(e.to_string()))?;

        match Argon2::default().verify_password(entered.expose_secret().as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PassphraseError::Hash(e.to_string())),
        }
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hash = hash_passphrase(SecretString::from("hunter2".to_string()))
            .await
            .unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(!hash.contains("hunter2"));
        assert!(
            verify_passphrase(SecretString::from("hunter2".to_string()), hash.clone())
                .await
                .unwrap()
        );
        assert!(
            !verify_passphrase(SecretString::from("hunter3".to_string()), hash)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_same_passphrase_different_salt() {
        let a = hash_passphrase(SecretString::from("same".to_string())).await.unwrap();
        let b = hash_passphrase(SecretString::from("same".to_string())).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_corrupt_hash_is_an_error() {
        let result =
            verify_passphrase(SecretString::from("x".to_string()), "not-a-hash".to_string()).await;
        assert!(matches!(result, Err(PassphraseError::CorruptHash(_))));
    }
}
