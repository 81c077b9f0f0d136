use crate::database::Database;
use crate::errors::{BloodBankError, Result};
use crate::metrics;
use crate::models::{Credential, NewCredential};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use bloodbank_types::Role;
use lazy_static::lazy_static;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

/// Hash a plain password with argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| BloodBankError::Internal(format!("password hashing failed: {}", e)))
}

lazy_static! {
    /// Hash checked when the username is unknown, so both login failures cost one argon2 verify
    static ref UNKNOWN_USER_HASH: String = hash_password("unknown-user-placeholder").unwrap_or_default();
}

/// Verify a password against an argon2id hash. Malformed hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub struct CredentialStore {
    db: Arc<Database>,
    allow_staff_registration: bool,
}

impl CredentialStore {
    pub fn new(db: Arc<Database>, allow_staff_registration: bool) -> Self {
        CredentialStore {
            db,
            allow_staff_registration,
        }
    }

    /// Create a login identity with a salted password hash
    pub async fn register(&self, request: NewCredential) -> Result<Credential> {
        request.validate()?;

        if request.role == Role::Staff && !self.allow_staff_registration {
            return Err(BloodBankError::Validation(
                "staff self-registration is disabled".to_string(),
            ));
        }

        if self.db.identity_taken(&request.username, &request.email).await? {
            return Err(BloodBankError::DuplicateIdentity(request.username));
        }

        let password = request.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| BloodBankError::Internal(format!("hashing task failed: {}", e)))??;

        let credential = self
            .db
            .insert_credential(&request.username, &request.email, &password_hash, request.role)
            .await
            .map_err(|e| {
                // Lost a race with a concurrent registration
                if e.is_unique_violation() {
                    BloodBankError::DuplicateIdentity(request.username.clone())
                } else {
                    e
                }
            })?;

        info!(
            "Registered {} credential {} ({})",
            credential.role, credential.id, credential.username
        );

        Ok(credential)
    }

    /// Resolve a username/password pair to its credential
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Credential> {
        let credential = self.db.find_credential_by_username(username.trim()).await?;

        let password = password.to_string();
        let hash = match &credential {
            Some(credential) => credential.password_hash.clone(),
            None => UNKNOWN_USER_HASH.clone(),
        };
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| BloodBankError::Internal(format!("verification task failed: {}", e)))?;

        let credential = match credential {
            Some(credential) => credential,
            None => {
                metrics::LOGIN_FAILURES.inc();
                warn!("Login failed: unknown username");
                return Err(BloodBankError::InvalidCredentials);
            }
        };

        if !verified {
            metrics::LOGIN_FAILURES.inc();
            warn!("Login failed for credential {}", credential.id);
            return Err(BloodBankError::InvalidCredentials);
        }

        info!("Credential {} logged in as {}", credential.id, credential.role);
        Ok(credential)
    }

    pub async fn get(&self, credential_id: i64) -> Result<Credential> {
        self.db
            .get_credential(credential_id)
            .await?
            .ok_or_else(|| BloodBankError::NotFound(format!("credential {}", credential_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_salted_and_verifies() {
        let first = hash_password("correct horse").unwrap();
        let second = hash_password("correct horse").unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &first));
        assert!(verify_password("correct horse", &second));
        assert!(!verify_password("battery staple", &first));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "plaintext"));
        assert!(!verify_password("", ""));
    }

    #[test]
    fn test_unknown_user_hash_is_real_argon2() {
        // Must parse, otherwise the unknown-user path skips the argon2 work
        assert!(PasswordHash::new(&UNKNOWN_USER_HASH).is_ok());
        assert!(UNKNOWN_USER_HASH.starts_with("$argon2id$"));
        assert!(!verify_password("donor-password", &UNKNOWN_USER_HASH));
    }
}
