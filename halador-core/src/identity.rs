use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Email/password identity collaborator. Credential storage and session
/// policy belong to the hosted identity platform; this seam only needs to
/// hand back a stable user id.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn register(&self, email: &str, password: &str) -> CoreResult<Uuid>;
    async fn verify(&self, email: &str, password: &str) -> CoreResult<Uuid>;
}

/// In-memory development implementation. Plaintext on purpose: it stands in
/// for the managed platform in tests and local runs, nothing else.
#[derive(Default)]
pub struct MemoryIdentity {
    accounts: Mutex<HashMap<String, (Uuid, String)>>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn register(&self, email: &str, password: &str) -> CoreResult<Uuid> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(CoreError::ValidationError("invalid email".into()));
        }
        if password.len() < 6 {
            return Err(CoreError::ValidationError(
                "password must be at least 6 characters".into(),
            ));
        }

        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&email) {
            return Err(CoreError::DuplicateError(format!(
                "account already exists for {}",
                email
            )));
        }

        let user_id = Uuid::new_v4();
        tracing::info!("registered identity {} for {}", user_id, email);
        accounts.insert(email, (user_id, password.to_string()));
        Ok(user_id)
    }

    async fn verify(&self, email: &str, password: &str) -> CoreResult<Uuid> {
        let email = email.trim().to_lowercase();
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(&email) {
            Some((user_id, stored)) if stored == password => Ok(*user_id),
            _ => Err(CoreError::AuthorizationError("invalid credentials".into())),
        }
    }
}
