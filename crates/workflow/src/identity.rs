//! Identity provider backed by a fixed list of accounts.
//!
//! Session tokens are never held in clear: each account stores the SHA-256
//! hex digest of its token, and incoming tokens are hashed before lookup.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::ports::{IdentityProvider, Profile, ServiceError};
use crate::types::Role;

/// Hex SHA-256 of a session token.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// A configured account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticAccount {
    pub id: String,
    pub token_sha256: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

fn default_role() -> String {
    "user".to_string()
}

#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    sessions: HashMap<String, String>,
    profiles: HashMap<String, Profile>,
}

impl StaticIdentityProvider {
    pub fn new(accounts: impl IntoIterator<Item = StaticAccount>) -> Self {
        let mut provider = StaticIdentityProvider::default();
        for account in accounts {
            provider
                .sessions
                .insert(account.token_sha256.to_ascii_lowercase(), account.id.clone());
            provider.profiles.insert(
                account.id.clone(),
                Profile {
                    user_id: account.id,
                    role: Role::from_code(&account.role),
                    display_name: account.display_name,
                    email: account.email,
                },
            );
        }
        provider
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve_session(&self, token: &str) -> Result<Option<String>, ServiceError> {
        if token.is_empty() {
            return Ok(None);
        }
        Ok(self.sessions.get(&hash_token(token)).cloned())
    }

    async fn profile(&self, user_id: &str) -> Result<Option<Profile>, ServiceError> {
        Ok(self.profiles.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str, token: &str, role: &str) -> StaticAccount {
        StaticAccount {
            id: id.to_string(),
            token_sha256: hash_token(token),
            role: role.to_string(),
            display_name: Some(format!("{} name", id)),
            email: None,
        }
    }

    #[test]
    fn hash_is_lowercase_hex() {
        let digest = hash_token("secret");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
        );
    }

    #[tokio::test]
    async fn resolves_known_tokens_only() {
        let provider = StaticIdentityProvider::new([
            account("admin-1", "admin-token", "admin"),
            account("user-1", "user-token", "user"),
        ]);
        assert_eq!(
            provider.resolve_session("admin-token").await.unwrap(),
            Some("admin-1".to_string())
        );
        assert_eq!(provider.resolve_session("nope").await.unwrap(), None);
        assert_eq!(provider.resolve_session("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn profiles_carry_roles() {
        let provider = StaticIdentityProvider::new([account("admin-1", "t", "admin")]);
        let profile = provider.profile("admin-1").await.unwrap().unwrap();
        assert_eq!(profile.role, Role::Admin);
        assert_eq!(profile.display_name.as_deref(), Some("admin-1 name"));
        assert!(provider.profile("ghost").await.unwrap().is_none());
    }

    #[test]
    fn uppercase_digests_are_accepted() {
        let mut acc = account("u", "tok", "user");
        acc.token_sha256 = acc.token_sha256.to_uppercase();
        let provider = StaticIdentityProvider::new([acc]);
        assert_eq!(provider.len(), 1);
        assert!(provider.sessions.contains_key(&hash_token("tok")));
    }
}
