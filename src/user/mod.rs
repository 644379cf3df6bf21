//! Account model and its public projection.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod repository;

/// A stored account.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    /// Argon2 PHC string. Never leaves the server.
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Disabled accounts keep their row but cannot authenticate.
    pub is_active: bool,
    pub is_verified: bool,
    /// Unix seconds.
    pub created_at: i64,
}

impl User {
    /// Build a fresh account: active, unverified, random ID.
    pub fn new(
        email: &str,
        username: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
        created_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_owned(),
            username: username.to_owned(),
            password: password_hash.to_owned(),
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            is_active: true,
            is_verified: false,
            created_at,
        }
    }
}

/// What the service tells the outside about an account. No password
/// hash, no activity flag, timestamps as RFC 3339.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_verified: bool,
    pub created_at: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        let created_at = DateTime::from_timestamp(user.created_at, 0)
            .map(|date| date.to_rfc3339())
            .unwrap_or_default();

        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_verified: user.is_verified,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_defaults() {
        let user = User::new(
            "test@example.com",
            "testuser",
            "$argon2id$fake",
            "",
            "",
            1_700_000_000,
        );

        assert!(user.is_active);
        assert!(!user.is_verified);
        assert_eq!(user.id.len(), 36);
    }

    #[test]
    fn test_public_projection() {
        let user = User::new(
            "test@example.com",
            "testuser",
            "$argon2id$fake",
            "Testy",
            "McTest",
            1_700_000_000,
        );
        let public = PublicUser::from(&user);

        assert_eq!(public.created_at, "2023-11-14T22:13:20+00:00");
        assert_eq!(public.username, "testuser");

        // The hash must not appear anywhere in the serialized form.
        let serialized = serde_json::to_string(&public).unwrap();
        assert!(!serialized.contains("argon2id"));
        assert!(!serialized.contains("password"));
    }
}
