use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest accepted username.
pub const MAX_USERNAME_LEN: usize = 150;

/// User entity - an account that can author posts and comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new regular user with generated ID and timestamps.
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            first_name: String::new(),
            last_name: String::new(),
            password_hash,
            is_staff: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Promote to administrator.
    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }

    /// Stamp both timestamps with `now`.
    pub fn created(mut self, now: DateTime<Utc>) -> Self {
        self.created_at = now;
        self.updated_at = now;
        self
    }

    /// Roles embedded in this user's access tokens.
    pub fn roles(&self) -> Vec<String> {
        let mut roles = vec!["user".to_string()];
        if self.is_staff {
            roles.push("admin".to_string());
        }
        roles
    }

    /// Usernames are 1-150 characters of letters, digits and `@.+-_`.
    pub fn is_valid_username(username: &str) -> bool {
        !username.is_empty()
            && username.chars().count() <= MAX_USERNAME_LEN
            && username
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    }
}
