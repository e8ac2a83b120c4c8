use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Category, Location, MAX_TITLE_LEN};

/// Post entity - a blog entry gated by its publish flag and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub text: String,
    pub image: Option<String>,
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub author_id: Uuid,
    pub location_id: Option<Uuid>,
    pub category_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Create a new published post.
    pub fn new(
        author_id: Uuid,
        category_id: Uuid,
        title: String,
        text: String,
        pub_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            text,
            image: None,
            pub_date,
            is_published: true,
            author_id,
            location_id: None,
            category_id,
            created_at: Utc::now(),
        }
    }

    pub fn created(mut self, now: DateTime<Utc>) -> Self {
        self.created_at = now;
        self
    }

    /// Problems with a submitted title and text, one message per field.
    pub fn validate_fields(title: &str, text: &str) -> Vec<String> {
        let mut errors = Vec::new();
        if title.trim().is_empty() {
            errors.push("title: This field is required.".to_string());
        } else if title.trim().chars().count() > MAX_TITLE_LEN {
            errors.push(format!("title: At most {MAX_TITLE_LEN} characters."));
        }
        if text.trim().is_empty() {
            errors.push("text: This field is required.".to_string());
        }
        errors
    }
}

/// A post together with what listings and detail pages render around it.
#[derive(Debug, Clone, PartialEq)]
pub struct PostSummary {
    pub post: Post,
    pub author_username: String,
    pub category: Category,
    pub location: Option<Location>,
    pub comment_count: u64,
}

impl PostSummary {
    /// The location, if set and published.
    pub fn visible_location(&self) -> Option<&Location> {
        self.location.as_ref().filter(|l| l.is_published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_fields() {
        assert!(Post::validate_fields("Title", "Body").is_empty());
        assert_eq!(Post::validate_fields("  ", "").len(), 2);

        let long = "x".repeat(MAX_TITLE_LEN + 1);
        let errors = Post::validate_fields(&long, "Body");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("title"));
    }
}
