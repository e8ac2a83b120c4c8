use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category entity - a publishable grouping of posts addressed by slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(title: String, slug: String, description: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            slug,
            description,
            is_published: true,
            created_at: Utc::now(),
        }
    }

    pub fn created(mut self, now: DateTime<Utc>) -> Self {
        self.created_at = now;
        self
    }

    /// Slugs are non-empty ASCII letters, digits, hyphens and underscores.
    pub fn is_valid_slug(slug: &str) -> bool {
        !slug.is_empty()
            && slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_rules() {
        assert!(Category::is_valid_slug("travel_2024-notes"));
        assert!(!Category::is_valid_slug(""));
        assert!(!Category::is_valid_slug("путешествия"));
        assert!(!Category::is_valid_slug("a/b"));
    }
}
