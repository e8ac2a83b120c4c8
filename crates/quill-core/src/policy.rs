//! Visibility and ownership rules for published content.
//!
//! A post is publicly visible when it is published, its category is
//! published, and its publish date has passed. Authors always see their own
//! posts. Only the author of a post or comment may change it.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Category, Comment, Post};

/// Which posts a listing may include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Only publicly visible posts as of `now`.
    Public { now: DateTime<Utc> },
    /// Every post, regardless of publish state.
    All,
}

impl Visibility {
    /// Visibility of `owner`'s posts to `viewer`.
    pub fn for_viewer(viewer: Option<Uuid>, owner: Uuid, now: DateTime<Utc>) -> Self {
        if viewer == Some(owner) {
            Visibility::All
        } else {
            Visibility::Public { now }
        }
    }

    /// Whether `post` in `category` passes this filter.
    pub fn admits(&self, post: &Post, category: &Category) -> bool {
        match self {
            Visibility::Public { now } => is_publicly_visible(post, category, *now),
            Visibility::All => true,
        }
    }
}

/// `is_published ∧ category.is_published ∧ pub_date ≤ now`.
pub fn is_publicly_visible(post: &Post, category: &Category, now: DateTime<Utc>) -> bool {
    post.is_published && category.is_published && post.pub_date <= now
}

/// Whether `viewer` may see `post`.
pub fn can_view(viewer: Option<Uuid>, post: &Post, category: &Category, now: DateTime<Utc>) -> bool {
    viewer == Some(post.author_id) || is_publicly_visible(post, category, now)
}

/// Content with a single author.
pub trait Authored {
    fn author_id(&self) -> Uuid;
}

impl Authored for Post {
    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

impl Authored for Comment {
    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

/// Outcome of the ownership guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

/// Allow mutation only when `viewer` wrote `content`.
pub fn guard_ownership<T: Authored>(viewer: Uuid, content: &T) -> Access {
    if content.author_id() == viewer {
        Access::Allow
    } else {
        Access::Deny
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fixture() -> (Post, Category, DateTime<Utc>) {
        let now = Utc::now();
        let category = Category::new("Travel".into(), "travel".into(), String::new());
        let post = Post::new(
            Uuid::new_v4(),
            category.id,
            "Title".into(),
            "Text".into(),
            now - Duration::hours(1),
        );
        (post, category, now)
    }

    #[test]
    fn test_published_post_is_visible() {
        let (post, category, now) = fixture();
        assert!(is_publicly_visible(&post, &category, now));
        assert!(can_view(None, &post, &category, now));
    }

    #[test]
    fn test_unpublished_post_hidden_from_others() {
        let (mut post, category, now) = fixture();
        post.is_published = false;

        assert!(!can_view(None, &post, &category, now));
        assert!(!can_view(Some(Uuid::new_v4()), &post, &category, now));
        assert!(can_view(Some(post.author_id), &post, &category, now));
    }

    #[test]
    fn test_unpublished_category_hides_post() {
        let (post, mut category, now) = fixture();
        category.is_published = false;

        assert!(!is_publicly_visible(&post, &category, now));
        assert!(can_view(Some(post.author_id), &post, &category, now));
    }

    #[test]
    fn test_future_post_hidden_until_pub_date() {
        let (mut post, category, now) = fixture();
        post.pub_date = now + Duration::days(1);

        assert!(!is_publicly_visible(&post, &category, now));
        assert!(is_publicly_visible(&post, &category, post.pub_date));
        assert!(is_publicly_visible(
            &post,
            &category,
            now + Duration::days(2)
        ));
    }

    #[test]
    fn test_visibility_for_viewer() {
        let owner = Uuid::new_v4();
        let now = Utc::now();

        assert_eq!(Visibility::for_viewer(Some(owner), owner, now), Visibility::All);
        assert_eq!(
            Visibility::for_viewer(None, owner, now),
            Visibility::Public { now }
        );
        assert_eq!(
            Visibility::for_viewer(Some(Uuid::new_v4()), owner, now),
            Visibility::Public { now }
        );
    }

    #[test]
    fn test_visibility_admits() {
        let (mut post, category, now) = fixture();
        post.is_published = false;

        assert!(Visibility::All.admits(&post, &category));
        assert!(!Visibility::Public { now }.admits(&post, &category));
    }

    #[test]
    fn test_ownership_guard() {
        let author = Uuid::new_v4();
        let comment = Comment::new(Uuid::new_v4(), author, "hi".into());

        assert_eq!(guard_ownership(author, &comment), Access::Allow);
        assert_eq!(guard_ownership(Uuid::new_v4(), &comment), Access::Deny);
    }
}
