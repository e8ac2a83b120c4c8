//! Domain entities - the core business objects.

mod category;
mod comment;
mod location;
mod post;
mod user;

pub use category::Category;
pub use comment::{Comment, CommentView};
pub use location::Location;
pub use post::{Post, PostSummary};
pub use user::User;

/// Longest title/name accepted for posts, categories and locations.
pub const MAX_TITLE_LEN: usize = 256;
