//! Domain values rendered as response bodies.

use uuid::Uuid;

use quill_core::domain::{Category, CommentView, Location, PostSummary, User};
use quill_core::pagination::Page;
use quill_shared::dto::{
    CategoryResponse, CommentResponse, LocationResponse, PageResponse, PostResponse, UserResponse,
};

pub fn category(category: &Category) -> CategoryResponse {
    CategoryResponse {
        id: category.id,
        title: category.title.clone(),
        slug: category.slug.clone(),
        description: category.description.clone(),
        is_published: category.is_published,
    }
}

pub fn location(location: &Location) -> LocationResponse {
    LocationResponse {
        id: location.id,
        name: location.name.clone(),
        is_published: location.is_published,
    }
}

/// A user as seen by `viewer`; the e-mail is private to its owner.
pub fn user(user: &User, viewer: Option<Uuid>) -> UserResponse {
    UserResponse {
        id: user.id,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        email: (viewer == Some(user.id)).then(|| user.email.clone()),
        created_at: user.created_at,
    }
}

pub fn post(summary: PostSummary) -> PostResponse {
    let location = summary.visible_location().map(location);
    let PostSummary {
        post,
        author_username,
        category: post_category,
        comment_count,
        ..
    } = summary;

    PostResponse {
        id: post.id,
        title: post.title,
        text: post.text,
        image: post.image,
        pub_date: post.pub_date,
        is_published: post.is_published,
        author: author_username,
        category: category(&post_category),
        location,
        comment_count,
        created_at: post.created_at,
    }
}

pub fn comment(view: CommentView) -> CommentResponse {
    CommentResponse {
        id: view.comment.id,
        post_id: view.comment.post_id,
        text: view.comment.text,
        author: view.author_username,
        created_at: view.comment.created_at,
    }
}

pub fn posts(page: Page<PostSummary>) -> PageResponse<PostResponse> {
    let num_pages = page.num_pages();
    let has_next = page.has_next();
    let has_previous = page.has_previous();
    let page = page.map(post);

    PageResponse {
        items: page.items,
        page: page.page,
        per_page: page.per_page,
        total: page.total,
        num_pages,
        has_next,
        has_previous,
    }
}
