//! Comment submission, editing and deletion.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use quill_core::DomainError;
use quill_core::domain::{Comment, CommentView};
use quill_shared::dto::CommentRequest;

use super::auth::current_user;
use super::{ensure_owner, post_url, present, redirect};
use crate::middleware::auth::Identity;
use crate::middleware::error::AppResult;
use crate::state::AppState;

/// A comment addressed through its post; absent if it is on another post.
async fn load_comment(state: &AppState, post_id: Uuid, comment_id: Uuid) -> AppResult<Comment> {
    Ok(state
        .comments
        .find_in_post(post_id, comment_id)
        .await?
        .ok_or(DomainError::NotFound {
            entity_type: "Comment",
            id: comment_id,
        })?)
}

/// POST /posts/{post_id}/comment/
///
/// Blank, missing or non-string text is dropped without feedback; the reply
/// is always a redirect to the post.
pub async fn add(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<CommentRequest>,
) -> AppResult<HttpResponse> {
    let post_id = path.into_inner();

    state
        .posts
        .find_by_id(post_id)
        .await?
        .ok_or(DomainError::NotFound {
            entity_type: "Post",
            id: post_id,
        })?;

    let text = body.into_inner().text.unwrap_or_default();
    if text.trim().is_empty() {
        tracing::debug!(%post_id, "Ignoring blank comment");
    } else {
        let comment = Comment::new(post_id, identity.user_id, text).created(state.clock.now());
        let comment = state.comments.create(comment).await?;
        tracing::info!(%post_id, comment_id = %comment.id, "Comment added");
    }

    Ok(redirect(&post_url(post_id)))
}

/// GET /posts/{post_id}/edit_comment/{comment_id}/
pub async fn edit_form(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<(Uuid, Uuid)>,
) -> AppResult<HttpResponse> {
    let (post_id, comment_id) = path.into_inner();
    let comment = load_comment(&state, post_id, comment_id).await?;
    if let Some(denied) = ensure_owner(identity.user_id, &comment, post_id) {
        return Ok(denied);
    }

    let author = current_user(&state, &identity).await?;
    Ok(HttpResponse::Ok().json(present::comment(CommentView {
        comment,
        author_username: author.username,
    })))
}

/// POST /posts/{post_id}/edit_comment/{comment_id}/
pub async fn edit(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<CommentRequest>,
) -> AppResult<HttpResponse> {
    let (post_id, comment_id) = path.into_inner();
    let mut comment = load_comment(&state, post_id, comment_id).await?;
    if let Some(denied) = ensure_owner(identity.user_id, &comment, post_id) {
        return Ok(denied);
    }

    let text = body.into_inner().text.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(DomainError::Validation(vec!["text: This field is required.".to_string()]).into());
    }

    comment.text = text;
    state.comments.update(comment).await?;

    tracing::info!(%post_id, %comment_id, "Comment updated");

    Ok(redirect(&post_url(post_id)))
}

/// GET /posts/{post_id}/delete_comment/{comment_id}/
pub async fn delete_form(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<(Uuid, Uuid)>,
) -> AppResult<HttpResponse> {
    edit_form(state, identity, path).await
}

/// POST /posts/{post_id}/delete_comment/{comment_id}/
pub async fn delete(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<(Uuid, Uuid)>,
) -> AppResult<HttpResponse> {
    let (post_id, comment_id) = path.into_inner();
    let comment = load_comment(&state, post_id, comment_id).await?;
    if let Some(denied) = ensure_owner(identity.user_id, &comment, post_id) {
        return Ok(denied);
    }

    state.comments.delete(comment_id).await?;

    tracing::info!(%post_id, %comment_id, "Comment deleted");

    Ok(redirect(&post_url(post_id)))
}
