//! Post detail, creation, editing and deletion.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use quill_core::DomainError;
use quill_core::domain::Post;
use quill_core::policy;
use quill_shared::dto::{PostDetailResponse, PostRequest};

use super::auth::current_user;
use super::{ensure_owner, post_url, present, profile_url, redirect};
use crate::middleware::auth::{Identity, OptionalIdentity};
use crate::middleware::error::AppResult;
use crate::state::AppState;

fn post_not_found(id: Uuid) -> DomainError {
    DomainError::NotFound {
        entity_type: "Post",
        id,
    }
}

async fn load_post(state: &AppState, post_id: Uuid) -> AppResult<Post> {
    Ok(state
        .posts
        .find_by_id(post_id)
        .await?
        .ok_or_else(|| post_not_found(post_id))?)
}

/// Field checks plus existence of the referenced category and location.
async fn validate(state: &AppState, form: &PostRequest) -> AppResult<()> {
    let mut errors = Post::validate_fields(&form.title, &form.text);

    if state.categories.find_by_id(form.category_id).await?.is_none() {
        errors.push("category_id: Select a valid choice.".to_string());
    }
    if let Some(location_id) = form.location_id {
        if state.locations.find_by_id(location_id).await?.is_none() {
            errors.push("location_id: Select a valid choice.".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Validation(errors).into())
    }
}

fn apply(post: &mut Post, form: PostRequest, now: chrono::DateTime<chrono::Utc>) {
    post.title = form.title.trim().to_string();
    post.text = form.text;
    post.image = form.image.filter(|url| !url.trim().is_empty());
    post.location_id = form.location_id;
    post.category_id = form.category_id;
    post.pub_date = form.pub_date.unwrap_or(now);
    post.is_published = form.is_published;
}

/// GET /posts/{post_id}/
pub async fn detail(
    state: web::Data<AppState>,
    viewer: OptionalIdentity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let post_id = path.into_inner();

    let summary = state
        .posts
        .find_summary(post_id)
        .await?
        .ok_or_else(|| post_not_found(post_id))?;

    let now = state.clock.now();
    if !policy::can_view(viewer.user_id(), &summary.post, &summary.category, now) {
        return Err(post_not_found(post_id).into());
    }

    let comments = state.comments.list_for_post(post_id).await?;

    Ok(HttpResponse::Ok().json(PostDetailResponse {
        post: present::post(summary),
        comments: comments.into_iter().map(present::comment).collect(),
    }))
}

/// POST /posts/create/
pub async fn create(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<PostRequest>,
) -> AppResult<HttpResponse> {
    let form = body.into_inner();
    validate(&state, &form).await?;

    let author = current_user(&state, &identity).await?;

    let now = state.clock.now();
    let mut post = Post::new(author.id, form.category_id, String::new(), String::new(), now)
        .created(now);
    apply(&mut post, form, now);
    let post = state.posts.create(post).await?;

    tracing::info!(post_id = %post.id, author = %author.username, "Post created");

    Ok(redirect(&profile_url(&author.username)))
}

/// GET /posts/{post_id}/edit/ - the current values for the edit form.
pub async fn edit_form(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let post_id = path.into_inner();
    let post = load_post(&state, post_id).await?;
    if let Some(denied) = ensure_owner(identity.user_id, &post, post_id) {
        return Ok(denied);
    }

    let summary = state
        .posts
        .find_summary(post_id)
        .await?
        .ok_or_else(|| post_not_found(post_id))?;

    Ok(HttpResponse::Ok().json(present::post(summary)))
}

/// POST /posts/{post_id}/edit/
pub async fn edit(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<PostRequest>,
) -> AppResult<HttpResponse> {
    let post_id = path.into_inner();
    let mut post = load_post(&state, post_id).await?;
    if let Some(denied) = ensure_owner(identity.user_id, &post, post_id) {
        return Ok(denied);
    }

    let form = body.into_inner();
    validate(&state, &form).await?;

    apply(&mut post, form, state.clock.now());
    state.posts.update(post).await?;

    tracing::info!(%post_id, "Post updated");

    Ok(redirect(&post_url(post_id)))
}

/// GET /posts/{post_id}/delete/ - the post awaiting confirmation.
pub async fn delete_form(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    edit_form(state, identity, path).await
}

/// POST /posts/{post_id}/delete/
pub async fn delete(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let post_id = path.into_inner();
    let post = load_post(&state, post_id).await?;
    if let Some(denied) = ensure_owner(identity.user_id, &post, post_id) {
        return Ok(denied);
    }

    state.posts.delete(post_id).await?;

    tracing::info!(%post_id, "Post deleted");

    Ok(redirect("/"))
}
