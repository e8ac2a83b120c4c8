//! Post listings: the front page, category pages and profiles.

use actix_web::{HttpResponse, web};

use quill_core::policy::Visibility;
use quill_core::ports::PostFilter;
use quill_shared::dto::{CategoryPageResponse, ProfileResponse};

use super::{PageQuery, ensure_in_range, present};
use crate::middleware::auth::OptionalIdentity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /
pub async fn index(
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let request = query.request(state.posts_per_page)?;
    let filter = PostFilter::new(Visibility::Public {
        now: state.clock.now(),
    });

    let page = state.posts.list(filter, request).await?;
    ensure_in_range(&page)?;

    Ok(HttpResponse::Ok().json(present::posts(page)))
}

/// GET /category/{slug}/ - only published categories exist publicly.
pub async fn category_posts(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let slug = path.into_inner();
    let request = query.request(state.posts_per_page)?;

    let category = state
        .categories
        .find_by_slug(&slug)
        .await?
        .filter(|c| c.is_published)
        .ok_or_else(|| AppError::not_found("Category"))?;

    let filter = PostFilter::new(Visibility::Public {
        now: state.clock.now(),
    })
    .in_category(category.id);

    let page = state.posts.list(filter, request).await?;
    ensure_in_range(&page)?;

    Ok(HttpResponse::Ok().json(CategoryPageResponse {
        category: present::category(&category),
        posts: present::posts(page),
    }))
}

/// GET /profile/{username}/ - everything for the owner, public posts for others.
pub async fn profile(
    state: web::Data<AppState>,
    viewer: OptionalIdentity,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let username = path.into_inner();
    let request = query.request(state.posts_per_page)?;

    let author = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let visibility = Visibility::for_viewer(viewer.user_id(), author.id, state.clock.now());
    let filter = PostFilter::new(visibility).by_author(author.id);

    let page = state.posts.list(filter, request).await?;
    ensure_in_range(&page)?;

    Ok(HttpResponse::Ok().json(ProfileResponse {
        profile: present::user(&author, viewer.user_id()),
        posts: present::posts(page),
    }))
}
