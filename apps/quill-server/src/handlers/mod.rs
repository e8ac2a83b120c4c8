//! HTTP handlers and route configuration.

mod admin;
mod auth;
mod comments;
mod feed;
mod health;
mod posts;
mod present;

#[cfg(test)]
mod tests;

use actix_web::{HttpResponse, error, http::header, web};
use serde::Deserialize;
use uuid::Uuid;

use quill_core::pagination::{Page, PageRequest};
use quill_core::policy::{Access, Authored, guard_ownership};
use quill_shared::ErrorResponse;

use crate::middleware::error::{AppError, AppResult};
use crate::observability::RequestId;

/// Extractor settings, routes and the fallback for unknown paths.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| error::Error::from(AppError::BadRequest(err.to_string()))),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|_err, _req| error::Error::from(AppError::not_found("Page"))),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|_err, _req| error::Error::from(AppError::not_found("Page"))),
    )
    .configure(configure_routes)
    .default_service(web::route().to(not_found));
}

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(feed::index))
        .route("/health/", web::get().to(health::health_check))
        .route("/category/{slug}/", web::get().to(feed::category_posts))
        .route("/profile/{username}/", web::get().to(feed::profile))
        .route("/edit_profile/", web::post().to(auth::edit_profile))
        // Posts
        .route("/posts/create/", web::post().to(posts::create))
        .route("/posts/{post_id}/", web::get().to(posts::detail))
        .service(
            web::resource("/posts/{post_id}/edit/")
                .route(web::get().to(posts::edit_form))
                .route(web::post().to(posts::edit)),
        )
        .service(
            web::resource("/posts/{post_id}/delete/")
                .route(web::get().to(posts::delete_form))
                .route(web::post().to(posts::delete)),
        )
        // Comments
        .route("/posts/{post_id}/comment/", web::post().to(comments::add))
        .service(
            web::resource("/posts/{post_id}/edit_comment/{comment_id}/")
                .route(web::get().to(comments::edit_form))
                .route(web::post().to(comments::edit)),
        )
        .service(
            web::resource("/posts/{post_id}/delete_comment/{comment_id}/")
                .route(web::get().to(comments::delete_form))
                .route(web::post().to(comments::delete)),
        )
        // Accounts
        .service(
            web::scope("/auth")
                .route("/registration/", web::post().to(auth::register))
                .route("/login/", web::post().to(auth::login))
                .route("/logout/", web::post().to(auth::logout))
                .route("/password_change/", web::post().to(auth::password_change))
                .route("/me/", web::get().to(auth::me)),
        )
        // Administration
        .service(
            web::scope("/admin")
                .service(
                    web::resource("/categories/")
                        .route(web::get().to(admin::list_categories))
                        .route(web::post().to(admin::create_category)),
                )
                .service(
                    web::resource("/categories/{id}/")
                        .route(web::post().to(admin::update_category))
                        .route(web::delete().to(admin::delete_category)),
                )
                .service(
                    web::resource("/locations/")
                        .route(web::get().to(admin::list_locations))
                        .route(web::post().to(admin::create_location)),
                )
                .service(
                    web::resource("/locations/{id}/")
                        .route(web::post().to(admin::update_location))
                        .route(web::delete().to(admin::delete_location)),
                ),
        );
}

/// Fallback for unmatched routes.
async fn not_found(request_id: RequestId) -> HttpResponse {
    HttpResponse::NotFound().json(
        ErrorResponse::not_found("No route matches this path")
            .with_request_id(request_id.as_str()),
    )
}

pub(crate) fn post_url(post_id: Uuid) -> String {
    format!("/posts/{post_id}/")
}

pub(crate) fn profile_url(username: &str) -> String {
    format!("/profile/{username}/")
}

/// 302 to `location`.
pub(crate) fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// Redirect to the post's detail page unless `viewer` wrote `content`.
pub(crate) fn ensure_owner<T: Authored>(
    viewer: Uuid,
    content: &T,
    post_id: Uuid,
) -> Option<HttpResponse> {
    match guard_ownership(viewer, content) {
        Access::Allow => None,
        Access::Deny => {
            tracing::info!(%viewer, %post_id, "Refusing change by non-author");
            Some(redirect(&post_url(post_id)))
        }
    }
}

/// `?page=N` on listing routes.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
}

impl PageQuery {
    pub fn request(&self, per_page: u64) -> AppResult<PageRequest> {
        PageRequest::new(self.page.unwrap_or(1), per_page)
            .ok_or_else(|| AppError::NotFound("Invalid page".to_string()))
    }
}

/// Requests past the last page are not found.
pub(crate) fn ensure_in_range<T>(page: &Page<T>) -> AppResult<()> {
    if page.is_out_of_range() {
        return Err(AppError::NotFound("Invalid page".to_string()));
    }
    Ok(())
}
