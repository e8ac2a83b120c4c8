//! Staff-only management of categories and locations.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use quill_core::DomainError;
use quill_core::domain::{Category, Location, MAX_TITLE_LEN};
use quill_core::ports::AuthError;
use quill_shared::dto::{CategoryRequest, LocationRequest};

use super::auth::current_user;
use super::present;
use crate::middleware::auth::Identity;
use crate::middleware::error::AppResult;
use crate::state::AppState;

/// Requires the `admin` token role and a staff flag that is still set.
async fn require_staff(state: &AppState, identity: &Identity) -> AppResult<()> {
    let still_staff =
        identity.has_role("admin") && current_user(state, identity).await?.is_staff;
    if still_staff {
        Ok(())
    } else {
        tracing::warn!(username = %identity.username, "Non-staff user attempted administration");
        Err(AuthError::InsufficientPermissions.into())
    }
}

fn check_name(field: &str, value: &str, errors: &mut Vec<String>) {
    let value = value.trim();
    if value.is_empty() {
        errors.push(format!("{field}: This field is required."));
    } else if value.chars().count() > MAX_TITLE_LEN {
        errors.push(format!("{field}: At most {MAX_TITLE_LEN} characters."));
    }
}

fn validate_category(req: &CategoryRequest) -> AppResult<()> {
    let mut errors = Vec::new();
    check_name("title", &req.title, &mut errors);
    if !Category::is_valid_slug(&req.slug) {
        errors.push(
            "slug: Use only Latin letters, digits, hyphens and underscores.".to_string(),
        );
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Validation(errors).into())
    }
}

fn validate_location(req: &LocationRequest) -> AppResult<()> {
    let mut errors = Vec::new();
    check_name("name", &req.name, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Validation(errors).into())
    }
}

/// GET /admin/categories/
pub async fn list_categories(
    state: web::Data<AppState>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    require_staff(&state, &identity).await?;
    let categories = state.categories.list_all().await?;
    Ok(HttpResponse::Ok().json(categories.iter().map(present::category).collect::<Vec<_>>()))
}

/// POST /admin/categories/
pub async fn create_category(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<CategoryRequest>,
) -> AppResult<HttpResponse> {
    require_staff(&state, &identity).await?;
    let req = body.into_inner();
    validate_category(&req)?;

    let mut category = Category::new(req.title.trim().to_string(), req.slug, req.description)
        .created(state.clock.now());
    category.is_published = req.is_published;
    let category = state.categories.create(category).await?;

    tracing::info!(slug = %category.slug, "Category created");
    Ok(HttpResponse::Created().json(present::category(&category)))
}

/// POST /admin/categories/{id}/
pub async fn update_category(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<CategoryRequest>,
) -> AppResult<HttpResponse> {
    require_staff(&state, &identity).await?;
    let id = path.into_inner();
    let req = body.into_inner();
    validate_category(&req)?;

    let mut category = state
        .categories
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound {
            entity_type: "Category",
            id,
        })?;
    category.title = req.title.trim().to_string();
    category.slug = req.slug;
    category.description = req.description;
    category.is_published = req.is_published;
    let category = state.categories.update(category).await?;

    tracing::info!(slug = %category.slug, published = category.is_published, "Category updated");
    Ok(HttpResponse::Ok().json(present::category(&category)))
}

/// DELETE /admin/categories/{id}/ - refused while posts reference it.
pub async fn delete_category(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    require_staff(&state, &identity).await?;
    let id = path.into_inner();
    state.categories.delete(id).await?;

    tracing::info!(category_id = %id, "Category deleted");
    Ok(HttpResponse::NoContent().finish())
}

/// GET /admin/locations/
pub async fn list_locations(
    state: web::Data<AppState>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    require_staff(&state, &identity).await?;
    let locations = state.locations.list_all().await?;
    Ok(HttpResponse::Ok().json(locations.iter().map(present::location).collect::<Vec<_>>()))
}

/// POST /admin/locations/
pub async fn create_location(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<LocationRequest>,
) -> AppResult<HttpResponse> {
    require_staff(&state, &identity).await?;
    let req = body.into_inner();
    validate_location(&req)?;

    let mut location = Location::new(req.name.trim().to_string()).created(state.clock.now());
    location.is_published = req.is_published;
    let location = state.locations.create(location).await?;

    tracing::info!(name = %location.name, "Location created");
    Ok(HttpResponse::Created().json(present::location(&location)))
}

/// POST /admin/locations/{id}/
pub async fn update_location(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<LocationRequest>,
) -> AppResult<HttpResponse> {
    require_staff(&state, &identity).await?;
    let id = path.into_inner();
    let req = body.into_inner();
    validate_location(&req)?;

    let mut location = state
        .locations
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound {
            entity_type: "Location",
            id,
        })?;
    location.name = req.name.trim().to_string();
    location.is_published = req.is_published;
    let location = state.locations.update(location).await?;

    Ok(HttpResponse::Ok().json(present::location(&location)))
}

/// DELETE /admin/locations/{id}/ - posts keep existing without a location.
pub async fn delete_location(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    require_staff(&state, &identity).await?;
    let id = path.into_inner();
    state.locations.delete(id).await?;

    tracing::info!(location_id = %id, "Location deleted");
    Ok(HttpResponse::NoContent().finish())
}
