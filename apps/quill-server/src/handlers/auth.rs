//! Account handlers: registration, login, password and profile changes.

use actix_web::{HttpResponse, web};

use quill_core::DomainError;
use quill_core::domain::User;
use quill_core::ports::AuthError;
use quill_shared::dto::{
    AuthResponse, LoginRequest, PasswordChangeRequest, ProfileUpdateRequest, RegisterUserRequest,
};

use super::{present, profile_url, redirect};
use crate::middleware::auth::{Identity, OptionalIdentity};
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

fn issue_token(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let token = state
        .tokens
        .generate_token(user.id, &user.username, user.roles())?;

    Ok(AuthResponse {
        access_token: token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.expiration_seconds().max(0) as u64,
    })
}

fn check_account_fields(username: &str, email: &str, errors: &mut Vec<String>) {
    if !User::is_valid_username(username) {
        errors.push(
            "username: Enter a valid username of letters, digits and @/./+/-/_ only.".to_string(),
        );
    }
    if email.is_empty() || !email.contains('@') {
        errors.push("email: Enter a valid email address.".to_string());
    }
}

/// The account behind `identity`; tokens outlive deleted accounts.
pub(crate) async fn current_user(state: &AppState, identity: &Identity) -> AppResult<User> {
    Ok(state
        .users
        .find_by_id(identity.user_id)
        .await?
        .ok_or(DomainError::Unauthorized)?)
}

fn username_taken() -> AppError {
    DomainError::Duplicate("Username already taken".to_string()).into()
}

/// POST /auth/registration/
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterUserRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();

    let mut errors = Vec::new();
    check_account_fields(&req.username, &req.email, &mut errors);
    if req.password.len() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "password: Password must be at least {MIN_PASSWORD_LEN} characters."
        ));
    }
    if !errors.is_empty() {
        return Err(DomainError::Validation(errors).into());
    }

    if state.users.find_by_username(&req.username).await?.is_some() {
        return Err(username_taken());
    }

    let password_hash = state.passwords.hash(&req.password)?;

    let mut user =
        User::new(req.username, req.email, password_hash).created(state.clock.now());
    user.first_name = req.first_name;
    user.last_name = req.last_name;
    let user = state.users.create(user).await?;

    tracing::info!(username = %user.username, "User registered");

    Ok(HttpResponse::Created().json(issue_token(&state, &user)?))
}

/// POST /auth/login/
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();

    let user = state
        .users
        .find_by_username(&req.username)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !state.passwords.verify(&req.password, &user.password_hash)? {
        tracing::info!(username = %req.username, "Rejected login");
        return Err(AuthError::InvalidCredentials.into());
    }

    Ok(HttpResponse::Ok().json(issue_token(&state, &user)?))
}

/// POST /auth/logout/ - tokens are stateless; the client discards its own.
pub async fn logout(identity: OptionalIdentity) -> HttpResponse {
    if let Some(identity) = identity.0 {
        tracing::info!(username = %identity.username, "User logged out");
    }
    HttpResponse::NoContent().finish()
}

/// POST /auth/password_change/
pub async fn password_change(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<PasswordChangeRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let mut user = current_user(&state, &identity).await?;

    let mut errors = Vec::new();
    if !state.passwords.verify(&req.old_password, &user.password_hash)? {
        errors.push("old_password: Your old password was entered incorrectly.".to_string());
    }
    if req.new_password.len() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "new_password: Password must be at least {MIN_PASSWORD_LEN} characters."
        ));
    }
    if !errors.is_empty() {
        return Err(DomainError::Validation(errors).into());
    }

    user.password_hash = state.passwords.hash(&req.new_password)?;
    user.updated_at = state.clock.now();
    state.users.update(user).await?;

    tracing::info!(username = %identity.username, "Password changed");

    Ok(HttpResponse::NoContent().finish())
}

/// GET /auth/me/
pub async fn me(state: web::Data<AppState>, identity: Identity) -> AppResult<HttpResponse> {
    let user = current_user(&state, &identity).await?;
    Ok(HttpResponse::Ok().json(present::user(&user, Some(identity.user_id))))
}

/// POST /edit_profile/
pub async fn edit_profile(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<ProfileUpdateRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let mut user = current_user(&state, &identity).await?;

    let mut errors = Vec::new();
    check_account_fields(&req.username, &req.email, &mut errors);
    if !errors.is_empty() {
        return Err(DomainError::Validation(errors).into());
    }

    if req.username != user.username
        && state.users.find_by_username(&req.username).await?.is_some()
    {
        return Err(username_taken());
    }

    user.username = req.username;
    user.first_name = req.first_name;
    user.last_name = req.last_name;
    user.email = req.email;
    user.updated_at = state.clock.now();
    let user = state.users.update(user).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "Profile updated");

    Ok(redirect(&profile_url(&user.username)))
}
