use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, instrument, warn};

use super::{
    dto::{
        AuthResponse, CheckEmailResponse, EmailRequest, ForgotPasswordResponse, LoginRequest,
        MessageResponse, PublicUser, RefreshRequest, RegisterRequest, ResetPasswordRequest,
    },
    jwt::{AuthUser, JwtKeys},
    password::{check_strength, hash_password, verify_password},
    repo_types::{AuthProvider, NewUser},
    services::{generate_reset_token, hash_reset_token, issue_tokens, reset_link},
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
    validation::{is_valid_email, normalize_email, optional_text},
};

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent.";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/check-email", post(check_email))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn valid_email(raw: &str) -> AppResult<String> {
    let email = normalize_email(raw);
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    Ok(email)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = valid_email(&payload.email)?;
    check_strength(&payload.password)?;
    let name = optional_text("name", payload.name.as_deref(), 100)?;

    if state.store.find_user_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let user = state
        .store
        .create_user(NewUser {
            email,
            name,
            image: None,
            provider: AuthProvider::Credentials,
            password_hash: Some(hash_password(&payload.password)?),
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    let keys = JwtKeys::from_ref(&state);
    Ok(Json(issue_tokens(&keys, user)?))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = valid_email(&payload.email)?;
    let invalid = || AppError::Unauthorized("Invalid credentials".into());

    let Some(user) = state.store.find_user_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(invalid());
    };

    let Some(hash) = user.password_hash.as_deref() else {
        warn!(user_id = %user.id, provider = user.provider.as_str(), "password login on oauth-only account");
        return Err(invalid());
    };

    if !verify_password(&payload.password, hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    let keys = JwtKeys::from_ref(&state);
    Ok(Json(issue_tokens(&keys, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let user = state
        .store
        .find_user_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(Json(issue_tokens(&keys, user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<PublicUser>> {
    let user = state.store.find_user_by_id(user_id).await?.ok_or_else(|| {
        warn!(user_id = %user_id, "token for a missing user");
        AppError::Unauthorized("User not found".into())
    })?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn check_email(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> AppResult<Json<CheckEmailResponse>> {
    let email = payload
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::Validation("Email is required".into()))?;

    let exists = state.store.find_user_by_email(&email).await?.is_some();
    Ok(Json(CheckEmailResponse { exists, email }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> AppResult<Json<ForgotPasswordResponse>> {
    let email = payload
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::Validation("Email is required".into()))?;

    // same answer whether or not the account exists
    let reply = Json(ForgotPasswordResponse {
        success: true,
        message: FORGOT_PASSWORD_MESSAGE,
    });

    let Some(user) = state.store.find_user_by_email(&email).await? else {
        debug!("password reset requested for unknown email");
        return Ok(reply);
    };

    let now = OffsetDateTime::now_utc();
    let purged = state.store.purge_expired_reset_tokens(&email, now).await?;
    let token = generate_reset_token();
    let expires_at = now + Duration::minutes(state.config.reset_token_ttl_minutes);
    state
        .store
        .create_reset_token(&email, &hash_reset_token(&token), expires_at)
        .await?;

    info!(user_id = %user.id, purged, "password reset link issued");
    debug!(link = %reset_link(&state.config.public_url, &token), "password reset link");
    Ok(reply)
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let invalid = || AppError::BadRequest("Invalid or expired reset token".into());
    let token = payload.token.trim();
    if token.is_empty() {
        return Err(invalid());
    }
    check_strength(&payload.password)?;

    let now = OffsetDateTime::now_utc();
    let record = state
        .store
        .find_reset_token(&hash_reset_token(token))
        .await?
        .filter(|t| t.is_redeemable(now))
        .ok_or_else(invalid)?;

    let user = state
        .store
        .find_user_by_email(&record.email)
        .await?
        .ok_or_else(invalid)?;
    let password_hash = hash_password(&payload.password)?;

    // Claim first: of two concurrent redemptions only one gets the token.
    if !state.store.mark_reset_token_used(record.id).await? {
        warn!(token_id = %record.id, "reset token already redeemed");
        return Err(invalid());
    }
    state.store.set_password(user.id, &password_hash).await?;

    info!(user_id = %user.id, "password reset");
    Ok(Json(MessageResponse {
        success: true,
        message: "Password has been reset",
    }))
}
