use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::{Duration, Utc};

use super::record_activity;
use crate::{
    AppState,
    auth::{
        AuthUser, generate_refresh_token, hash_refresh_token, issue_access_token, load_identity,
        verify_password,
    },
    error::{AppError, AppResult},
    extract::{ValidatedJson, client_ip},
    models::{LoginRequest, NewActivity, Profile, RefreshRequest, TokenResponse},
    repository::UserRepository,
};

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid username or password".to_string())
}

fn invalid_refresh_token() -> AppError {
    AppError::Unauthorized("Invalid or expired refresh token".to_string())
}

/// issue_tokens
///
/// Mints an access token plus a fresh refresh token for `identity`. Only the hash
/// of the refresh token is stored.
async fn issue_tokens(state: &AppState, identity: AuthUser) -> AppResult<TokenResponse> {
    let config = &state.config;
    let access_token = issue_access_token(config, identity.id, &identity.username)
        .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))?;

    let refresh_token = generate_refresh_token();
    let expires_at = Utc::now() + Duration::days(config.refresh_token_expiry_days);
    state
        .repo
        .store_refresh_token(identity.id, &hash_refresh_token(&refresh_token), expires_at)
        .await?;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: config.access_token_expiry_mins * 60,
        user: identity.profile(),
    })
}

/// login
///
/// [Public Route] Exchanges a username (or email) and password for a token pair.
/// Unknown users, wrong passwords and deactivated accounts all get the same 401.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let identifier = payload.username.trim();
    let credentials = state.repo.find_credentials(identifier).await?;

    let user_id = match credentials {
        Some(c) if c.is_active && verify_password(&payload.password, &c.password_hash) => c.id,
        _ => {
            tracing::info!(identifier, "Rejected login attempt");
            let entry = NewActivity {
                action: "login_failed".to_string(),
                entity_type: "user".to_string(),
                details: Some(format!("identifier={identifier}")),
                ip_address: client_ip(&headers),
                ..Default::default()
            };
            record_activity(&state.repo, entry).await;
            return Err(invalid_credentials());
        }
    };

    state.repo.record_login(user_id).await?;
    let identity = load_identity(&state.repo, user_id)
        .await?
        .ok_or_else(invalid_credentials)?;

    let tokens = issue_tokens(&state, identity).await?;
    tracing::info!(user_id, "User logged in");
    record_activity(
        &state.repo,
        NewActivity::new(user_id, "login", "user", Some(user_id)).ip(client_ip(&headers)),
    )
    .await;

    Ok(Json(tokens))
}

/// refresh
///
/// [Public Route] Rotates a refresh token. The presented token is revoked before the
/// new pair is issued, so each refresh token works exactly once.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 401, description = "Unknown, expired or already used token")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let hash = hash_refresh_token(payload.refresh_token.trim());
    let record = state
        .repo
        .find_refresh_token(&hash)
        .await?
        .ok_or_else(invalid_refresh_token)?;

    if record.revoked || record.expires_at <= Utc::now() {
        return Err(invalid_refresh_token());
    }
    // Conditional revoke: a concurrent refresh with the same token loses here.
    if !state.repo.revoke_refresh_token(record.id).await? {
        return Err(invalid_refresh_token());
    }

    let identity = load_identity(&state.repo, record.user_id)
        .await?
        .ok_or_else(invalid_refresh_token)?;

    Ok(Json(issue_tokens(&state, identity).await?))
}

/// logout
///
/// [Authenticated Route] Revokes every refresh token the caller holds. Access tokens
/// simply run out.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Logged out"))
)]
pub async fn logout(user: AuthUser, State(state): State<AppState>) -> AppResult<StatusCode> {
    let revoked = state.repo.revoke_user_tokens(user.id).await?;
    tracing::debug!(user_id = user.id, revoked, "Refresh tokens revoked");
    record_activity(
        &state.repo,
        NewActivity::new(user.id, "logout", "user", Some(user.id)),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses((status = 200, description = "Caller profile", body = Profile))
)]
pub async fn me(user: AuthUser) -> Json<Profile> {
    Json(user.profile())
}
