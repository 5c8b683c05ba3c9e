use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::Profile,
    repository::{RepositoryState, UserRepository},
};

/// Claims
///
/// The payload signed into every access token (HS256).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's row id.
    pub sub: i64,
    pub username: String,
    /// Expiration Time (exp), Unix seconds.
    pub exp: i64,
    /// Issued At (iat), Unix seconds.
    pub iat: i64,
    /// Unique token id, recorded for audit.
    pub jti: String,
}

/// issue_access_token
///
/// Signs a short-lived access token for the given user. Lifetime comes from
/// `AppConfig::access_token_expiry_mins`.
pub fn issue_access_token(
    config: &AppConfig,
    user_id: i64,
    username: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: now + config.access_token_expiry_mins * 60,
        iat: now,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// Validates signature and expiry and returns the embedded claims.
pub fn decode_access_token(
    config: &AppConfig,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

/// Opaque refresh token handed to the client. Two v4 UUIDs give 244 random bits.
pub fn generate_refresh_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// SHA-256 hex digest of a refresh token. Only this value is persisted.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hashes a password with Argon2id and a random salt, returning the PHC string.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Checks a password against a stored PHC hash. A malformed hash counts as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash could not be parsed");
            false
        }
    }
}

/// AuthUser
///
/// The resolved identity of an authenticated request: the user row, the ids and names
/// of the roles they actively hold, and the union of those roles' permissions.
/// Handlers call [`AuthUser::require`] with a static permission string.
#[derive(Debug, Clone, Default)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role_ids: Vec<i64>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl AuthUser {
    pub fn has(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Fails with 403 unless the caller holds `permission`.
    pub fn require(&self, permission: &str) -> Result<(), AppError> {
        if self.has(permission) {
            Ok(())
        } else {
            tracing::debug!(user_id = self.id, permission, "Permission denied");
            Err(AppError::forbidden(permission))
        }
    }

    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            roles: self.roles.clone(),
            permissions: self.permissions.clone(),
        }
    }
}

/// load_identity
///
/// Builds the `AuthUser` for an active user id. Returns None when the user is unknown
/// or has been deactivated.
pub async fn load_identity(
    repo: &RepositoryState,
    user_id: i64,
) -> Result<Option<AuthUser>, AppError> {
    let Some(user) = repo.get_user(user_id).await? else {
        return Ok(None);
    };
    if !user.is_active {
        return Ok(None);
    }

    let roles = repo.user_roles(user.id).await?;
    let permissions = repo.user_permissions(user.id).await?;

    Ok(Some(AuthUser {
        id: user.id,
        username: user.username,
        email: user.email,
        full_name: user.full_name,
        role_ids: roles.iter().map(|r| r.id).collect(),
        roles: roles.into_iter().map(|r| r.name).collect(),
        permissions,
    }))
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: with `Env::Local`, an `x-user-id` header naming an active user
///    authenticates as that user.
/// 2. Bearer token: `Authorization: Bearer <JWT>` is decoded and validated.
/// 3. DB lookup: the user must still exist and be active; roles and permissions are
///    always read fresh, so revoking a role takes effect on the next request.
///
/// Rejection: `AppError::Unauthorized` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.trim().parse::<i64>().ok());
            if let Some(user_id) = bypass_id {
                if let Some(user) = load_identity(&repo, user_id).await? {
                    return Ok(user);
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

        let claims = decode_access_token(&config, token).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::Unauthorized("Token expired".to_string()),
            _ => AppError::Unauthorized("Invalid token".to_string()),
        })?;

        load_identity(&repo, claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found or inactive".to_string()))
    }
}
