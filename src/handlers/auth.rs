//! Authentication handlers.

use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{
        jwt::{Claims, JwtConfig},
        password::PasswordService,
    },
    error::{get_db_conn, ApiError, ApiResult},
    models::{NewUser, User},
    schema::{refresh_tokens, users},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "securepassword123", min_length = 8)]
    pub password: String,
    #[schema(example = "Priya Sharma")]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "securepassword123")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in seconds; fixed at one hour by default.
    pub expires_in: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    #[schema(example = "user@example.com")]
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub created_at: chrono::NaiveDateTime,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// Auth probe for the browser extension; always 200 so the extension can
/// distinguish "logged out" from "server down".
#[derive(Debug, Serialize, ToSchema)]
pub struct ExtensionAuthStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Unix timestamp after which the cached token must be discarded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: chrono::NaiveDateTime,
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn store_refresh_token(
    conn: &mut PgConnection,
    user_id: Uuid,
    token: &str,
    expires_in_secs: i64,
) -> Result<(), diesel::result::Error> {
    let token_hash = hash_token(token);
    let expires_at = (Utc::now() + Duration::seconds(expires_in_secs)).naive_utc();

    diesel::insert_into(refresh_tokens::table)
        .values(&NewRefreshToken {
            user_id,
            token_hash,
            expires_at,
        })
        .execute(conn)?;

    Ok(())
}

fn verify_stored_token(conn: &mut PgConnection, token: &str) -> Result<Uuid, &'static str> {
    let token_hash = hash_token(token);
    let now = Utc::now().naive_utc();

    let result: Result<(Uuid, chrono::NaiveDateTime), _> = refresh_tokens::table
        .filter(refresh_tokens::token_hash.eq(&token_hash))
        .select((refresh_tokens::user_id, refresh_tokens::expires_at))
        .first(conn);

    match result {
        Ok((user_id, expires_at)) => {
            if expires_at < now {
                let _ = diesel::delete(
                    refresh_tokens::table.filter(refresh_tokens::token_hash.eq(&token_hash)),
                )
                .execute(conn);
                Err("Refresh token has expired")
            } else {
                Ok(user_id)
            }
        }
        Err(_) => Err("Invalid refresh token"),
    }
}

fn invalidate_token(conn: &mut PgConnection, token: &str) -> Result<(), diesel::result::Error> {
    let token_hash = hash_token(token);
    diesel::delete(refresh_tokens::table.filter(refresh_tokens::token_hash.eq(&token_hash)))
        .execute(conn)?;
    Ok(())
}

fn cleanup_expired_tokens(conn: &mut PgConnection, user_id: Uuid) {
    let now = Utc::now().naive_utc();
    let result = diesel::delete(
        refresh_tokens::table
            .filter(refresh_tokens::user_id.eq(user_id))
            .filter(refresh_tokens::expires_at.lt(now)),
    )
    .execute(conn);

    if let Ok(count) = result {
        if count > 0 {
            info!(user_id = %user_id, deleted_count = count, "Cleaned up expired refresh tokens");
        }
    }
}

fn generate_tokens(
    jwt_config: &Arc<JwtConfig>,
    conn: &mut PgConnection,
    user: &User,
) -> ApiResult<(String, String)> {
    let access_token = jwt_config
        .generate_access_token(user.id, &user.email)
        .map_err(|e| {
            error!(error = %e, "Token generation failed");
            ApiError::internal("Token generation failed", "TOKEN_GENERATION_ERROR")
        })?;

    let refresh_token = jwt_config.generate_refresh_token(user.id).map_err(|e| {
        error!(error = %e, "Token generation failed");
        ApiError::internal("Token generation failed", "TOKEN_GENERATION_ERROR")
    })?;

    store_refresh_token(conn, user.id, &refresh_token, jwt_config.refresh_token_expiry).map_err(
        |e| {
            error!(error = %e, "Failed to store refresh token");
            ApiError::internal("Token storage failed", "TOKEN_STORAGE_ERROR")
        },
    )?;

    Ok((access_token, refresh_token))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registration successful", body = AuthResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "User already exists", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::validation(&e));
    }

    if let Err(e) = state.password_policy.validate(&payload.password) {
        return Err(ApiError::bad_request(
            e.to_string(),
            "PASSWORD_POLICY_VIOLATION",
        ));
    }

    let password_hash =
        PasswordService::hash_password_with_cost(&payload.password, state.password_hash_cost)
            .map_err(|e| {
                error!(error = %e, "Password hashing failed");
                ApiError::internal("Failed to process password", "PASSWORD_HASH_ERROR")
            })?;

    let new_user = NewUser {
        email: payload.email.to_lowercase(),
        password_hash,
        full_name: payload.full_name,
    };

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = diesel::insert_into(users::table)
        .values(&new_user)
        .get_result(&mut conn)
        .map_err(|e| {
            warn!(error = %e, email = %new_user.email, "Failed to register user");
            ApiError::conflict("User with this email already exists", "USER_EXISTS")
        })?;

    let (access_token, refresh_token) = generate_tokens(&state.jwt_config, &mut conn, &user)?;

    info!(user_id = %user.id, email = %user.email, "User registered");

    Ok(Json(AuthResponse {
        user: user.into(),
        access_token,
        refresh_token,
        expires_in: state.jwt_config.access_token_expiry,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Invalid credentials", body = ApiError),
        (status = 403, description = "Account inactive", body = ApiError)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::validation(&e));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = users::table
        .filter(users::email.eq(payload.email.to_lowercase()))
        .select(User::as_select())
        .first(&mut conn)
        .map_err(|_| {
            warn!(email = %payload.email, "Login attempt for non-existent user");
            ApiError::unauthorized("Invalid credentials", "INVALID_CREDENTIALS")
        })?;

    if !user.is_active {
        warn!(user_id = %user.id, "Login attempt for inactive user");
        return Err(ApiError::forbidden(
            "Account is inactive",
            "ACCOUNT_INACTIVE",
        ));
    }

    let is_valid = PasswordService::verify_password(&payload.password, &user.password_hash)
        .map_err(|e| {
            error!(error = %e, "Password verification error");
            ApiError::internal("Password verification error", "PASSWORD_VERIFY_ERROR")
        })?;

    if !is_valid {
        warn!(user_id = %user.id, "Failed login attempt");
        return Err(ApiError::unauthorized(
            "Invalid credentials",
            "INVALID_CREDENTIALS",
        ));
    }

    cleanup_expired_tokens(&mut conn, user.id);

    let (access_token, refresh_token) = generate_tokens(&state.jwt_config, &mut conn, &user)?;

    info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse {
        user: user.into(),
        access_token,
        refresh_token,
        expires_in: state.jwt_config.access_token_expiry,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Authentication",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = RefreshResponse),
        (status = 401, description = "Invalid refresh token", body = ApiError)
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    if state
        .jwt_config
        .verify_refresh_token(&payload.refresh_token)
        .is_err()
    {
        return Err(ApiError::unauthorized(
            "Invalid refresh token",
            "INVALID_REFRESH_TOKEN",
        ));
    }

    let user_id = verify_stored_token(&mut conn, &payload.refresh_token)
        .map_err(|msg| ApiError::unauthorized(msg, "INVALID_REFRESH_TOKEN"))?;

    let user: User = users::table
        .filter(users::id.eq(user_id))
        .select(User::as_select())
        .first(&mut conn)
        .map_err(|_| ApiError::unauthorized("User not found", "USER_NOT_FOUND"))?;

    if !user.is_active {
        return Err(ApiError::forbidden(
            "Account is inactive",
            "ACCOUNT_INACTIVE",
        ));
    }

    // Rotation: the presented token dies with this exchange.
    invalidate_token(&mut conn, &payload.refresh_token).map_err(|e| {
        error!(error = %e, "Failed to invalidate refresh token");
        ApiError::db_error()
    })?;

    let (access_token, refresh_token) = generate_tokens(&state.jwt_config, &mut conn, &user)?;

    Ok(Json(RefreshResponse {
        access_token,
        refresh_token,
        expires_in: state.jwt_config.access_token_expiry,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Authentication",
    request_body = LogoutRequest,
    responses(
        (status = 204, description = "Logged out")
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<LogoutRequest>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;

    invalidate_token(&mut conn, &payload.refresh_token).map_err(|e| {
        error!(error = %e, "Failed to invalidate refresh token");
        ApiError::db_error()
    })?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Authentication",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<UserResponse>> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = users::table
        .filter(users::id.eq(user_id))
        .select(User::as_select())
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("User not found", "USER_NOT_FOUND"))?;

    Ok(Json(user.into()))
}

#[utoipa::path(
    get,
    path = "/api/extension/auth-status",
    tag = "Authentication",
    responses(
        (status = 200, description = "Whether the presented token is still usable", body = ExtensionAuthStatus)
    )
)]
pub async fn extension_auth_status(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Json<ExtensionAuthStatus> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let claims = token.and_then(|t| state.jwt_config.verify_access_token(t).ok());

    match claims {
        Some(claims) => Json(ExtensionAuthStatus {
            authenticated: true,
            user_id: claims.user_id(),
            email: Some(claims.email),
            expires_at: Some(claims.exp),
        }),
        None => Json(ExtensionAuthStatus {
            authenticated: false,
            user_id: None,
            email: None,
            expires_at: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_stable_hex() {
        let a = hash_token("some-token");
        let b = hash_token("some-token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_token_differs_per_token() {
        assert_ne!(hash_token("token-a"), hash_token("token-b"));
    }

    #[test]
    fn test_register_request_validation() {
        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "longenough".to_string(),
            full_name: None,
        };
        assert!(bad_email.validate().is_err());

        let short_password = RegisterRequest {
            email: "user@example.com".to_string(),
            password: "short".to_string(),
            full_name: None,
        };
        assert!(short_password.validate().is_err());

        let ok = RegisterRequest {
            email: "user@example.com".to_string(),
            password: "longenough".to_string(),
            full_name: Some("Priya Sharma".to_string()),
        };
        assert!(ok.validate().is_ok());
    }
}
