//! User preferences handlers.

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::jwt::Claims,
    error::{get_db_conn, ApiError, ApiResult},
    models::{NewUserPreferences, UserPreferences},
    schema::user_preferences,
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePreferencesRequest {
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    #[schema(example = "Senior Backend Engineer")]
    pub current_role: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/preferences",
    tag = "Preferences",
    responses(
        (status = 200, description = "Preferences for the caller", body = UserPreferences),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_preferences(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<UserPreferences>> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let existing: Option<UserPreferences> = user_preferences::table
        .filter(user_preferences::user_id.eq(user_id))
        .select(UserPreferences::as_select())
        .first(&mut conn)
        .optional()
        .map_err(|_| ApiError::db_error())?;

    if let Some(preferences) = existing {
        return Ok(Json(preferences));
    }

    // First read seeds an empty row so later updates are plain upserts.
    let created: UserPreferences = diesel::insert_into(user_preferences::table)
        .values(&NewUserPreferences {
            user_id,
            current_role: None,
        })
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(created))
}

#[utoipa::path(
    put,
    path = "/api/preferences",
    tag = "Preferences",
    request_body = UpdatePreferencesRequest,
    responses(
        (status = 200, description = "Preferences updated", body = UserPreferences),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdatePreferencesRequest>,
) -> ApiResult<Json<UserPreferences>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::validation(&e));
    }

    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let updated: UserPreferences = diesel::insert_into(user_preferences::table)
        .values(&NewUserPreferences {
            user_id,
            current_role: payload.current_role.clone(),
        })
        .on_conflict(user_preferences::user_id)
        .do_update()
        .set((
            user_preferences::current_role.eq(payload.current_role),
            user_preferences::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(user_id = %user_id, "Preferences updated");

    Ok(Json(updated))
}
