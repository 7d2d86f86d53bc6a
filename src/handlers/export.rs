//! Full-account data export.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    auth::jwt::Claims,
    error::{get_db_conn, ApiError, ApiResult},
    models::{AiGeneration, Decision, UserPreferences},
    schema::{ai_generations, decisions, user_preferences},
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct ExportMetadata {
    pub exported_at: NaiveDateTime,
    pub total_decisions: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExportPayload {
    pub metadata: ExportMetadata,
    pub decisions: Vec<Decision>,
    pub preferences: Option<UserPreferences>,
    pub ai_generations: Vec<AiGeneration>,
}

pub fn build_export(
    decisions: Vec<Decision>,
    preferences: Option<UserPreferences>,
    ai_generations: Vec<AiGeneration>,
    exported_at: NaiveDateTime,
) -> ExportPayload {
    ExportPayload {
        metadata: ExportMetadata {
            exported_at,
            total_decisions: decisions.len(),
        },
        decisions,
        preferences,
        ai_generations,
    }
}

#[utoipa::path(
    get,
    path = "/api/export",
    tag = "Export",
    responses(
        (status = 200, description = "JSON export of the caller's data", body = ExportPayload),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn export_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Response> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let rows: Vec<Decision> = decisions::table
        .filter(decisions::user_id.eq(user_id))
        .order(decisions::created_at.desc())
        .select(Decision::as_select())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let preferences: Option<UserPreferences> = user_preferences::table
        .filter(user_preferences::user_id.eq(user_id))
        .select(UserPreferences::as_select())
        .first(&mut conn)
        .optional()
        .map_err(|_| ApiError::db_error())?;

    let generations: Vec<AiGeneration> = ai_generations::table
        .filter(ai_generations::user_id.eq(user_id))
        .order(ai_generations::created_at.desc())
        .select(AiGeneration::as_select())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let exported_at = Utc::now().naive_utc();
    let payload = build_export(rows, preferences, generations, exported_at);

    info!(
        user_id = %user_id,
        decisions = payload.metadata.total_decisions,
        "Account export generated"
    );

    let filename = format!("blackbox-export-{}.json", exported_at.format("%Y-%m-%d"));

    let mut response = (StatusCode::OK, Json(payload)).into_response();
    if let Ok(value) =
        header::HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
    {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn decision(user_id: Uuid, title: &str, at: NaiveDateTime) -> Decision {
        Decision {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            decision_made: "decision text".to_string(),
            context: "context text".to_string(),
            trade_offs: "trade-off text".to_string(),
            biggest_risk: "risk text".to_string(),
            stakeholders: None,
            confidence_level: Some(7),
            tags: vec!["x".to_string()],
            source: "web".to_string(),
            is_locked: false,
            locked_at: None,
            original_input: None,
            ai_structured: false,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_export_shape_and_counts() {
        let user_id = Uuid::new_v4();
        let at = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();

        let payload = build_export(
            vec![decision(user_id, "one", at), decision(user_id, "two", at)],
            None,
            vec![],
            at,
        );

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("decisions").is_some());
        assert!(json.get("ai_generations").is_some());
        assert!(json.get("preferences").is_some());
        assert_eq!(
            json["metadata"]["total_decisions"].as_u64().unwrap() as usize,
            json["decisions"].as_array().unwrap().len()
        );
        assert_eq!(json["metadata"]["total_decisions"], 2);
    }

    #[test]
    fn test_export_of_empty_account() {
        let at = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let payload = build_export(vec![], None, vec![], at);
        assert_eq!(payload.metadata.total_decisions, 0);
        assert!(payload.decisions.is_empty());
    }
}
