//! Decision journal handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    auth::jwt::Claims,
    error::{get_db_conn, ApiError, ApiResult},
    models::{Decision, NewDecision},
    schema::decisions,
    AppState,
};

pub const MAX_TAGS: usize = 5;
pub const MAX_TAG_CHARS: usize = 50;
pub const MAX_SEARCH_CHARS: usize = 200;
pub const MAX_TAG_FILTERS: usize = 10;

const DECISION_SOURCES: &[&str] = &["web", "chrome_extension", "slack", "github"];

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateDecisionRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    #[schema(example = "Chose Postgres over DynamoDB")]
    pub title: String,
    #[validate(length(min = 10, max = 5000, message = "must be 10-5000 characters"))]
    pub decision_made: String,
    #[validate(length(min = 10, max = 5000, message = "must be 10-5000 characters"))]
    pub context: String,
    #[validate(length(min = 10, max = 5000, message = "must be 10-5000 characters"))]
    pub trade_offs: String,
    #[validate(length(min = 10, max = 5000, message = "must be 10-5000 characters"))]
    pub biggest_risk: String,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub stakeholders: Option<String>,
    #[validate(range(min = 1, max = 10, message = "must be between 1 and 10"))]
    #[schema(example = 7)]
    pub confidence_level: Option<i32>,
    #[serde(default)]
    #[validate(custom(function = validate_tags))]
    pub tags: Vec<String>,
    #[serde(default = "default_source")]
    #[validate(custom(function = validate_source))]
    #[schema(example = "web")]
    pub source: String,
    pub original_input: Option<String>,
    #[serde(default)]
    pub ai_structured: bool,
}

fn default_source() -> String {
    "web".to_string()
}

fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > MAX_TAGS {
        let mut error = ValidationError::new("too_many_tags");
        error.message = Some(format!("at most {} tags allowed", MAX_TAGS).into());
        return Err(error);
    }
    if tags.iter().any(|t| t.is_empty() || t.chars().count() > MAX_TAG_CHARS) {
        let mut error = ValidationError::new("tag_length");
        error.message = Some(format!("each tag must be 1-{} characters", MAX_TAG_CHARS).into());
        return Err(error);
    }
    Ok(())
}

fn validate_source(source: &str) -> Result<(), ValidationError> {
    if DECISION_SOURCES.contains(&source) {
        Ok(())
    } else {
        let mut error = ValidationError::new("unknown_source");
        error.message = Some("must be one of web, chrome_extension, slack, github".into());
        Err(error)
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateDecisionRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub title: String,
    #[validate(length(min = 10, max = 5000, message = "must be 10-5000 characters"))]
    pub decision_made: String,
    #[validate(length(min = 10, max = 5000, message = "must be 10-5000 characters"))]
    pub context: String,
    #[validate(length(min = 10, max = 5000, message = "must be 10-5000 characters"))]
    pub trade_offs: String,
    #[validate(length(min = 10, max = 5000, message = "must be 10-5000 characters"))]
    pub biggest_risk: String,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub stakeholders: Option<String>,
    #[validate(range(min = 1, max = 10, message = "must be between 1 and 10"))]
    pub confidence_level: Option<i32>,
    #[serde(default)]
    #[validate(custom(function = validate_tags))]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListDecisionsQuery {
    /// Case-insensitive substring match over title and decision text.
    pub search: Option<String>,
    /// Comma-separated tags; rows must carry all of them.
    pub tags: Option<String>,
    #[serde(default = "default_page")]
    #[param(minimum = 1, default = 1)]
    pub page: i64,
    #[serde(default = "default_per_page")]
    #[param(minimum = 1, maximum = 100, default = 20)]
    pub per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    DEFAULT_PER_PAGE
}

impl ListDecisionsQuery {
    fn page(&self) -> i64 {
        self.page.max(1)
    }

    fn per_page(&self) -> i64 {
        self.per_page.clamp(1, MAX_PER_PAGE)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListMeta {
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DecisionListResponse {
    pub data: Vec<Decision>,
    pub pagination: ListMeta,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LockRequest {
    pub locked: bool,
}

/// Escapes LIKE wildcards so user input only ever matches literally.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Splits the comma-separated tag filter, dropping empties.
pub fn parse_tag_filter(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[utoipa::path(
    post,
    path = "/api/decisions",
    tag = "Decisions",
    request_body = CreateDecisionRequest,
    responses(
        (status = 201, description = "Decision created", body = Decision),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_decision(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateDecisionRequest>,
) -> ApiResult<(StatusCode, Json<Decision>)> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::validation(&e));
    }

    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let new_decision = NewDecision {
        user_id,
        title: payload.title,
        decision_made: payload.decision_made,
        context: payload.context,
        trade_offs: payload.trade_offs,
        biggest_risk: payload.biggest_risk,
        stakeholders: payload.stakeholders,
        confidence_level: payload.confidence_level,
        tags: payload.tags,
        source: payload.source,
        original_input: payload.original_input,
        ai_structured: payload.ai_structured,
    };

    let decision: Decision = diesel::insert_into(decisions::table)
        .values(&new_decision)
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(decision_id = %decision.id, user_id = %user_id, source = %decision.source, "Decision created");

    Ok((StatusCode::CREATED, Json(decision)))
}

#[utoipa::path(
    get,
    path = "/api/decisions",
    tag = "Decisions",
    params(ListDecisionsQuery),
    responses(
        (status = 200, description = "Decisions ordered newest first", body = DecisionListResponse),
        (status = 400, description = "Invalid query", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_decisions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListDecisionsQuery>,
) -> ApiResult<Json<DecisionListResponse>> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    if let Some(search) = &query.search {
        if search.chars().count() > MAX_SEARCH_CHARS {
            return Err(ApiError::bad_request(
                format!("search: must be at most {} characters", MAX_SEARCH_CHARS),
                "VALIDATION_ERROR",
            ));
        }
    }

    let tag_filter = query.tags.as_deref().map(parse_tag_filter).unwrap_or_default();
    if tag_filter.len() > MAX_TAG_FILTERS {
        return Err(ApiError::bad_request(
            format!("tags: at most {} tag filters allowed", MAX_TAG_FILTERS),
            "VALIDATION_ERROR",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let mut rows = decisions::table
        .filter(decisions::user_id.eq(user_id))
        .select(Decision::as_select())
        .into_boxed();
    let mut count = decisions::table
        .filter(decisions::user_id.eq(user_id))
        .count()
        .into_boxed();

    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        rows = rows.filter(
            decisions::title
                .ilike(pattern.clone())
                .or(decisions::decision_made.ilike(pattern.clone())),
        );
        count = count.filter(
            decisions::title
                .ilike(pattern.clone())
                .or(decisions::decision_made.ilike(pattern)),
        );
    }

    if !tag_filter.is_empty() {
        rows = rows.filter(decisions::tags.contains(tag_filter.clone()));
        count = count.filter(decisions::tags.contains(tag_filter));
    }

    let total_count: i64 = count
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (page, per_page) = (query.page(), query.per_page());

    let data: Vec<Decision> = rows
        .order(decisions::created_at.desc())
        .limit(per_page)
        .offset((page - 1) * per_page)
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(DecisionListResponse {
        data,
        pagination: ListMeta {
            page,
            per_page,
            total_count,
        },
    }))
}

#[utoipa::path(
    get,
    path = "/api/decisions/{id}",
    tag = "Decisions",
    params(("id" = Uuid, Path, description = "Decision id")),
    responses(
        (status = 200, description = "Decision", body = Decision),
        (status = 404, description = "Not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_decision(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Decision>> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let mut conn = get_db_conn(&state.db_pool)?;
    let decision = load_owned_decision(&mut conn, id, user_id)?;
    Ok(Json(decision))
}

#[utoipa::path(
    put,
    path = "/api/decisions/{id}",
    tag = "Decisions",
    params(("id" = Uuid, Path, description = "Decision id")),
    request_body = UpdateDecisionRequest,
    responses(
        (status = 200, description = "Decision updated", body = Decision),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 403, description = "Decision is locked", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_decision(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDecisionRequest>,
) -> ApiResult<Json<Decision>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::validation(&e));
    }

    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let existing = load_owned_decision(&mut conn, id, user_id)?;
    if existing.is_locked {
        return Err(locked_error());
    }

    let updated: Decision = diesel::update(
        decisions::table
            .filter(decisions::id.eq(id))
            .filter(decisions::user_id.eq(user_id)),
    )
    .set((
        decisions::title.eq(payload.title),
        decisions::decision_made.eq(payload.decision_made),
        decisions::context.eq(payload.context),
        decisions::trade_offs.eq(payload.trade_offs),
        decisions::biggest_risk.eq(payload.biggest_risk),
        decisions::stakeholders.eq(payload.stakeholders),
        decisions::confidence_level.eq(payload.confidence_level),
        decisions::tags.eq(payload.tags),
        decisions::updated_at.eq(Utc::now().naive_utc()),
    ))
    .get_result(&mut conn)
    .map_err(|_| ApiError::db_error())?;

    info!(decision_id = %id, user_id = %user_id, "Decision updated");

    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/decisions/{id}",
    tag = "Decisions",
    params(("id" = Uuid, Path, description = "Decision id")),
    responses(
        (status = 204, description = "Decision deleted"),
        (status = 403, description = "Decision is locked", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_decision(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let existing = load_owned_decision(&mut conn, id, user_id)?;
    if existing.is_locked {
        return Err(locked_error());
    }

    diesel::delete(
        decisions::table
            .filter(decisions::id.eq(id))
            .filter(decisions::user_id.eq(user_id)),
    )
    .execute(&mut conn)
    .map_err(|_| ApiError::db_error())?;

    info!(decision_id = %id, user_id = %user_id, "Decision deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/decisions/{id}/lock",
    tag = "Decisions",
    params(("id" = Uuid, Path, description = "Decision id")),
    request_body = LockRequest,
    responses(
        (status = 200, description = "Lock state changed", body = Decision),
        (status = 404, description = "Not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn lock_decision(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LockRequest>,
) -> ApiResult<Json<Decision>> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    // Ownership check; locking an already-locked row is a no-op rewrite.
    load_owned_decision(&mut conn, id, user_id)?;

    let locked_at = payload.locked.then(|| Utc::now().naive_utc());

    let updated: Decision = diesel::update(
        decisions::table
            .filter(decisions::id.eq(id))
            .filter(decisions::user_id.eq(user_id)),
    )
    .set((
        decisions::is_locked.eq(payload.locked),
        decisions::locked_at.eq(locked_at),
    ))
    .get_result(&mut conn)
    .map_err(|_| ApiError::db_error())?;

    info!(decision_id = %id, user_id = %user_id, locked = payload.locked, "Decision lock changed");

    Ok(Json(updated))
}

fn load_owned_decision(
    conn: &mut PgConnection,
    id: Uuid,
    user_id: Uuid,
) -> Result<Decision, (StatusCode, Json<ApiError>)> {
    decisions::table
        .filter(decisions::id.eq(id))
        .filter(decisions::user_id.eq(user_id))
        .select(Decision::as_select())
        .first(conn)
        .map_err(|_| ApiError::not_found("Decision not found", "DECISION_NOT_FOUND"))
}

fn locked_error() -> (StatusCode, Json<ApiError>) {
    ApiError::forbidden(
        "Decision is locked. Unlock it before making changes",
        "DECISION_LOCKED",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_create_payload() -> serde_json::Value {
        serde_json::json!({
            "title": "Chose Postgres over DynamoDB",
            "decision_made": "We will run the service on managed Postgres.",
            "context": "The team knows SQL and access patterns are relational.",
            "trade_offs": "We give up single-digit-ms key lookups at scale.",
            "biggest_risk": "Connection exhaustion under burst traffic."
        })
    }

    fn parse(value: serde_json::Value) -> CreateDecisionRequest {
        serde_json::from_value(value).expect("payload should deserialize")
    }

    #[test]
    fn test_valid_payload_passes() {
        assert!(parse(valid_create_payload()).validate().is_ok());
    }

    #[test]
    fn test_decision_made_boundary_lengths() {
        let mut payload = valid_create_payload();
        payload["decision_made"] = serde_json::json!("a".repeat(9));
        assert!(parse(payload).validate().is_err());

        let mut payload = valid_create_payload();
        payload["decision_made"] = serde_json::json!("a".repeat(10));
        assert!(parse(payload).validate().is_ok());
    }

    #[test]
    fn test_title_bounds() {
        let mut payload = valid_create_payload();
        payload["title"] = serde_json::json!("");
        assert!(parse(payload).validate().is_err());

        let mut payload = valid_create_payload();
        payload["title"] = serde_json::json!("t".repeat(201));
        assert!(parse(payload).validate().is_err());
    }

    #[test]
    fn test_tags_default_to_empty_and_ai_structured_to_false() {
        let request = parse(valid_create_payload());
        assert!(request.tags.is_empty());
        assert!(!request.ai_structured);
        assert_eq!(request.source, "web");
    }

    #[test]
    fn test_more_than_five_tags_rejected() {
        let mut payload = valid_create_payload();
        payload["tags"] = serde_json::json!(["a", "b", "c", "d", "e", "f"]);
        assert!(parse(payload).validate().is_err());

        let mut payload = valid_create_payload();
        payload["tags"] = serde_json::json!(["a", "b", "c", "d", "e"]);
        assert!(parse(payload).validate().is_ok());
    }

    #[test]
    fn test_overlong_tag_rejected() {
        let mut payload = valid_create_payload();
        payload["tags"] = serde_json::json!(["x".repeat(51)]);
        assert!(parse(payload).validate().is_err());
    }

    #[test]
    fn test_confidence_level_range() {
        let mut payload = valid_create_payload();
        payload["confidence_level"] = serde_json::json!(0);
        assert!(parse(payload).validate().is_err());

        let mut payload = valid_create_payload();
        payload["confidence_level"] = serde_json::json!(11);
        assert!(parse(payload).validate().is_err());

        let mut payload = valid_create_payload();
        payload["confidence_level"] = serde_json::json!(10);
        assert!(parse(payload).validate().is_ok());
    }

    #[test]
    fn test_unknown_source_rejected() {
        let mut payload = valid_create_payload();
        payload["source"] = serde_json::json!("carrier_pigeon");
        assert!(parse(payload).validate().is_err());

        for source in ["web", "chrome_extension", "slack", "github"] {
            let mut payload = valid_create_payload();
            payload["source"] = serde_json::json!(source);
            assert!(parse(payload).validate().is_ok(), "{} should be accepted", source);
        }
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("50%_done"), "50\\%\\_done");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn test_parse_tag_filter() {
        assert_eq!(parse_tag_filter("a,b , c"), vec!["a", "b", "c"]);
        assert_eq!(parse_tag_filter("a,,b,"), vec!["a", "b"]);
        assert!(parse_tag_filter("").is_empty());
    }

    #[test]
    fn test_list_query_clamping() {
        let query = ListDecisionsQuery {
            search: None,
            tags: None,
            page: 0,
            per_page: 500,
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), MAX_PER_PAGE);
    }
}
