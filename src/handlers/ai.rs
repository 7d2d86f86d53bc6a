//! AI-assisted structuring and summarization handlers.
//!
//! Inference is delegated to the configured provider; each authenticated
//! call appends an `ai_generations` usage row. Token and cost columns stay
//! null until the provider reports usage.

use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    ai::{AiError, GenerationType, StructuredDecision},
    auth::jwt::Claims,
    error::{get_db_conn, ApiError, ApiResult},
    models::{Decision, NewAiGeneration},
    payments::ProductType,
    schema::{ai_generations, decisions, payments, user_preferences},
    telemetry::{record_ai_generation, GenerationOutcome},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GenerateRequest {
    /// Free text, 50-10000 characters.
    #[validate(length(min = 50, max = 10000, message = "must be 50-10000 characters"))]
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StructureResponse {
    pub structured: StructuredDecision,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReframeResponse {
    pub reframed: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WeeklyUpdateResponse {
    pub update: String,
    pub decisions_covered: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PromotionPackageResponse {
    pub document: String,
    pub decisions_covered: usize,
}

#[utoipa::path(
    post,
    path = "/api/ai/structure",
    tag = "AI",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Structured decision fields", body = StructureResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError),
        (status = 502, description = "AI provider failure", body = ApiError),
        (status = 503, description = "AI provider not configured", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn structure(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<GenerateRequest>,
) -> ApiResult<Json<StructureResponse>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::validation(&e));
    }

    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let structured = state
        .ai
        .structure_decision(&payload.text)
        .await
        .map_err(|e| map_ai_error(GenerationType::Structure, e))?;

    record_ai_generation(GenerationType::Structure.as_str(), GenerationOutcome::Completed);
    log_generation(&state, user_id, GenerationType::Structure);

    info!(user_id = %user_id, "Decision structured");

    Ok(Json(StructureResponse { structured }))
}

#[utoipa::path(
    post,
    path = "/api/ai/quick-reframe",
    tag = "AI",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Reframed text", body = ReframeResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 502, description = "AI provider failure", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn quick_reframe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<GenerateRequest>,
) -> ApiResult<Json<ReframeResponse>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::validation(&e));
    }

    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let reframed = state
        .ai
        .quick_reframe(&payload.text)
        .await
        .map_err(|e| map_ai_error(GenerationType::QuickReframe, e))?;

    record_ai_generation(GenerationType::QuickReframe.as_str(), GenerationOutcome::Completed);
    log_generation(&state, user_id, GenerationType::QuickReframe);

    Ok(Json(ReframeResponse { reframed }))
}

/// Anonymous variant, throttled per client IP. No usage row is written
/// because there is no account to attribute it to.
#[utoipa::path(
    post,
    path = "/api/ai/quick-reframe-public",
    tag = "AI",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Reframed text", body = ReframeResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 429, description = "Daily limit reached", body = ApiError),
        (status = 502, description = "AI provider failure", body = ApiError)
    )
)]
pub async fn quick_reframe_public(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> ApiResult<Json<ReframeResponse>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::validation(&e));
    }

    let reframed = state
        .ai
        .quick_reframe(&payload.text)
        .await
        .map_err(|e| map_ai_error(GenerationType::QuickReframe, e))?;

    record_ai_generation(GenerationType::QuickReframe.as_str(), GenerationOutcome::Completed);

    Ok(Json(ReframeResponse { reframed }))
}

#[utoipa::path(
    post,
    path = "/api/ai/weekly-update",
    tag = "AI",
    responses(
        (status = 200, description = "Weekly update draft", body = WeeklyUpdateResponse),
        (status = 400, description = "No decisions in the last week", body = ApiError),
        (status = 502, description = "AI provider failure", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn weekly_update(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<WeeklyUpdateResponse>> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let since = (Utc::now() - Duration::days(7)).naive_utc();

    let recent: Vec<Decision> = {
        let mut conn = get_db_conn(&state.db_pool)?;
        decisions::table
            .filter(decisions::user_id.eq(user_id))
            .filter(decisions::created_at.ge(since))
            .order(decisions::created_at.desc())
            .limit(20)
            .select(Decision::as_select())
            .load(&mut conn)
            .map_err(|_| ApiError::db_error())?
    };

    if recent.is_empty() {
        return Err(ApiError::bad_request(
            "No decisions logged in the last 7 days",
            "NO_RECENT_DECISIONS",
        ));
    }

    let entries: Vec<String> = recent.iter().map(decision_entry).collect();

    let update = state
        .ai
        .weekly_update(&entries)
        .await
        .map_err(|e| map_ai_error(GenerationType::WeeklyUpdate, e))?;

    record_ai_generation(GenerationType::WeeklyUpdate.as_str(), GenerationOutcome::Completed);
    log_generation(&state, user_id, GenerationType::WeeklyUpdate);

    Ok(Json(WeeklyUpdateResponse {
        update,
        decisions_covered: recent.len(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/ai/promotion-package",
    tag = "AI",
    responses(
        (status = 200, description = "Promotion packet draft", body = PromotionPackageResponse),
        (status = 400, description = "Empty journal", body = ApiError),
        (status = 402, description = "No completed payment for this product", body = ApiError),
        (status = 502, description = "AI provider failure", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn promotion_package(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<PromotionPackageResponse>> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let (recent, current_role) = {
        let mut conn = get_db_conn(&state.db_pool)?;

        let paid: i64 = payments::table
            .filter(payments::user_id.eq(user_id))
            .filter(payments::product_type.eq(ProductType::PromotionPackage.as_str()))
            .filter(payments::status.eq("succeeded"))
            .count()
            .get_result(&mut conn)
            .map_err(|_| ApiError::db_error())?;

        if paid == 0 {
            return Err(ApiError::payment_required(
                "A completed payment is required for the promotion package",
                "PAYMENT_REQUIRED",
            ));
        }

        let recent: Vec<Decision> = decisions::table
            .filter(decisions::user_id.eq(user_id))
            .order(decisions::created_at.desc())
            .limit(25)
            .select(Decision::as_select())
            .load(&mut conn)
            .map_err(|_| ApiError::db_error())?;

        let current_role: Option<String> = user_preferences::table
            .filter(user_preferences::user_id.eq(user_id))
            .select(user_preferences::current_role)
            .first(&mut conn)
            .optional()
            .map_err(|_| ApiError::db_error())?
            .flatten();

        (recent, current_role)
    };

    if recent.is_empty() {
        return Err(ApiError::bad_request(
            "Log some decisions before generating a promotion package",
            "EMPTY_JOURNAL",
        ));
    }

    let entries: Vec<String> = recent.iter().map(decision_entry).collect();

    let document = state
        .ai
        .promotion_package(current_role.as_deref(), &entries)
        .await
        .map_err(|e| map_ai_error(GenerationType::PromotionPackage, e))?;

    record_ai_generation(
        GenerationType::PromotionPackage.as_str(),
        GenerationOutcome::Completed,
    );
    log_generation(&state, user_id, GenerationType::PromotionPackage);

    info!(user_id = %user_id, decisions = recent.len(), "Promotion package generated");

    Ok(Json(PromotionPackageResponse {
        document,
        decisions_covered: recent.len(),
    }))
}

/// One journal entry as prompt input.
fn decision_entry(decision: &Decision) -> String {
    format!(
        "[{}] {}\nDecision: {}\nContext: {}\nTrade-offs: {}\nBiggest risk: {}",
        decision.created_at.format("%Y-%m-%d"),
        decision.title,
        decision.decision_made,
        decision.context,
        decision.trade_offs,
        decision.biggest_risk,
    )
}

/// Appends the usage row. A failed append is logged and tolerated; the
/// generation already happened and the user should still get it.
fn log_generation(state: &AppState, user_id: Uuid, generation_type: GenerationType) {
    let row = NewAiGeneration {
        user_id,
        generation_type: generation_type.as_str().to_string(),
        input_tokens: None,
        output_tokens: None,
        cost_cents: None,
    };

    match state.db_pool.get() {
        Ok(mut conn) => {
            if let Err(e) = diesel::insert_into(ai_generations::table)
                .values(&row)
                .execute(&mut conn)
            {
                warn!(user_id = %user_id, error = %e, "Failed to append AI generation log");
            }
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "No connection for AI generation log");
        }
    }
}

fn map_ai_error(
    generation_type: GenerationType,
    error: AiError,
) -> (StatusCode, Json<ApiError>) {
    match error {
        AiError::NotConfigured => {
            record_ai_generation(generation_type.as_str(), GenerationOutcome::UpstreamError);
            ApiError::service_unavailable("AI generation is not available", "AI_NOT_CONFIGURED")
        }
        AiError::Malformed(detail) => {
            warn!(error = %detail, "AI provider returned unusable output");
            record_ai_generation(generation_type.as_str(), GenerationOutcome::InvalidOutput);
            ApiError::bad_gateway("AI provider returned unusable output", "AI_UPSTREAM_ERROR")
        }
        AiError::Http(e) => {
            warn!(error = %e, "AI provider request failed");
            record_ai_generation(generation_type.as_str(), GenerationOutcome::UpstreamError);
            ApiError::bad_gateway("AI provider request failed", "AI_UPSTREAM_ERROR")
        }
        AiError::UpstreamStatus(status) => {
            warn!(status = status, "AI provider returned an error status");
            record_ai_generation(generation_type.as_str(), GenerationOutcome::UpstreamError);
            ApiError::bad_gateway("AI provider request failed", "AI_UPSTREAM_ERROR")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_generate_request_bounds() {
        let short = GenerateRequest {
            text: "a".repeat(49),
        };
        assert!(short.validate().is_err());

        let ok = GenerateRequest {
            text: "a".repeat(50),
        };
        assert!(ok.validate().is_ok());

        let long = GenerateRequest {
            text: "a".repeat(10_001),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_decision_entry_formatting() {
        let at = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let decision = Decision {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Chose Postgres".to_string(),
            decision_made: "Use managed Postgres".to_string(),
            context: "Relational access patterns".to_string(),
            trade_offs: "Slower key lookups".to_string(),
            biggest_risk: "Connection exhaustion".to_string(),
            stakeholders: None,
            confidence_level: None,
            tags: vec![],
            source: "web".to_string(),
            is_locked: false,
            locked_at: None,
            original_input: None,
            ai_structured: true,
            created_at: at,
            updated_at: at,
        };

        let entry = decision_entry(&decision);
        assert!(entry.starts_with("[2024-06-01] Chose Postgres"));
        assert!(entry.contains("Decision: Use managed Postgres"));
        assert!(entry.contains("Biggest risk: Connection exhaustion"));
    }
}
