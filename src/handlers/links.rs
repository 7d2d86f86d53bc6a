//! Slack and GitHub account linking.
//!
//! Linking is a one-time code exchange: the user mints a short-lived code
//! here, pastes it into the integration, and the integration's backend
//! calls verify with the code and the external account id. A code is
//! single-use; it is cleared the moment it binds. An external account can
//! be bound to at most one internal user.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::jwt::Claims,
    error::{get_db_conn, ApiError, ApiResult},
    models::{NewGithubUserLink, NewSlackUserLink},
    schema::{github_user_links, slack_user_links},
    AppState,
};

/// Code alphabet without lookalike characters (0/O, 1/I/L).
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const LINK_CODE_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Slack,
    Github,
}

impl Provider {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "slack" => Some(Provider::Slack),
            "github" => Some(Provider::Github),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Slack => "slack",
            Provider::Github => "github",
        }
    }
}

pub fn generate_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LinkCodeResponse {
    #[schema(example = "K7Q2WXYZ")]
    pub code: String,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyLinkRequest {
    #[schema(example = "K7Q2WXYZ")]
    pub code: String,
    /// The provider-side account id (Slack user id / GitHub user id).
    pub external_user_id: String,
    pub external_username: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyLinkResponse {
    pub linked: bool,
    pub provider: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LinkStatus {
    pub linked: bool,
    pub username: Option<String>,
    pub linked_at: Option<NaiveDateTime>,
    /// A code has been minted and has not yet expired or been used.
    pub pending_code: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IntegrationsStatusResponse {
    pub slack: LinkStatus,
    pub github: LinkStatus,
}

#[utoipa::path(
    post,
    path = "/api/integrations/{provider}/link-code",
    tag = "Integrations",
    params(("provider" = String, Path, description = "slack or github")),
    responses(
        (status = 200, description = "Fresh one-time linking code", body = LinkCodeResponse),
        (status = 404, description = "Unknown provider", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_link_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(provider): Path<String>,
) -> ApiResult<Json<LinkCodeResponse>> {
    let provider = parse_provider(&provider)?;

    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let code = generate_code(LINK_CODE_LEN);
    let expires_at = (Utc::now() + Duration::minutes(state.link_code_ttl_mins)).naive_utc();

    // Re-requesting replaces any pending code.
    let result = match provider {
        Provider::Slack => diesel::insert_into(slack_user_links::table)
            .values(&NewSlackUserLink {
                user_id,
                link_code: Some(code.clone()),
                link_code_expires_at: Some(expires_at),
            })
            .on_conflict(slack_user_links::user_id)
            .do_update()
            .set((
                slack_user_links::link_code.eq(Some(code.clone())),
                slack_user_links::link_code_expires_at.eq(Some(expires_at)),
            ))
            .execute(&mut conn),
        Provider::Github => diesel::insert_into(github_user_links::table)
            .values(&NewGithubUserLink {
                user_id,
                link_code: Some(code.clone()),
                link_code_expires_at: Some(expires_at),
            })
            .on_conflict(github_user_links::user_id)
            .do_update()
            .set((
                github_user_links::link_code.eq(Some(code.clone())),
                github_user_links::link_code_expires_at.eq(Some(expires_at)),
            ))
            .execute(&mut conn),
    };

    result.map_err(|_| ApiError::db_error())?;

    info!(user_id = %user_id, provider = provider.as_str(), "Linking code minted");

    Ok(Json(LinkCodeResponse { code, expires_at }))
}

/// Called by the integration's backend, not the browser: the code itself
/// proves who initiated the link.
#[utoipa::path(
    post,
    path = "/api/integrations/{provider}/verify",
    tag = "Integrations",
    params(("provider" = String, Path, description = "slack or github")),
    request_body = VerifyLinkRequest,
    responses(
        (status = 200, description = "Account linked", body = VerifyLinkResponse),
        (status = 404, description = "Invalid or expired code", body = ApiError),
        (status = 409, description = "External account already linked elsewhere", body = ApiError)
    )
)]
pub async fn verify_link(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(payload): Json<VerifyLinkRequest>,
) -> ApiResult<Json<VerifyLinkResponse>> {
    let provider = parse_provider(&provider)?;
    let now = Utc::now().naive_utc();

    let mut conn = get_db_conn(&state.db_pool)?;

    match provider {
        Provider::Slack => {
            let pending: Option<(Uuid, Uuid)> = slack_user_links::table
                .filter(slack_user_links::link_code.eq(&payload.code))
                .filter(slack_user_links::link_code_expires_at.gt(now))
                .select((slack_user_links::id, slack_user_links::user_id))
                .first(&mut conn)
                .optional()
                .map_err(|_| ApiError::db_error())?;

            let Some((link_id, user_id)) = pending else {
                return Err(invalid_code_error());
            };

            let taken: i64 = slack_user_links::table
                .filter(slack_user_links::slack_user_id.eq(&payload.external_user_id))
                .filter(slack_user_links::user_id.ne(user_id))
                .filter(slack_user_links::linked_at.is_not_null())
                .count()
                .get_result(&mut conn)
                .map_err(|_| ApiError::db_error())?;

            if taken > 0 {
                return Err(already_linked_error(provider, &payload.external_user_id));
            }

            diesel::update(slack_user_links::table.filter(slack_user_links::id.eq(link_id)))
                .set((
                    slack_user_links::slack_user_id.eq(Some(payload.external_user_id.as_str())),
                    slack_user_links::slack_username.eq(payload.external_username.as_deref()),
                    slack_user_links::linked_at.eq(Some(now)),
                    slack_user_links::link_code.eq(None::<String>),
                    slack_user_links::link_code_expires_at.eq(None::<NaiveDateTime>),
                ))
                .execute(&mut conn)
                .map_err(|_| ApiError::db_error())?;

            info!(user_id = %user_id, provider = "slack", "External account linked");
        }
        Provider::Github => {
            let pending: Option<(Uuid, Uuid)> = github_user_links::table
                .filter(github_user_links::link_code.eq(&payload.code))
                .filter(github_user_links::link_code_expires_at.gt(now))
                .select((github_user_links::id, github_user_links::user_id))
                .first(&mut conn)
                .optional()
                .map_err(|_| ApiError::db_error())?;

            let Some((link_id, user_id)) = pending else {
                return Err(invalid_code_error());
            };

            let taken: i64 = github_user_links::table
                .filter(github_user_links::github_user_id.eq(&payload.external_user_id))
                .filter(github_user_links::user_id.ne(user_id))
                .filter(github_user_links::linked_at.is_not_null())
                .count()
                .get_result(&mut conn)
                .map_err(|_| ApiError::db_error())?;

            if taken > 0 {
                return Err(already_linked_error(provider, &payload.external_user_id));
            }

            diesel::update(github_user_links::table.filter(github_user_links::id.eq(link_id)))
                .set((
                    github_user_links::github_user_id.eq(Some(payload.external_user_id.as_str())),
                    github_user_links::github_username.eq(payload.external_username.as_deref()),
                    github_user_links::linked_at.eq(Some(now)),
                    github_user_links::link_code.eq(None::<String>),
                    github_user_links::link_code_expires_at.eq(None::<NaiveDateTime>),
                ))
                .execute(&mut conn)
                .map_err(|_| ApiError::db_error())?;

            info!(user_id = %user_id, provider = "github", "External account linked");
        }
    }

    Ok(Json(VerifyLinkResponse {
        linked: true,
        provider: provider.as_str().to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/integrations/status",
    tag = "Integrations",
    responses(
        (status = 200, description = "Linking state per provider", body = IntegrationsStatusResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn integrations_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<IntegrationsStatusResponse>> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let now = Utc::now().naive_utc();
    let mut conn = get_db_conn(&state.db_pool)?;

    let slack: Option<(Option<String>, Option<NaiveDateTime>, Option<NaiveDateTime>)> =
        slack_user_links::table
            .filter(slack_user_links::user_id.eq(user_id))
            .select((
                slack_user_links::slack_username,
                slack_user_links::linked_at,
                slack_user_links::link_code_expires_at,
            ))
            .first(&mut conn)
            .optional()
            .map_err(|_| ApiError::db_error())?;

    let github: Option<(Option<String>, Option<NaiveDateTime>, Option<NaiveDateTime>)> =
        github_user_links::table
            .filter(github_user_links::user_id.eq(user_id))
            .select((
                github_user_links::github_username,
                github_user_links::linked_at,
                github_user_links::link_code_expires_at,
            ))
            .first(&mut conn)
            .optional()
            .map_err(|_| ApiError::db_error())?;

    Ok(Json(IntegrationsStatusResponse {
        slack: link_status(slack, now),
        github: link_status(github, now),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/integrations/{provider}",
    tag = "Integrations",
    params(("provider" = String, Path, description = "slack or github")),
    responses(
        (status = 204, description = "Unlinked"),
        (status = 404, description = "Unknown provider", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn unlink(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(provider): Path<String>,
) -> ApiResult<StatusCode> {
    let provider = parse_provider(&provider)?;

    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let result = match provider {
        Provider::Slack => diesel::delete(
            slack_user_links::table.filter(slack_user_links::user_id.eq(user_id)),
        )
        .execute(&mut conn),
        Provider::Github => diesel::delete(
            github_user_links::table.filter(github_user_links::user_id.eq(user_id)),
        )
        .execute(&mut conn),
    };

    result.map_err(|_| ApiError::db_error())?;

    info!(user_id = %user_id, provider = provider.as_str(), "External account unlinked");

    Ok(StatusCode::NO_CONTENT)
}

fn link_status(
    row: Option<(Option<String>, Option<NaiveDateTime>, Option<NaiveDateTime>)>,
    now: NaiveDateTime,
) -> LinkStatus {
    match row {
        Some((username, linked_at, code_expires_at)) => LinkStatus {
            linked: linked_at.is_some(),
            username,
            linked_at,
            pending_code: linked_at.is_none()
                && code_expires_at.map(|at| at > now).unwrap_or(false),
        },
        None => LinkStatus {
            linked: false,
            username: None,
            linked_at: None,
            pending_code: false,
        },
    }
}

fn parse_provider(value: &str) -> Result<Provider, (StatusCode, Json<ApiError>)> {
    Provider::parse(value).ok_or_else(|| {
        warn!(provider = %value, "Unknown integration provider");
        ApiError::not_found(format!("Unknown provider: {}", value), "UNKNOWN_PROVIDER")
    })
}

fn invalid_code_error() -> (StatusCode, Json<ApiError>) {
    ApiError::not_found("Invalid or expired linking code", "INVALID_LINK_CODE")
}

fn already_linked_error(
    provider: Provider,
    external_id: &str,
) -> (StatusCode, Json<ApiError>) {
    warn!(provider = provider.as_str(), external_id = %external_id, "External account already bound");
    ApiError::conflict(
        "This external account is already linked to another user",
        "ACCOUNT_ALREADY_LINKED",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_generate_code_uses_fixed_alphabet() {
        let code = generate_code(LINK_CODE_LEN);
        assert_eq!(code.len(), LINK_CODE_LEN);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_generated_codes_vary() {
        let codes: std::collections::HashSet<String> =
            (0..32).map(|_| generate_code(LINK_CODE_LEN)).collect();
        assert!(codes.len() > 1);
    }

    #[test]
    fn test_alphabet_has_no_lookalikes() {
        for forbidden in [b'0', b'O', b'1', b'I', b'L'] {
            assert!(!CODE_ALPHABET.contains(&forbidden));
        }
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(Provider::parse("slack"), Some(Provider::Slack));
        assert_eq!(Provider::parse("github"), Some(Provider::Github));
        assert_eq!(Provider::parse("gitlab"), None);
        assert_eq!(Provider::parse("SLACK"), None);
    }

    #[test]
    fn test_link_status_states() {
        let now = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let later = now + Duration::minutes(5);
        let earlier = now - Duration::minutes(5);

        // Never touched.
        let status = link_status(None, now);
        assert!(!status.linked && !status.pending_code);

        // Pending, unexpired code.
        let status = link_status(Some((None, None, Some(later))), now);
        assert!(!status.linked && status.pending_code);

        // Expired code is no longer pending.
        let status = link_status(Some((None, None, Some(earlier))), now);
        assert!(!status.linked && !status.pending_code);

        // Linked.
        let status = link_status(Some((Some("jo".into()), Some(earlier), None)), now);
        assert!(status.linked && !status.pending_code);
        assert_eq!(status.username.as_deref(), Some("jo"));
    }
}
