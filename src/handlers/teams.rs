//! Team handlers: shared journals joined via a team token.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::jwt::Claims,
    error::{get_db_conn, ApiError, ApiResult},
    handlers::links::generate_code,
    models::{NewTeam, NewTeamMember, Team},
    schema::{team_members, teams, users},
    AppState,
};

const JOIN_TOKEN_LEN: usize = 12;

pub const ROLE_OWNER: &str = "owner";
pub const ROLE_MEMBER: &str = "member";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    #[schema(example = "Platform Guild")]
    pub name: String,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinTeamRequest {
    pub join_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TeamResponse {
    pub team: Team,
    #[schema(example = "owner")]
    pub role: String,
    /// Present only for the owner, who hands it out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TeamListResponse {
    pub data: Vec<TeamResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberResponse {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    #[schema(example = "member")]
    pub role: String,
    pub joined_at: chrono::NaiveDateTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MembersListResponse {
    pub data: Vec<MemberResponse>,
}

#[utoipa::path(
    post,
    path = "/api/teams",
    tag = "Teams",
    request_body = CreateTeamRequest,
    responses(
        (status = 201, description = "Team created", body = TeamResponse),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_team(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<TeamResponse>)> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::validation(&e));
    }

    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let join_token = generate_code(JOIN_TOKEN_LEN);

    let team: Team = conn
        .transaction(|conn| {
            let team: Team = diesel::insert_into(teams::table)
                .values(&NewTeam {
                    name: payload.name,
                    description: payload.description,
                    owner_id: user_id,
                    join_token: join_token.clone(),
                })
                .get_result(conn)?;

            diesel::insert_into(team_members::table)
                .values(&NewTeamMember {
                    team_id: team.id,
                    user_id,
                    role: ROLE_OWNER.to_string(),
                })
                .execute(conn)?;

            Ok::<_, diesel::result::Error>(team)
        })
        .map_err(|e| {
            tracing::error!(error = %e, "Team creation failed");
            ApiError::internal("Team creation failed", "CREATE_FAILED")
        })?;

    info!(team_id = %team.id, owner_id = %user_id, "Team created");

    Ok((
        StatusCode::CREATED,
        Json(TeamResponse {
            team,
            role: ROLE_OWNER.to_string(),
            join_token: Some(join_token),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/teams",
    tag = "Teams",
    responses(
        (status = 200, description = "Teams the caller belongs to", body = TeamListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_teams(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<TeamListResponse>> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let rows: Vec<(Team, String)> = teams::table
        .inner_join(team_members::table.on(team_members::team_id.eq(teams::id)))
        .filter(team_members::user_id.eq(user_id))
        .order(teams::created_at.desc())
        .select((Team::as_select(), team_members::role))
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let data = rows
        .into_iter()
        .map(|(team, role)| {
            let join_token = (role == ROLE_OWNER).then(|| team.join_token.clone());
            TeamResponse {
                team,
                role,
                join_token,
            }
        })
        .collect();

    Ok(Json(TeamListResponse { data }))
}

#[utoipa::path(
    post,
    path = "/api/teams/join",
    tag = "Teams",
    request_body = JoinTeamRequest,
    responses(
        (status = 200, description = "Joined the team", body = TeamResponse),
        (status = 404, description = "Unknown join token", body = ApiError),
        (status = 409, description = "Already a member", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn join_team(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<JoinTeamRequest>,
) -> ApiResult<Json<TeamResponse>> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let team: Team = teams::table
        .filter(teams::join_token.eq(&payload.join_token))
        .select(Team::as_select())
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("No team matches this join token", "UNKNOWN_JOIN_TOKEN"))?;

    let already_member: i64 = team_members::table
        .filter(team_members::team_id.eq(team.id))
        .filter(team_members::user_id.eq(user_id))
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    if already_member > 0 {
        return Err(ApiError::conflict(
            "You are already a member of this team",
            "ALREADY_MEMBER",
        ));
    }

    diesel::insert_into(team_members::table)
        .values(&NewTeamMember {
            team_id: team.id,
            user_id,
            role: ROLE_MEMBER.to_string(),
        })
        .execute(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(team_id = %team.id, user_id = %user_id, "Joined team");

    Ok(Json(TeamResponse {
        team,
        role: ROLE_MEMBER.to_string(),
        join_token: None,
    }))
}

#[utoipa::path(
    get,
    path = "/api/teams/{id}/members",
    tag = "Teams",
    params(("id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Team members", body = MembersListResponse),
        (status = 404, description = "Not found or not a member", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_members(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<MembersListResponse>> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    // Non-members get the same 404 as a nonexistent team.
    let caller_is_member: i64 = team_members::table
        .filter(team_members::team_id.eq(team_id))
        .filter(team_members::user_id.eq(user_id))
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    if caller_is_member == 0 {
        return Err(ApiError::not_found("Team not found", "TEAM_NOT_FOUND"));
    }

    let rows: Vec<(Uuid, String, Option<String>, String, chrono::NaiveDateTime)> =
        team_members::table
            .inner_join(users::table.on(users::id.eq(team_members::user_id)))
            .filter(team_members::team_id.eq(team_id))
            .order(team_members::joined_at.asc())
            .select((
                users::id,
                users::email,
                users::full_name,
                team_members::role,
                team_members::joined_at,
            ))
            .load(&mut conn)
            .map_err(|_| ApiError::db_error())?;

    let data = rows
        .into_iter()
        .map(|(user_id, email, full_name, role, joined_at)| MemberResponse {
            user_id,
            email,
            full_name,
            role,
            joined_at,
        })
        .collect();

    Ok(Json(MembersListResponse { data }))
}
