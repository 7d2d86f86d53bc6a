use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::decisions)]
pub struct Decision {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "Migrated billing to async workers")]
    pub title: String,
    pub decision_made: String,
    pub context: String,
    pub trade_offs: String,
    pub biggest_risk: String,
    pub stakeholders: Option<String>,
    #[schema(example = 7)]
    pub confidence_level: Option<i32>,
    #[schema(example = json!(["architecture", "billing"]))]
    pub tags: Vec<String>,
    #[schema(example = "web")]
    pub source: String,
    pub is_locked: bool,
    pub locked_at: Option<NaiveDateTime>,
    pub original_input: Option<String>,
    pub ai_structured: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::decisions)]
pub struct NewDecision {
    pub user_id: Uuid,
    pub title: String,
    pub decision_made: String,
    pub context: String,
    pub trade_offs: String,
    pub biggest_risk: String,
    pub stakeholders: Option<String>,
    pub confidence_level: Option<i32>,
    pub tags: Vec<String>,
    pub source: String,
    pub original_input: Option<String>,
    pub ai_structured: bool,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::user_preferences)]
pub struct UserPreferences {
    pub user_id: Uuid,
    #[schema(example = "Senior Backend Engineer")]
    pub current_role: Option<String>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::user_preferences)]
pub struct NewUserPreferences {
    pub user_id: Uuid,
    pub current_role: Option<String>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::ai_generations)]
pub struct AiGeneration {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "structure")]
    pub generation_type: String,
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub cost_cents: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::ai_generations)]
pub struct NewAiGeneration {
    pub user_id: Uuid,
    pub generation_type: String,
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub cost_cents: Option<i32>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::payments)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    #[schema(example = 499)]
    pub amount_inr: i32,
    #[schema(example = "promotion_package")]
    pub product_type: String,
    #[schema(example = "succeeded")]
    pub status: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::payments)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub amount_inr: i32,
    pub product_type: String,
    pub status: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::teams)]
pub struct Team {
    pub id: Uuid,
    #[schema(example = "Platform Guild")]
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    #[serde(skip_serializing)]
    pub join_token: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::teams)]
pub struct NewTeam {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub join_token: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = crate::schema::team_members)]
pub struct TeamMember {
    pub id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub joined_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::team_members)]
pub struct NewTeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::slack_user_links)]
pub struct SlackUserLink {
    pub id: Uuid,
    pub user_id: Uuid,
    pub slack_user_id: Option<String>,
    pub slack_username: Option<String>,
    pub link_code: Option<String>,
    pub link_code_expires_at: Option<NaiveDateTime>,
    pub linked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::slack_user_links)]
pub struct NewSlackUserLink {
    pub user_id: Uuid,
    pub link_code: Option<String>,
    pub link_code_expires_at: Option<NaiveDateTime>,
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::github_user_links)]
pub struct GithubUserLink {
    pub id: Uuid,
    pub user_id: Uuid,
    pub github_user_id: Option<String>,
    pub github_username: Option<String>,
    pub link_code: Option<String>,
    pub link_code_expires_at: Option<NaiveDateTime>,
    pub linked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::github_user_links)]
pub struct NewGithubUserLink {
    pub user_id: Uuid,
    pub link_code: Option<String>,
    pub link_code_expires_at: Option<NaiveDateTime>,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::schema::refresh_tokens)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}
