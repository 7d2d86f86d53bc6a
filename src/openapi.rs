//! OpenAPI documentation configuration.
//!
//! Generates the OpenAPI specification with `utoipa` and serves it via
//! Swagger UI.

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Career Black Box API",
        version = "1.0.0",
        description = "Decision-journaling API: log professional decisions, structure them \
        with AI assistance, analyze your track record, link Slack/GitHub accounts, and \
        export everything.\n\n\
        ## Authentication\n\
        Most endpoints require a JWT bearer token.\n\
        1. Register or login to get an access token (valid for 1 hour)\n\
        2. Include it in requests: `Authorization: Bearer <token>`\n\
        3. Rotate with the refresh token when it expires",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Authentication", description = "User authentication and token management"),
        (name = "Decisions", description = "Decision journal CRUD and locking"),
        (name = "Preferences", description = "Per-user preferences"),
        (name = "AI", description = "AI-assisted structuring and summarization"),
        (name = "Analytics", description = "Personal decision analytics"),
        (name = "Export", description = "Account data export"),
        (name = "Payments", description = "One-time payments for AI documents"),
        (name = "Teams", description = "Shared team journals"),
        (name = "Integrations", description = "Slack/GitHub account linking")
    ),
    paths(
        crate::handlers::health::health_check,
        crate::handlers::health::ready_check,
        crate::handlers::health::live_check,

        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh_token,
        crate::handlers::auth::logout,
        crate::handlers::auth::get_current_user,
        crate::handlers::auth::extension_auth_status,

        crate::handlers::decisions::create_decision,
        crate::handlers::decisions::list_decisions,
        crate::handlers::decisions::get_decision,
        crate::handlers::decisions::update_decision,
        crate::handlers::decisions::delete_decision,
        crate::handlers::decisions::lock_decision,

        crate::handlers::preferences::get_preferences,
        crate::handlers::preferences::update_preferences,

        crate::handlers::ai::structure,
        crate::handlers::ai::quick_reframe,
        crate::handlers::ai::quick_reframe_public,
        crate::handlers::ai::weekly_update,
        crate::handlers::ai::promotion_package,

        crate::handlers::analytics::personal_analytics,

        crate::handlers::export::export_account,

        crate::handlers::payments::create_order,
        crate::handlers::payments::verify_payment,

        crate::handlers::teams::create_team,
        crate::handlers::teams::list_teams,
        crate::handlers::teams::join_team,
        crate::handlers::teams::list_members,

        crate::handlers::links::create_link_code,
        crate::handlers::links::verify_link,
        crate::handlers::links::integrations_status,
        crate::handlers::links::unlink,
    ),
    components(
        schemas(
            ApiError,

            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::RefreshRequest,
            crate::handlers::auth::LogoutRequest,
            crate::handlers::auth::AuthResponse,
            crate::handlers::auth::RefreshResponse,
            crate::handlers::auth::UserResponse,
            crate::handlers::auth::ExtensionAuthStatus,

            crate::models::Decision,
            crate::handlers::decisions::CreateDecisionRequest,
            crate::handlers::decisions::UpdateDecisionRequest,
            crate::handlers::decisions::LockRequest,
            crate::handlers::decisions::DecisionListResponse,
            crate::handlers::decisions::ListMeta,

            crate::models::UserPreferences,
            crate::handlers::preferences::UpdatePreferencesRequest,

            crate::ai::StructuredDecision,
            crate::handlers::ai::GenerateRequest,
            crate::handlers::ai::StructureResponse,
            crate::handlers::ai::ReframeResponse,
            crate::handlers::ai::WeeklyUpdateResponse,
            crate::handlers::ai::PromotionPackageResponse,

            crate::handlers::analytics::PersonalAnalytics,
            crate::handlers::analytics::TagCount,

            crate::handlers::export::ExportPayload,
            crate::handlers::export::ExportMetadata,
            crate::models::AiGeneration,

            crate::models::Payment,
            crate::handlers::payments::CreateOrderRequest,
            crate::handlers::payments::CreateOrderResponse,
            crate::handlers::payments::VerifyPaymentRequest,
            crate::handlers::payments::VerifyPaymentResponse,

            crate::models::Team,
            crate::handlers::teams::CreateTeamRequest,
            crate::handlers::teams::JoinTeamRequest,
            crate::handlers::teams::TeamResponse,
            crate::handlers::teams::TeamListResponse,
            crate::handlers::teams::MemberResponse,
            crate::handlers::teams::MembersListResponse,

            crate::handlers::links::LinkCodeResponse,
            crate::handlers::links::VerifyLinkRequest,
            crate::handlers::links::VerifyLinkResponse,
            crate::handlers::links::LinkStatus,
            crate::handlers::links::IntegrationsStatusResponse,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "JWT access token obtained from /api/auth/login or /api/auth/register.\n\
                            Include in requests as: `Authorization: Bearer <token>`",
                        ))
                        .build(),
                ),
            );
        }

        openapi.security = Some(vec![]);
    }
}

pub fn swagger_router() -> Router {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Career Black Box API");
        assert_eq!(spec.info.version, "1.0.0");
    }

    #[test]
    fn test_openapi_has_security_scheme() {
        let spec = ApiDoc::openapi();
        assert!(spec.components.is_some());
        let components = spec.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_openapi_has_tags() {
        let spec = ApiDoc::openapi();
        assert!(spec.tags.is_some());
        let tags = spec.tags.unwrap();
        assert!(tags.iter().any(|t| t.name == "Decisions"));
        assert!(tags.iter().any(|t| t.name == "Integrations"));
        assert!(tags.iter().any(|t| t.name == "Health"));
    }
}
