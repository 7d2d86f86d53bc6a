//! Career Black Box - decision journaling API with AI-assisted structuring.

pub mod ai;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod payments;
pub mod schema;
pub mod telemetry;

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};

use diesel::r2d2::{self, ConnectionManager};
use diesel::PgConnection;
use std::sync::Arc;
use std::time::Duration;

use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use ai::AiClient;
use auth::jwt::JwtConfig;
use auth::password::PasswordPolicy;
use cache::{create_redis_pool, RateLimitCounters};
use config::PaymentsConfig;
use middleware::{
    ai_rate_limit_middleware, api_rate_limit_middleware, metrics_middleware,
    public_reframe_rate_limit_middleware, rate_limit::RateLimitState, request_id_middleware,
};
use payments::RazorpayClient;
use telemetry::MetricsState;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub rate_limit: RateLimitState,
    pub jwt_config: Arc<JwtConfig>,
    pub ai: Arc<AiClient>,
    pub payments: Arc<RazorpayClient>,
    pub payments_config: PaymentsConfig,
    pub password_policy: PasswordPolicy,
    pub password_hash_cost: u32,
    pub link_code_ttl_mins: i64,
    pub metrics: MetricsState,
}

impl AppState {
    pub fn new(db_pool: DbPool, redis_pool: Option<deadpool_redis::Pool>, config: &Config) -> Self {
        let redis_pool = redis_pool.or_else(|| create_redis_pool(&config.redis));
        let counters = Arc::new(RateLimitCounters::new(redis_pool));

        let rate_limit = if config.security.rate_limiting_enabled {
            RateLimitState::new(counters, &config.security)
        } else {
            RateLimitState::disabled()
        };

        let jwt_config = JwtConfig::from_env_with_expiry(
            config.jwt.access_token_expiry_secs,
            config.jwt.refresh_token_expiry_secs,
            config.jwt.issuer.clone(),
            config.jwt.audience.clone(),
        );

        let password_policy = PasswordPolicy::new(
            config.security.min_password_length,
            config.security.require_password_complexity,
        );

        let metrics = MetricsState::new(config.telemetry.metrics_enabled);

        Self {
            db_pool,
            rate_limit,
            jwt_config: Arc::new(jwt_config),
            ai: Arc::new(AiClient::new(&config.ai)),
            payments: Arc::new(RazorpayClient::new(&config.payments)),
            payments_config: config.payments.clone(),
            password_policy,
            password_hash_cost: config.security.password_hash_cost,
            link_code_ttl_mins: config.integrations.link_code_ttl_mins,
            metrics,
        }
    }
}

pub fn create_router(state: AppState, config: &config::Config) -> Router {
    let cors = build_cors_layer(config);
    let body_limit = RequestBodyLimitLayer::new(config.server.max_body_size);

    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let metrics_state = state.metrics.clone();
    let public_routes = Router::new()
        .route("/api/health", get(handlers::health::health_check))
        .route("/api/ready", get(handlers::health::ready_check))
        .route("/api/live", get(handlers::health::live_check))
        .route(
            "/metrics",
            get(telemetry::metrics::metrics_handler).with_state(metrics_state),
        )
        .route(
            "/api/extension/auth-status",
            get(handlers::auth::extension_auth_status),
        )
        .route(
            "/api/integrations/{provider}/verify",
            post(handlers::links::verify_link),
        )
        .with_state(state.clone());

    let auth_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh", post(handlers::auth::refresh_token))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            api_rate_limit_middleware,
        ))
        .with_state(state.clone());

    // 5/day per client IP, counted before any authentication.
    let public_ai_routes = Router::new()
        .route(
            "/api/ai/quick-reframe-public",
            post(handlers::ai::quick_reframe_public),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            public_reframe_rate_limit_middleware,
        ))
        .with_state(state.clone());

    // Auth runs outermost so the per-user limiter can key on the claims.
    let protected_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/me", get(handlers::auth::get_current_user))
        .route("/api/decisions", post(handlers::decisions::create_decision))
        .route("/api/decisions", get(handlers::decisions::list_decisions))
        .route("/api/decisions/{id}", get(handlers::decisions::get_decision))
        .route("/api/decisions/{id}", put(handlers::decisions::update_decision))
        .route(
            "/api/decisions/{id}",
            delete(handlers::decisions::delete_decision),
        )
        .route(
            "/api/decisions/{id}/lock",
            post(handlers::decisions::lock_decision),
        )
        .route("/api/preferences", get(handlers::preferences::get_preferences))
        .route(
            "/api/preferences",
            put(handlers::preferences::update_preferences),
        )
        .route(
            "/api/analytics/personal",
            get(handlers::analytics::personal_analytics),
        )
        .route("/api/export", get(handlers::export::export_account))
        .route(
            "/api/payments/create-order",
            post(handlers::payments::create_order),
        )
        .route("/api/payments/verify", post(handlers::payments::verify_payment))
        .route("/api/teams", post(handlers::teams::create_team))
        .route("/api/teams", get(handlers::teams::list_teams))
        .route("/api/teams/join", post(handlers::teams::join_team))
        .route("/api/teams/{id}/members", get(handlers::teams::list_members))
        .route(
            "/api/integrations/status",
            get(handlers::links::integrations_status),
        )
        .route(
            "/api/integrations/{provider}/link-code",
            post(handlers::links::create_link_code),
        )
        .route(
            "/api/integrations/{provider}",
            delete(handlers::links::unlink),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            api_rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ))
        .with_state(state.clone());

    let ai_routes = Router::new()
        .route("/api/ai/structure", post(handlers::ai::structure))
        .route("/api/ai/quick-reframe", post(handlers::ai::quick_reframe))
        .route("/api/ai/weekly-update", post(handlers::ai::weekly_update))
        .route(
            "/api/ai/promotion-package",
            post(handlers::ai::promotion_package),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            ai_rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ))
        .with_state(state.clone());

    let docs_routes = openapi::swagger_router();

    Router::new()
        .merge(docs_routes)
        .merge(public_routes)
        .merge(auth_routes)
        .merge(public_ai_routes)
        .merge(protected_routes)
        .merge(ai_routes)
        .fallback(fallback_handler)
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(timeout)
        .layer(body_limit)
        .layer(cors)
}

async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Not found", "code": "NOT_FOUND"})),
    )
}

fn build_cors_layer(config: &config::Config) -> CorsLayer {
    use axum::http::header::HeaderName;
    use axum::http::Method;

    let is_wildcard_origin = config.cors.allowed_origins.contains(&"*".to_string())
        || config.cors.allowed_origins.is_empty();

    let methods: Vec<Method> = config
        .cors
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    let headers: Vec<HeaderName> = config
        .cors
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();

    if config.cors.allow_credentials && is_wildcard_origin {
        CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::mirror_request())
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true)
            .max_age(Duration::from_secs(config.cors.max_age_secs))
    } else if config.cors.allow_credentials {
        let origins: Vec<_> = config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true)
            .max_age(Duration::from_secs(config.cors.max_age_secs))
    } else {
        let cors = if is_wildcard_origin {
            CorsLayer::new().allow_origin(Any)
        } else {
            let origins: Vec<_> = config
                .cors
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new().allow_origin(origins)
        };

        cors.allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(false)
            .max_age(Duration::from_secs(config.cors.max_age_secs))
    }
}

pub fn create_db_pool(config: &config::Config) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(&config.database.url);
    r2d2::Pool::builder()
        .max_size(config.database.max_connections)
        .min_idle(Some(config.database.min_connections))
        .connection_timeout(Duration::from_secs(config.database.connection_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(config.database.idle_timeout_secs)))
        .build(manager)
        .expect("Failed to create database pool")
}

pub fn create_db_pool_with_url(database_url: &str) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(10)
        .min_idle(Some(2))
        .connection_timeout(Duration::from_secs(30))
        .idle_timeout(Some(Duration::from_secs(600)))
        .build(manager)
        .expect("Failed to create database pool")
}

pub fn init_tracing(config: &config::Config) {
    telemetry::init_telemetry(config);
}

pub use telemetry::tracing::shutdown_telemetry;

pub use config::Config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_build_cors_layer_wildcard() {
        let mut config = Config::default_for_testing();
        config.cors.allowed_origins = vec!["*".to_string()];
        let _ = build_cors_layer(&config);
    }

    #[test]
    fn test_build_cors_layer_specific_origins() {
        let mut config = Config::default_for_testing();
        config.cors.allowed_origins = vec![
            "http://localhost:3000".to_string(),
            "https://example.com".to_string(),
        ];
        let _ = build_cors_layer(&config);
    }
}
