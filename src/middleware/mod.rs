//! Request middleware.

pub mod auth;
pub mod metrics;
pub mod rate_limit;
pub mod request_id;

pub use metrics::metrics_middleware;
pub use rate_limit::{
    ai_rate_limit_middleware, api_rate_limit_middleware, public_reframe_rate_limit_middleware,
    RateLimitState, WindowPolicy,
};
pub use request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
