//! Observability: tracing, metrics, and OpenTelemetry integration.

pub mod metrics;
pub mod tracing;

pub use metrics::{
    record_ai_generation, record_payment, record_rate_limited, GenerationOutcome, MetricsState,
};
pub use tracing::init_telemetry;
