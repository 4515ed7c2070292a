use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber writing to stderr.
///
/// Stdout is left to command output.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the crate emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "relay_admin_cache_hit_total",
            Unit::Count,
            "Total number of fresh cache reads."
        );
        describe_counter!(
            "relay_admin_cache_miss_total",
            Unit::Count,
            "Total number of cache reads with no entry."
        );
        describe_counter!(
            "relay_admin_cache_expired_total",
            Unit::Count,
            "Total number of cache reads that found a stale entry."
        );
        describe_counter!(
            "relay_admin_fetch_started_total",
            Unit::Count,
            "Total number of requests started by the single-flight coordinator."
        );
        describe_counter!(
            "relay_admin_fetch_joined_total",
            Unit::Count,
            "Total number of callers that joined a request already in flight."
        );
        describe_counter!(
            "relay_admin_session_invalidated_total",
            Unit::Count,
            "Total number of sessions ended by an authentication failure."
        );
    });
}
