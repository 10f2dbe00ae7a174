use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
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
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "cachefarm_refresh_total",
            Unit::Count,
            "Total number of refresher operations applied locally."
        );
        describe_counter!(
            "cachefarm_refresh_failures_total",
            Unit::Count,
            "Total number of refresher operations that failed."
        );
        describe_counter!(
            "cachefarm_payload_skipped_total",
            Unit::Count,
            "Total number of payload entries skipped as malformed or conflicting."
        );
        describe_counter!(
            "cachefarm_cache_evictions_total",
            Unit::Count,
            "Total number of local cache entries evicted by refreshers."
        );
        describe_counter!(
            "cachefarm_dispatch_miss_total",
            Unit::Count,
            "Total number of domain events without a cache handler."
        );
        describe_gauge!(
            "cachefarm_event_queue_len",
            Unit::Count,
            "Current number of domain events waiting for dispatch."
        );
        describe_histogram!(
            "cachefarm_dispatch_batch_ms",
            Unit::Milliseconds,
            "Domain event batch dispatch latency in milliseconds."
        );
    });
}
