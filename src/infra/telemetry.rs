use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{
    METRIC_CACHE_EXPIRED, METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATED, METRIC_CACHE_MISS,
};
use crate::config::{LogFormat, LoggingSettings};
use crate::infra::http::api::middleware::METRIC_RATE_LIMITED;
use crate::live::{METRIC_LIVE_EVICTED, METRIC_LIVE_PUBLISHED, METRIC_LIVE_SUBSCRIBERS};

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
            METRIC_CACHE_HIT,
            Unit::Count,
            "Total number of query cache hits."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Total number of query cache misses, including expired entries."
        );
        describe_counter!(
            METRIC_CACHE_INVALIDATED,
            Unit::Count,
            "Total number of cache entries dropped by prefix invalidation."
        );
        describe_counter!(
            METRIC_CACHE_EXPIRED,
            Unit::Count,
            "Total number of cache entries removed after their TTL elapsed."
        );
        describe_gauge!(
            METRIC_LIVE_SUBSCRIBERS,
            Unit::Count,
            "Current number of connected live-stream subscribers."
        );
        describe_counter!(
            METRIC_LIVE_PUBLISHED,
            Unit::Count,
            "Total number of catalog events published, labelled by event type."
        );
        describe_counter!(
            METRIC_LIVE_EVICTED,
            Unit::Count,
            "Total number of subscribers evicted because their stream closed."
        );
        describe_counter!(
            METRIC_RATE_LIMITED,
            Unit::Count,
            "Total number of requests rejected by the rate limiter."
        );
    });
}
