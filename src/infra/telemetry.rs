use std::{io, sync::Once};

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::calendar::{
        METRIC_LINES_DROPPED_TOTAL, METRIC_ORIGIN_FETCH_TOTAL, METRIC_REFRESH_SKIPPED_TOTAL,
        METRIC_SERVE_MISS_TOTAL,
    },
    config::{LogFormat, LoggingSettings},
};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber writing to standard error.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .with_writer(io::stderr)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(io::stderr)
            .compact()
            .with_target(true)
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

/// Register metric descriptions with the installed recorder. Safe to call repeatedly.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_ORIGIN_FETCH_TOTAL,
            Unit::Count,
            "Total number of origin fetches, labelled by outcome."
        );
        describe_counter!(
            METRIC_REFRESH_SKIPPED_TOTAL,
            Unit::Count,
            "Total number of requests served from a cache entry that did not need a refresh."
        );
        describe_counter!(
            METRIC_LINES_DROPPED_TOTAL,
            Unit::Count,
            "Total number of content lines removed by filtering rules."
        );
        describe_counter!(
            METRIC_SERVE_MISS_TOTAL,
            Unit::Count,
            "Total number of requests answered with 502 because nothing was cached."
        );
    });
}
