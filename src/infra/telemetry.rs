use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::{
        content::METRIC_POSTS_GENERATED,
        visualize::{METRIC_IMAGE_ATTEMPTS, METRIC_IMAGE_FAILURES},
    },
    config::{LogFormat, LoggingSettings},
    infra::gemini::METRIC_GENERATION_MS,
};

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
            METRIC_POSTS_GENERATED,
            Unit::Count,
            "Total number of posts persisted by the writer pipeline, labelled by persona."
        );
        describe_counter!(
            METRIC_IMAGE_ATTEMPTS,
            Unit::Count,
            "Total number of image generation attempts, labelled by backend."
        );
        describe_counter!(
            METRIC_IMAGE_FAILURES,
            Unit::Count,
            "Total number of posts whose visualization failed."
        );
        describe_histogram!(
            METRIC_GENERATION_MS,
            Unit::Milliseconds,
            "Generation service round-trip latency in milliseconds."
        );
    });
}
