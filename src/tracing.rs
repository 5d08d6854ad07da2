use std::path::Path;

use anyhow::{anyhow, Result};
use opentelemetry::{global, trace::TracerProvider as _};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::trace::{SdkTracerProvider, TracerProviderBuilder};
use tracing::error;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::writer::BoxMakeWriter,
    layer::SubscriberExt,
    EnvFilter,
    Layer,
};

use crate::config::{LogRotation, LoggingConfig, ServerConfig};

/// Keeps log and trace exporters alive for the lifetime of the process.
pub struct TracingGuard {
    tracer_provider: Option<SdkTracerProvider>,
    _file_guard: Option<WorkerGuard>,
}

impl TracingGuard {
    /// Exports pending traces before shutdown.
    pub fn shutdown(self) {
        if let Some(tracer_provider) = self.tracer_provider {
            if let Err(err) = tracer_provider.force_flush() {
                error!("Error flushing traces: {:?}", err);
            }
            if let Err(err) = tracer_provider.shutdown() {
                error!("Error shutting down tracer provider: {:?}", err);
            }
        }
    }
}

fn level_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::default().add_directive(level.into())
}

pub fn get_env_filter(default_level: LevelFilter) -> EnvFilter {
    // RUST_LOG used to control logging level.
    EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(default_level))
}

fn get_log_writer(logging: &LoggingConfig) -> Result<(BoxMakeWriter, Option<WorkerGuard>)> {
    let Some(path) = &logging.file else {
        return Ok((BoxMakeWriter::new(std::io::stdout), None));
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("invalid log file path: {}", path.display()))?;
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let rotation = match logging.rotation {
        LogRotation::Never => Rotation::NEVER,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
    };
    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(file_name.to_string_lossy());
    if logging.max_files > 0 {
        builder = builder.max_log_files(logging.max_files);
    }
    let appender = builder
        .build(directory)
        .map_err(|e| anyhow!("unable to open log file {}: {}", path.display(), e))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    Ok((BoxMakeWriter::new(writer), Some(guard)))
}

pub fn get_log_layer<S>(config: &ServerConfig, writer: BoxMakeWriter) -> Box<dyn Layer<S> + Send + Sync>
where
    S: for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    S: tracing::Subscriber,
{
    if config.structured_logging() {
        return Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_span_list(false)
                .flatten_event(true)
                .with_writer(writer),
        );
    }

    Box::new(tracing_subscriber::fmt::layer().compact().with_writer(writer))
}

fn get_tracer_provider(config: &ServerConfig) -> Result<SdkTracerProvider> {
    let mut span_exporter = SpanExporter::builder().with_tonic();
    if let Some(endpoint) = &config.telemetry.endpoint {
        span_exporter = span_exporter.with_endpoint(endpoint.clone());
    }
    let span_exporter = span_exporter.build()?;

    let tracer_provider = TracerProviderBuilder::default()
        .with_simple_exporter(span_exporter)
        .build();
    global::set_tracer_provider(tracer_provider.clone());
    Ok(tracer_provider)
}

pub fn setup_tracing(config: &ServerConfig) -> Result<TracingGuard> {
    let default_level = config.logging.level_filter()?;
    let (writer, file_guard) = get_log_writer(&config.logging)?;
    let log_layer = get_log_layer(config, writer);

    let tracer_provider = if config.telemetry.enable_tracing {
        Some(get_tracer_provider(config)?)
    } else {
        None
    };
    let otel_layer = tracer_provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer("pgfaas-server"))
    });

    let subscriber = tracing_subscriber::Registry::default()
        .with(log_layer.with_filter(get_env_filter(default_level)))
        .with(otel_layer);
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        error!("logger was already initiated, continuing: {:?}", e);
    }

    Ok(TracingGuard {
        tracer_provider,
        _file_guard: file_guard,
    })
}
