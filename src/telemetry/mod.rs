//! Process-wide tracing setup.
//!
//! `RUST_LOG` controls filtering (default `torgate=info,tower_http=info`).
//! `TORGATE_LOG_FORMAT=json` switches stdout to JSON lines. `TORGATE_LOG_DIR`
//! adds a size-rotated `torgate.log` in that directory. When
//! `OTEL_EXPORTER_OTLP_ENDPOINT` is set, spans are also exported over OTLP.

use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod rolling;

use rolling::RollingFile;

const DEFAULT_FILTER: &str = "torgate=info,tower_http=info";

pub const LOG_FILE_NAME: &str = "torgate.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub filter: String,
    pub json: bool,
    pub otlp_endpoint: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl LogSettings {
    /// Reads the process environment after loading `.env`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let set = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        Self {
            filter: set("RUST_LOG").unwrap_or_else(|| DEFAULT_FILTER.to_string()),
            json: set("TORGATE_LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            otlp_endpoint: set("OTEL_EXPORTER_OTLP_ENDPOINT"),
            log_dir: set("TORGATE_LOG_DIR").map(PathBuf::from),
        }
    }
}

pub fn init(settings: &LogSettings) -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = match &settings.otlp_endpoint {
        Some(endpoint) => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint.clone()),
                )
                .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                    KeyValue::new("service.name", "torgate"),
                ])))
                .install_batch(opentelemetry_sdk::runtime::Tokio)?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    let file_layer = match &settings.log_dir {
        Some(dir) => {
            let file = RollingFile::open(
                dir.join(LOG_FILE_NAME),
                rolling::DEFAULT_MAX_BYTES,
                rolling::DEFAULT_BACKUPS,
            )
            .with_context(|| format!("cannot open log file in {}", dir.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(file),
            )
        }
        None => None,
    };

    let json = settings.json;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&settings.filter))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .with(file_layer)
        .with(telemetry_layer)
        .init();

    Ok(())
}

/// Flushes pending OTLP spans. No-op when the exporter is disabled.
pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}
