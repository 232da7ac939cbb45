//! tracing subscriber setup.

use anyhow::{Result, anyhow};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LoggingSection};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Filter directive: `RUST_LOG` if set, else `debug` when verbose, else
/// the configured level.
pub fn filter_directive(settings: &LoggingSection, verbose: bool, rust_log: Option<&str>) -> String {
    match rust_log {
        Some(directive) if !directive.trim().is_empty() => directive.to_string(),
        _ if verbose => "debug".to_string(),
        _ => settings.level.clone(),
    }
}

/// Install the global subscriber. Keep the returned guard alive for the
/// life of the process or buffered file output is lost.
pub fn init_logging(settings: &LoggingSection, verbose: bool) -> Result<Option<WorkerGuard>> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(settings, verbose, rust_log.as_deref());
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| anyhow!("Invalid log filter '{}': {}", directive, e))?;

    let mut layers: Vec<BoxedLayer> = vec![stderr_layer(settings.format)];
    let mut guard = None;
    if let Some(dir) = &settings.file_dir {
        let appender = tracing_appender::rolling::daily(dir, "taskboard.log");
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
        layers.push(match settings.format {
            LogFormat::Json => file_layer.json().boxed(),
            LogFormat::Pretty => file_layer.boxed(),
        });
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    Ok(guard)
}

fn stderr_layer(format: LogFormat) -> BoxedLayer {
    let layer = fmt::layer().with_writer(std::io::stderr);
    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Pretty => layer.boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_wins() {
        let settings = LoggingSection::default();
        assert_eq!(filter_directive(&settings, true, Some("taskboard=trace")), "taskboard=trace");
    }

    #[test]
    fn test_verbose_then_configured_level() {
        let settings = LoggingSection {
            level: "warn".into(),
            ..Default::default()
        };
        assert_eq!(filter_directive(&settings, true, None), "debug");
        assert_eq!(filter_directive(&settings, false, Some("  ")), "warn");
    }
}
