//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber (env filter + fmt layer)
//! - Decorate every log line with the diagnostic context in scope
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured filter
//! - Diagnostic fields are rendered as a `[key=value ...]` prefix, the same
//!   place a logback `%X{}` pattern would put them

use std::fmt;

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::observability::context::DiagnosticContext;

/// Event formatter that prefixes the wrapped formatter's output with the
/// diagnostic context of the current task.
#[derive(Debug, Clone)]
pub struct DiagnosticFormat<E> {
    inner: E,
}

impl<E> DiagnosticFormat<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

impl<S, N, E> FormatEvent<S, N> for DiagnosticFormat<E>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    E: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        if let Some(fields) = DiagnosticContext::snapshot() {
            if !fields.is_empty() {
                writer.write_char('[')?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        writer.write_char(' ')?;
                    }
                    write!(writer, "{}={}", key, value)?;
                }
                writer.write_str("] ")?;
            }
        }
        self.inner.format_event(ctx, writer, event)
    }
}

/// Install the global subscriber.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(DiagnosticFormat::new(tracing_subscriber::fmt::format())),
        )
        .try_init()
}


#[cfg(test)]
mod tests {
    use super::capture::{subscriber, LogBuffer};
    use crate::observability::context::{DiagnosticContext, DiagnosticKey};

    #[test]
    fn test_prefix_rendered_inside_scope() {
        let buffer = LogBuffer::default();
        let _guard = tracing::subscriber::set_default(subscriber(buffer.clone()));

        DiagnosticContext::new()
            .with(DiagnosticKey::RequestId, "abc")
            .with(DiagnosticKey::Endpoint, "GET /api/v1/users")
            .sync_scope(|| tracing::info!("inside"));

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert!(
            lines[0].starts_with("[requestId=abc endpoint=GET /api/v1/users] "),
            "unexpected line: {}",
            lines[0]
        );
        assert!(lines[0].contains("inside"));
    }

    #[test]
    fn test_no_prefix_outside_scope() {
        let buffer = LogBuffer::default();
        let _guard = tracing::subscriber::set_default(subscriber(buffer.clone()));

        DiagnosticContext::new()
            .with(DiagnosticKey::UserId, "42")
            .sync_scope(|| tracing::info!("first"));
        tracing::info!("second");

        let lines = buffer.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[userId=42] "));
        assert!(!lines[1].contains("userId"));
        assert!(!lines[1].starts_with('['));
    }

    #[test]
    fn test_empty_scope_renders_no_brackets() {
        let buffer = LogBuffer::default();
        let _guard = tracing::subscriber::set_default(subscriber(buffer.clone()));

        DiagnosticContext::new().sync_scope(|| tracing::warn!("bare"));

        let lines = buffer.lines();
        assert!(!lines[0].starts_with('['));
    }
}
