//! Distributed tracing support.
//!
//! # Responsibilities
//! - Create spans for handler and store operations
//! - Record exceptions on the active span
//!
//! # Design Decisions
//! - Span fields follow OpenTelemetry naming (`http.method`, `otel.status_code`,
//!   `exception.message`) so an OTel bridge layer can export them untouched
//! - Every operation span pre-declares the error fields; `tracing` ignores
//!   records for fields a span was not created with

use std::error::Error;

use tracing::Span;

/// Open an `INFO` span with the error fields every operation span carries.
///
/// ```ignore
/// let span = operation_span!("UserStore.get_by_id", user.id = id, operation.kind = "read");
/// ```
#[macro_export]
macro_rules! operation_span {
    ($name:literal $(, $($fields:tt)+)?) => {
        ::tracing::info_span!(
            $name,
            otel.status_code = ::tracing::field::Empty,
            error = ::tracing::field::Empty,
            error.kind = ::tracing::field::Empty,
            exception.message = ::tracing::field::Empty
            $(, $($fields)+)?
        )
    };
}

/// Mark `span` as failed with `err`.
///
/// `kind` ends up in `error.kind`. The exception is also emitted as an
/// event inside the span, which is how span exporters surface it.
pub fn record_exception(span: &Span, kind: &'static str, err: &(dyn Error + 'static)) {
    span.record("otel.status_code", "ERROR");
    span.record("error", true);
    span.record("error.kind", kind);
    span.record("exception.message", tracing::field::display(err));

    tracing::error!(
        parent: span,
        error.kind = kind,
        exception.message = %err,
        "exception"
    );
}
