use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use tracing_error::SpanTrace;

/// Categorizes store errors by what the caller can do about them,
/// independent of the engine that raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// A referenced record does not exist.
    ///
    /// **Retryable:** No.
    NotFound,

    /// A write collided with a unique key.
    ///
    /// **Retryable:** No - the record already exists.
    Conflict,

    /// Stored data could not be decoded into the model.
    ///
    /// **Retryable:** No - the data itself is bad.
    Corrupt,

    /// The backing database could not be reached or is busy.
    ///
    /// **Retryable:** Yes.
    Unavailable,

    /// Any other engine failure.
    Backend,
}

impl StoreErrorKind {
    /// Returns whether this error kind typically indicates a retryable condition.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreErrorKind::Unavailable)
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreErrorKind::NotFound => write!(f, "not found"),
            StoreErrorKind::Conflict => write!(f, "conflict"),
            StoreErrorKind::Corrupt => write!(f, "corrupt data"),
            StoreErrorKind::Unavailable => write!(f, "unavailable"),
            StoreErrorKind::Backend => write!(f, "backend error"),
        }
    }
}

#[derive(Debug)]
struct ErrorTrace {
    backtrace: Backtrace,
    span_trace: SpanTrace,
}

impl ErrorTrace {
    #[track_caller]
    fn capture() -> Self {
        ErrorTrace {
            backtrace: Backtrace::capture(),
            span_trace: SpanTrace::capture(),
        }
    }
}

/// An error raised by an entity store engine.
///
/// Carries the semantic [`StoreErrorKind`], the engine name, optional context,
/// the underlying error and the span trace where it was created.
///
/// # Example
///
/// ```rust
/// use entity_store::{StoreError, StoreErrorKind};
///
/// let error = StoreError::builder(
///     "memory",
///     StoreErrorKind::NotFound,
///     "author 7 does not exist",
/// )
/// .context("insert commit")
/// .build();
///
/// assert_eq!(error.kind(), StoreErrorKind::NotFound);
/// assert_eq!(error.context(), Some("insert commit"));
/// ```
#[derive(Debug)]
pub struct StoreError {
    kind: StoreErrorKind,
    engine: &'static str,
    context: Option<String>,
    source: Box<dyn StdError + Send + Sync + 'static>,
    traces: Box<ErrorTrace>,
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

impl StoreError {
    /// Create a new store error.
    pub fn new<E>(engine: &'static str, kind: StoreErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self {
            kind,
            engine,
            context: None,
            source: error.into(),
            traces: Box::new(ErrorTrace::capture()),
        }
    }

    /// Create a builder, to attach context to the error.
    pub fn builder<E>(engine: &'static str, kind: StoreErrorKind, error: E) -> StoreErrorBuilder
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        StoreErrorBuilder {
            kind,
            engine,
            source: error.into(),
            context: None,
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    /// Returns the name of the engine which raised the error.
    pub fn engine(&self) -> &'static str {
        self.engine
    }

    /// Returns additional context, if available.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns whether this error is likely retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns a reference to the captured backtrace.
    pub fn backtrace(&self) -> &Backtrace {
        &self.traces.backtrace
    }

    /// Returns the tracing span context at the point the error was created.
    pub fn span_trace(&self) -> &SpanTrace {
        &self.traces.span_trace
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Store error [{}] from {}", self.kind, self.engine)?;

        if let Some(context) = &self.context {
            write!(f, " ({})", context)?;
        }

        write!(f, ": {}", self.source)
    }
}

/// Builder for a [`StoreError`] with context.
#[derive(Debug)]
pub struct StoreErrorBuilder {
    kind: StoreErrorKind,
    engine: &'static str,
    source: Box<dyn StdError + Send + Sync + 'static>,
    context: Option<String>,
}

impl StoreErrorBuilder {
    /// Set additional context.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Build the `StoreError`.
    pub fn build(self) -> StoreError {
        StoreError {
            kind: self.kind,
            engine: self.engine,
            context: self.context,
            source: self.source,
            traces: Box::new(ErrorTrace::capture()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_engine_and_context() {
        let error = StoreError::builder("sqlite", StoreErrorKind::Conflict, "duplicate sha")
            .context("insert commit")
            .build();

        assert_eq!(
            error.to_string(),
            "Store error [conflict] from sqlite (insert commit): duplicate sha"
        );
        assert!(!error.is_retryable());
    }

    #[test]
    fn unavailable_is_retryable() {
        let error = StoreError::new("sqlite", StoreErrorKind::Unavailable, "pool timed out");
        assert!(error.is_retryable());
        assert!(error.source().is_some());
    }
}
