//! Error handling for streamable-rs
//!
//! This module defines the error type carried by every pipeline outcome and a
//! Result alias used throughout the crate.
//!
//! Errors raised by user code (sources and work functions) are boxed into
//! [`StreamError::Upstream`] and can be inspected again with
//! [`StreamError::is`] and [`StreamError::downcast_ref`].

use thiserror::Error;

/// Boxed error raised by a source or a work function
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for pipeline declaration and iteration
#[derive(Error, Debug)]
pub enum StreamError {
    /// Error raised by the source or by a work function
    #[error("Upstream error: {0}")]
    Upstream(#[source] BoxError),

    /// A concurrent work function panicked
    #[error("Worker panicked: {0}")]
    WorkerPanic(String),

    /// A concurrent task was dropped before it produced a result
    #[error("Worker task cancelled")]
    Cancelled,

    /// Invalid timing parameters (zero intervals)
    #[error("Timing error: {0}")]
    Timing(String),

    /// Invalid stage parameters or engine configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<StreamError>,
    },
}

impl StreamError {
    /// Wrap an error raised by user code.
    ///
    /// A `StreamError` passed in is returned as is instead of being nested.
    pub fn upstream(err: impl Into<BoxError>) -> Self {
        let boxed: BoxError = err.into();
        match boxed.downcast::<StreamError>() {
            Ok(err) => *err,
            Err(boxed) => StreamError::Upstream(boxed),
        }
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        StreamError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check whether the underlying user error is of type `E`
    pub fn is<E>(&self) -> bool
    where
        E: std::error::Error + 'static,
    {
        self.downcast_ref::<E>().is_some()
    }

    /// Borrow the underlying user error as `E`, looking through context layers
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            StreamError::Upstream(inner) => inner.downcast_ref::<E>(),
            StreamError::WithContext { source, .. } => source.downcast_ref::<E>(),
            other => (other as &(dyn std::error::Error + 'static)).downcast_ref::<E>(),
        }
    }
}

/// Result type alias for streamable-rs operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
