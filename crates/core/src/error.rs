//! Error types for streamkeeper
//!
//! Only caller usage errors, configuration problems and lifecycle misuse
//! surface as errors. Races, double releases and leaks are resolved
//! internally and never reach a caller.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::types::ProviderId;
use chrono::{DateTime, Utc};
use std::io;
use thiserror::Error;

/// Result type alias for streamkeeper operations
pub type StreamingResult<T> = std::result::Result<T, StreamingError>;

/// Error types for streamkeeper
#[derive(Debug, Error)]
pub enum StreamingError {
    /// A cursor was requested from a provider that was already closed
    #[error(
        "cannot open a cursor on provider {provider}: it was closed at {closed_at}{}",
        render_close_site(.close_site)
    )]
    ProviderClosed {
        /// Description of the closed provider
        provider: String,
        /// When the provider was closed
        closed_at: DateTime<Utc>,
        /// Captured call stack of the close site, if enabled
        close_site: Option<String>,
    },

    /// A cursor was requested after the provider's resources were released
    #[error("cannot open a cursor on provider {id}: its resources were already released")]
    ResourcesReleased {
        /// Identity of the released provider
        id: ProviderId,
    },

    /// The underlying provider failed to produce a cursor
    #[error("Cursor open failed: {0}")]
    CursorOpen(String),

    /// Configuration could not be parsed or failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A lifecycle method was called in the wrong state
    #[error("Invalid lifecycle transition: {0}")]
    Lifecycle(String),

    /// I/O error (config files, thread spawning)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn render_close_site(close_site: &Option<String>) -> String {
    match close_site {
        Some(site) => format!("\nclosed at:\n{}", site),
        None => String::new(),
    }
}
