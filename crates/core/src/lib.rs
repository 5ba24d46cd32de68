//! Core types and traits for streamkeeper
//!
//! This crate defines the foundational types used throughout the system:
//! - ProviderId / ContextId: identities of providers and execution contexts
//! - StreamKind: byte-cursor vs object-cursor capability
//! - ComponentLocation: originating-location tag used in leak alerts
//! - Traits: the Cursor / CursorProvider contract of external collaborators
//! - AlertSink: leak alert delivery
//! - StreamingStatistics: open provider / open cursor counters
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alert;
pub mod error;
pub mod stats;
pub mod traits;
pub mod types;

pub use alert::{Alert, AlertSink, LoggingAlertSink, RecordingAlertSink, UNCLOSED_STREAM_ALERT};
pub use error::{StreamingError, StreamingResult};
pub use stats::{StatisticsSnapshot, StreamingStatistics};
pub use traits::{Cursor, CursorProvider};
pub use types::{ComponentLocation, ContextId, ProviderId, StreamKind};
