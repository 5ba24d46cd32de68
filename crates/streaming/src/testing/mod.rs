//! Testing utilities for cursor lifecycle management
//!
//! Instrumented doubles standing in for the byte and object cursor
//! implementations that live outside this workspace:
//!
//! - **TestProvider**: root provider counting cursors opened and every
//!   `release_resources()` call, so double releases are visible
//! - **TestCursor**: cursor with an optional release hook for nested
//!   cursor scenarios
//! - **TestLayer**: decorator layer counting the calls that pass through it
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use streamkeeper_streaming::testing::TestProvider;
//!
//! let root = Arc::new(TestProvider::bytes().with_location("orders-flow/read"));
//! // ... manage it, leak it, sweep ...
//! assert_eq!(root.release_count(), 1);
//! ```

mod cursor;
mod layer;
mod provider;

pub use cursor::TestCursor;
pub use layer::{LayerCounters, TestLayer};
pub use provider::TestProvider;
