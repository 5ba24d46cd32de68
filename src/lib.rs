//! Streamkeeper - lifecycle management for repeatable cursor streams
//!
//! Payload content in a message pipeline is read through cursor providers:
//! repeatable byte streams and object iterators whose buffers must be
//! released exactly once. Streamkeeper wraps every provider handed to
//! message-processing code so that:
//!
//! - each provider has a stable identity and is managed once per
//!   execution context
//! - its resources are released when it is closed and its last cursor is
//!   released
//! - a provider dropped without being closed is reclaimed in the
//!   background and reported through an alert
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use streamkeeper::{ContextId, Provider, StreamingService};
//!
//! let service = StreamingService::open("./conf")?;
//! service.initialise()?;
//! service.start()?;
//!
//! let context = ContextId::new();
//! let managed = service.manage(&Provider::root(my_provider), &context);
//! let cursor = managed.open_cursor()?;
//! // ... read ...
//! cursor.release();
//! managed.close();
//! ```

pub use streamkeeper_core::*;
pub use streamkeeper_streaming::*;
