//! Streaming cursor lifecycle management for streamkeeper
//!
//! Message-processing code opens byte-stream and object-iterator cursors
//! over payload content through cursor providers. This crate makes sure
//! the underlying resources are released exactly once, whether the caller
//! closes the stream or simply drops it:
//!
//! - Provider: closed enum over root, decorated, identified and managed
//!   providers
//! - IdentityDecorator: stable identities, never wrapping twice
//! - CursorProviderJanitor: releases the delegate when the provider is
//!   closed and no cursor remains open
//! - ManagedCursorProvider: per-context managed wrapper with close-site
//!   diagnostics
//! - EventStreamingState: managed providers of one execution context
//! - CursorManager: one managed provider per (identity, context)
//! - StreamingGhostBuster: detects providers dropped without close,
//!   releases them and raises an alert
//! - StreamingService: wires the above together from `streaming.toml`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod ghost_buster;
pub mod identity;
pub mod janitor;
pub mod managed;
pub mod manager;
pub mod provider;
pub mod service;
pub mod state;
pub mod testing;

pub use config::{GhostBusterConfig, StreamingConfig, CONFIG_FILE_NAME};
pub use ghost_buster::{LifecycleState, StreamingGhostBuster, StreamingWeakReference};
pub use identity::{IdentifiedProvider, IdentityDecorator};
pub use janitor::CursorProviderJanitor;
pub use managed::{CloseRecord, ManagedCursor, ManagedCursorProvider};
pub use manager::CursorManager;
pub use provider::{DecoratorLayer, Provider, ProviderDecorator};
pub use service::StreamingService;
pub use state::{EventStreamingState, TeardownReport};
