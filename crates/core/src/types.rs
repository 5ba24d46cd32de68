//! Core types for streamkeeper
//!
//! This module defines the foundational types:
//! - ProviderId: Process-unique identity of a cursor provider
//! - ContextId: Unique identifier for an execution context
//! - StreamKind: Byte-cursor vs object-cursor capability
//! - ComponentLocation: Originating-location tag used in diagnostics

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Process-unique identity of a cursor provider
///
/// Ids are allocated from a monotonic counter owned by the identity
/// decorator. An id is never reused during the lifetime of that counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(u64);

impl ProviderId {
    /// Wrap a raw id value
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw id value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique identifier for an execution context
///
/// A ContextId is a wrapper around a UUID v4. Managed providers are
/// deduplicated per context and torn down when their context ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Create a new random ContextId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a ContextId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parse a ContextId from a string representation
    ///
    /// Returns None if the string is not a valid UUID.
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the raw bytes of this ContextId
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The stream capability a provider exposes
///
/// Decoration never changes the kind: every wrapper reports the kind of
/// the root provider it ultimately delegates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    /// Provider of byte cursors (repeatable input streams)
    Bytes,
    /// Provider of object cursors (repeatable iterators)
    Objects,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Bytes => f.write_str("bytes"),
            StreamKind::Objects => f.write_str("objects"),
        }
    }
}

/// Opaque tag naming the component that produced a stream
///
/// Surfaced verbatim in leak alerts, e.g. `"orders-flow/processors/2"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentLocation(String);

impl ComponentLocation {
    /// Create a location tag
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    /// Borrow the tag as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
