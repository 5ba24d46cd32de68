//! Collaborator traits
//!
//! The concrete cursors and providers that actually buffer bytes or page
//! objects live outside this workspace. This module fixes the contract
//! they must satisfy to be tracked:
//!
//! - `Cursor`: one consumer's handle over a stream
//! - `CursorProvider`: owner of a repeatable data source

use crate::error::StreamingResult;
use crate::types::{ComponentLocation, StreamKind};

/// A single consumer's view over a repeatable stream
///
/// Cursors over the same provider are released independently of each
/// other. `release()` is called once per cursor by its consumer; an
/// implementation may release a different, previously derived cursor as
/// a side effect (nested cursors).
pub trait Cursor: Send + Sync {
    /// Release this cursor
    fn release(&self);

    /// Whether `release()` has already been called
    fn is_released(&self) -> bool;
}

/// Owner of a repeatable data source, capable of producing many cursors
///
/// # Contract
///
/// - `release_resources()` is idempotent: calling it more than once must
///   not double-free or panic.
/// - `open_cursor()` on a closed provider fails with
///   [`StreamingError::ProviderClosed`](crate::StreamingError::ProviderClosed).
pub trait CursorProvider: Send + Sync {
    /// Which cursor capability this provider exposes
    fn kind(&self) -> StreamKind;

    /// Open a new cursor positioned at the start of the stream
    fn open_cursor(&self) -> StreamingResult<Box<dyn Cursor>>;

    /// Mark the provider closed; no new cursors may be opened afterwards
    fn close(&self);

    /// Whether `close()` has been called
    fn is_closed(&self) -> bool;

    /// Free the underlying buffers
    fn release_resources(&self);

    /// The component that produced this stream, if known
    fn originating_location(&self) -> Option<&ComponentLocation> {
        None
    }
}
