//! Cursor provider variants
//!
//! Providers form singly-linked decorator chains that end in a root
//! provider owning the actual buffer. Instead of probing objects at
//! runtime for optional capabilities, the small closed set of variants is
//! an enum with explicit identity and delegate fields:
//!
//! ```text
//! Managed ──► Identified ──► Decorated ──► ... ──► Root
//!  (id,        (id,           (layer,               (buffer)
//!   janitor)    delegate)      delegate)
//! ```
//!
//! Every variant reports the [`StreamKind`] of its root. Unwrapping walks
//! delegate links iteratively, so arbitrarily deep chains are fine.

use std::fmt;
use std::sync::Arc;

use streamkeeper_core::{
    ComponentLocation, Cursor, CursorProvider, ProviderId, StreamKind, StreamingResult,
};

use crate::identity::IdentifiedProvider;
use crate::managed::ManagedCursorProvider;

/// Behaviour added by one decorator layer
///
/// Every hook receives the layer's delegate and defaults to plain
/// forwarding, so a layer only overrides what it changes.
pub trait DecoratorLayer: Send + Sync {
    /// Open a cursor through this layer
    fn open_cursor(&self, delegate: &Provider) -> StreamingResult<Box<dyn Cursor>> {
        delegate.open_cursor()
    }

    /// Close through this layer
    fn close(&self, delegate: &Provider) {
        delegate.close()
    }

    /// Release resources through this layer
    fn release_resources(&self, delegate: &Provider) {
        delegate.release_resources()
    }

    /// Originating location as seen through this layer
    fn originating_location<'a>(&'a self, delegate: &'a Provider) -> Option<&'a ComponentLocation> {
        delegate.originating_location()
    }
}

/// A provider wrapping exactly one delegate with a [`DecoratorLayer`]
pub struct ProviderDecorator {
    delegate: Provider,
    layer: Box<dyn DecoratorLayer>,
    kind: StreamKind,
}

impl ProviderDecorator {
    /// The wrapped provider
    pub fn delegate(&self) -> &Provider {
        &self.delegate
    }
}

/// A cursor provider in one of its variants
///
/// Cloning is cheap and preserves instance identity.
#[derive(Clone)]
pub enum Provider {
    /// Root provider owning the underlying data source
    Root(Arc<dyn CursorProvider>),
    /// Wrapper adding behaviour around one delegate
    Decorated(Arc<ProviderDecorator>),
    /// Wrapper carrying a stable identity
    Identified(Arc<IdentifiedProvider>),
    /// Identified provider whose cursors are reference counted
    Managed(Arc<ManagedCursorProvider>),
}

impl Provider {
    /// Wrap a root provider
    pub fn root<P: CursorProvider + 'static>(provider: P) -> Self {
        Provider::Root(Arc::new(provider))
    }

    /// Wrap `delegate` with a decorator layer
    pub fn decorate<L: DecoratorLayer + 'static>(delegate: Provider, layer: L) -> Self {
        let kind = delegate.kind();
        Provider::Decorated(Arc::new(ProviderDecorator {
            delegate,
            layer: Box::new(layer),
            kind,
        }))
    }

    /// Stream capability of the root provider
    pub fn kind(&self) -> StreamKind {
        match self {
            Provider::Root(root) => root.kind(),
            Provider::Decorated(decorator) => decorator.kind,
            Provider::Identified(identified) => identified.kind(),
            Provider::Managed(managed) => managed.kind(),
        }
    }

    /// Identity of the outermost layer, if it carries one
    pub fn id(&self) -> Option<ProviderId> {
        match self {
            Provider::Root(_) | Provider::Decorated(_) => None,
            Provider::Identified(identified) => Some(identified.id()),
            Provider::Managed(managed) => Some(managed.id()),
        }
    }

    /// The next provider down the chain, `None` for a root
    pub fn delegate(&self) -> Option<Provider> {
        match self {
            Provider::Root(_) => None,
            Provider::Decorated(decorator) => Some(decorator.delegate.clone()),
            Provider::Identified(identified) => Some(identified.delegate().clone()),
            Provider::Managed(managed) => Some(Provider::Identified(Arc::clone(managed.delegate()))),
        }
    }

    /// First identity found walking from this layer towards the root
    pub fn find_identity(&self) -> Option<ProviderId> {
        let mut current = self.clone();
        loop {
            if let Some(id) = current.id() {
                return Some(id);
            }
            match current.delegate() {
                Some(next) => current = next,
                None => return None,
            }
        }
    }

    /// The non-decorator provider at the end of the chain
    pub fn unwrap_root(&self) -> Provider {
        let mut current = self.clone();
        while let Some(next) = current.delegate() {
            current = next;
        }
        current
    }

    /// Number of delegate links between this layer and the root
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.clone();
        while let Some(next) = current.delegate() {
            depth += 1;
            current = next;
        }
        depth
    }

    /// Open a new cursor
    pub fn open_cursor(&self) -> StreamingResult<Box<dyn Cursor>> {
        match self {
            Provider::Root(root) => root.open_cursor(),
            Provider::Decorated(decorator) => decorator.layer.open_cursor(&decorator.delegate),
            Provider::Identified(identified) => identified.delegate().open_cursor(),
            Provider::Managed(managed) => managed.open_cursor(),
        }
    }

    /// Close the provider
    pub fn close(&self) {
        match self {
            Provider::Root(root) => root.close(),
            Provider::Decorated(decorator) => decorator.layer.close(&decorator.delegate),
            Provider::Identified(identified) => identified.delegate().close(),
            Provider::Managed(managed) => managed.close(),
        }
    }

    /// Whether the provider was closed
    pub fn is_closed(&self) -> bool {
        match self {
            Provider::Root(root) => root.is_closed(),
            Provider::Decorated(decorator) => decorator.delegate.is_closed(),
            Provider::Identified(identified) => identified.delegate().is_closed(),
            Provider::Managed(managed) => managed.is_closed(),
        }
    }

    /// Release the underlying resources
    pub fn release_resources(&self) {
        match self {
            Provider::Root(root) => root.release_resources(),
            Provider::Decorated(decorator) => {
                decorator.layer.release_resources(&decorator.delegate)
            }
            Provider::Identified(identified) => identified.delegate().release_resources(),
            Provider::Managed(managed) => managed.release_resources(),
        }
    }

    /// The component that produced the stream, if known
    pub fn originating_location(&self) -> Option<&ComponentLocation> {
        match self {
            Provider::Root(root) => root.originating_location(),
            Provider::Decorated(decorator) => {
                decorator.layer.originating_location(&decorator.delegate)
            }
            Provider::Identified(identified) => identified.delegate().originating_location(),
            Provider::Managed(managed) => managed.originating_location(),
        }
    }

    /// Whether both handles point at the same provider instance
    pub fn same_instance(&self, other: &Provider) -> bool {
        match (self, other) {
            (Provider::Root(a), Provider::Root(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (Provider::Decorated(a), Provider::Decorated(b)) => Arc::ptr_eq(a, b),
            (Provider::Identified(a), Provider::Identified(b)) => Arc::ptr_eq(a, b),
            (Provider::Managed(a), Provider::Managed(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The managed provider, if this is one
    pub fn as_managed(&self) -> Option<&Arc<ManagedCursorProvider>> {
        match self {
            Provider::Managed(managed) => Some(managed),
            _ => None,
        }
    }
}

impl From<Arc<IdentifiedProvider>> for Provider {
    fn from(identified: Arc<IdentifiedProvider>) -> Self {
        Provider::Identified(identified)
    }
}

impl From<Arc<ManagedCursorProvider>> for Provider {
    fn from(managed: Arc<ManagedCursorProvider>) -> Self {
        Provider::Managed(managed)
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variant = match self {
            Provider::Root(_) => "Root",
            Provider::Decorated(_) => "Decorated",
            Provider::Identified(_) => "Identified",
            Provider::Managed(_) => "Managed",
        };
        f.debug_struct("Provider")
            .field("variant", &variant)
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish()
    }
}
