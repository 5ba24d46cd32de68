//! Stable provider identity
//!
//! `IdentityDecorator::of` gives every provider chain a process-unique
//! [`ProviderId`] without ever wrapping the same identity twice:
//!
//! - an identified provider is returned as-is (same instance)
//! - a managed provider yields its own identified delegate
//! - a decorator chain is wrapped once more, reusing the first identity
//!   found deeper in the chain, if any
//! - anything else gets the next id from the counter
//!
//! The counter is owned by the decorator instance and injected wherever
//! identities are needed; there is no global.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use streamkeeper_core::{ProviderId, StreamKind};

use crate::provider::Provider;

/// A provider carrying a stable identity
#[derive(Debug)]
pub struct IdentifiedProvider {
    id: ProviderId,
    kind: StreamKind,
    delegate: Provider,
}

impl IdentifiedProvider {
    /// The stable identity
    pub fn id(&self) -> ProviderId {
        self.id
    }

    /// Stream capability of the wrapped chain
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// The wrapped provider
    pub fn delegate(&self) -> &Provider {
        &self.delegate
    }
}

/// Assigns and preserves provider identities
#[derive(Debug)]
pub struct IdentityDecorator {
    next_id: AtomicU64,
    first_id: u64,
}

impl IdentityDecorator {
    /// Create a decorator whose first id is 1
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create a decorator whose first allocated id is `first_id`
    pub fn starting_at(first_id: u64) -> Self {
        Self {
            next_id: AtomicU64::new(first_id),
            first_id,
        }
    }

    /// Decorate `provider` with a stable identity
    pub fn of(&self, provider: &Provider) -> Arc<IdentifiedProvider> {
        match provider {
            Provider::Identified(identified) => Arc::clone(identified),
            Provider::Managed(managed) => Arc::clone(managed.delegate()),
            Provider::Root(_) => self.wrap(self.allocate(), provider),
            Provider::Decorated(_) => {
                let id = provider
                    .find_identity()
                    .unwrap_or_else(|| self.allocate());
                self.wrap(id, provider)
            }
        }
    }

    /// Number of ids allocated so far
    pub fn issued(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - self.first_id
    }

    fn allocate(&self) -> ProviderId {
        ProviderId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn wrap(&self, id: ProviderId, provider: &Provider) -> Arc<IdentifiedProvider> {
        Arc::new(IdentifiedProvider {
            id,
            kind: provider.kind(),
            delegate: provider.clone(),
        })
    }
}

impl Default for IdentityDecorator {
    fn default() -> Self {
        Self::new()
    }
}
