//! Process-scoped registry of metadata-extension providers.
//!
//! Several entity graphs built in the same process share one cache through an
//! `Arc`, so a provider is attached to a type at most once no matter how many
//! graphs discover that type. Inserts are append-only and idempotent.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct ProviderCache {
    registered: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl ProviderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` for `ty` if absent. Returns true when this call inserted it.
    pub fn register(&self, ty: &str, provider: &str) -> bool {
        let mut registered = self
            .registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        registered
            .entry(ty.to_string())
            .or_default()
            .insert(provider.to_string())
    }

    pub fn is_registered(&self, ty: &str, provider: &str) -> bool {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ty)
            .is_some_and(|p| p.contains(provider))
    }

    /// Providers registered for `ty`, in name order.
    pub fn providers_for(&self, ty: &str) -> Vec<String> {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ty)
            .map(|p| p.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(BTreeSet::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
