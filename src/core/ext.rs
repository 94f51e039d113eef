//! Purpose: Per-model behavior extension hooks, resolved at construction.
//! Exports: `ModelExt`, `ExtRegistry`.
//! Role: Strategy injection in place of per-model subclassing; a handle looks
//! its extension up once and composes it into records and collections.
//! Invariants: Extensions tune behavior; they never bypass the shared cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Optional per-model behavior composed into `Record` and `Collection`.
pub trait ModelExt: Send + Sync {
    /// Model this extension applies to.
    fn model(&self) -> &str;

    /// Field whose cached value stands in for the display label, avoiding a
    /// `name_get` round trip on `Record::name`.
    fn display_field(&self) -> Option<&str> {
        None
    }

    /// Paths warmed by `Collection::prefetch` when the caller passes none.
    fn default_prefetch(&self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct ExtRegistry {
    inner: Mutex<HashMap<String, Arc<dyn ModelExt>>>,
}

impl ExtRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, ext: Arc<dyn ModelExt>) {
        self.inner
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .insert(ext.model().to_string(), ext);
    }

    pub fn resolve(&self, model: &str) -> Option<Arc<dyn ModelExt>> {
        self.inner
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .get(model)
            .cloned()
    }
}
