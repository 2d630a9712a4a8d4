//! Object Loader interface.
//!
//! The loader turns a reference whose content is present locally (base
//! content or a mounted chunk) into a live object. The coordinator never
//! inspects objects; it only hands them to the caller.

use crate::transport::BoxFuture;

/// In-memory object loader.
pub trait ObjectLoader: Send + Sync + 'static {
    /// The loaded object type handed back to callers.
    type Object: Send + 'static;

    /// Synchronous fast path: the object if the reference is already
    /// resolved in memory.
    fn try_get_resolved(&self, reference: &str) -> Option<Self::Object>;

    /// Whether the reference is already resolved in memory.
    fn is_already_resolved(&self, reference: &str) -> bool {
        self.try_get_resolved(reference).is_some()
    }

    /// Load the object for a reference.
    ///
    /// Resolves to `None` when nothing exists at the reference.
    fn load_async(&self, reference: &str) -> BoxFuture<'static, Option<Self::Object>>;
}
