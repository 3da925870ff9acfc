//! Process-wide context map keyed by request identity.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::{ContextStore, Key, Value, Values};
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::middleware::Middleware;
use crate::request::{Request, RequestId};

/// One map for the whole process, guarded by a single read/write lock.
///
/// Reads (`get`, `get_ok`, `get_all`) share the lock; writes (`set`,
/// `delete`, `clear`) take it exclusively. Every critical section is a single
/// hash-map operation.
///
/// Entries are **not** freed automatically. Install
/// [`clear_on_exit`](MapStore::clear_on_exit) as the outermost middleware, or
/// call [`ContextStore::clear`] yourself, or the map grows with every request.
#[derive(Debug, Default)]
pub struct MapStore {
    data: RwLock<HashMap<RequestId, Values>>,
}

impl MapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests that currently have at least one value stored.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn clear_id(&self, id: RequestId) {
        if self.data.write().remove(&id).is_some() {
            trace!(request_id = %id, "context cleared");
        }
    }

    /// Middleware that drops the request's entries once the rest of the chain
    /// is done with it.
    ///
    /// Clearing happens when the wrapped future finishes, unwinds from a
    /// panic, or is dropped mid-flight (client gone, timeout). Install it
    /// first in the chain so every other interceptor still sees the values.
    pub fn clear_on_exit(self: &Arc<Self>) -> ClearOnExit {
        ClearOnExit { store: Arc::clone(self) }
    }
}

impl ContextStore for MapStore {
    fn set(&self, req: &mut Request, key: Key, value: Value) {
        self.data.write().entry(req.id()).or_default().insert(key, value);
    }

    fn get_ok(&self, req: &Request, key: &str) -> Option<Value> {
        self.data.read().get(&req.id())?.get(key).cloned()
    }

    fn get_all(&self, req: &Request) -> Values {
        self.data.read().get(&req.id()).cloned().unwrap_or_default()
    }

    fn delete(&self, req: &mut Request, key: &str) {
        let mut data = self.data.write();
        if let Some(values) = data.get_mut(&req.id()) {
            values.remove(key);
            // An empty map and no map must be indistinguishable; don't keep one around.
            if values.is_empty() {
                data.remove(&req.id());
            }
        }
    }

    fn clear(&self, req: &mut Request) {
        self.clear_id(req.id());
    }
}

// ── Cleanup middleware ───────────────────────────────────────────────────────

/// Middleware returned by [`MapStore::clear_on_exit`].
#[derive(Clone, Debug)]
pub struct ClearOnExit {
    store: Arc<MapStore>,
}

impl Middleware for ClearOnExit {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(ClearingHandler { store: Arc::clone(&self.store), next })
    }
}

struct ClearingHandler {
    store: Arc<MapStore>,
    next: BoxedHandler,
}

impl ErasedHandler for ClearingHandler {
    fn call(&self, req: Request) -> BoxFuture {
        let guard = ClearGuard { store: Arc::clone(&self.store), id: req.id() };
        let next = Arc::clone(&self.next);
        Box::pin(async move {
            let _guard = guard;
            next.call(req).await
        })
    }
}

/// Clears one request's entries when dropped.
struct ClearGuard {
    store: Arc<MapStore>,
    id: RequestId,
}

impl Drop for ClearGuard {
    fn drop(&mut self) {
        self.store.clear_id(self.id);
    }
}
