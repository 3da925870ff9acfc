//! Request-scoped key/value storage.
//!
//! Middlewares and handlers often need to hand data to each other: an
//! authenticated user, a parsed payload, a timer start. [`ContextStore`] lets
//! any code holding the request attach values to it for the lifetime of that
//! one request.
//!
//! Two backends ship with the crate:
//!
//! | Store | Where values live | Cleanup |
//! |---|---|---|
//! | [`MapStore`] | one process-wide map keyed by [`RequestId`](crate::RequestId), behind a read/write lock | install [`MapStore::clear_on_exit`] as the outermost middleware |
//! | [`ExtensionStore`] | inside the request's own extensions | none, values drop with the request |
//!
//! Both follow the same contract, so code written against
//! `&dyn ContextStore` works with either, or with a custom backend.
//!
//! Unknown requests and unknown keys are never errors: they read as
//! [`Value::none()`], `None`, or an empty map.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::request::Request;

mod extension;
mod map;

pub use extension::ExtensionStore;
pub use map::{ClearOnExit, MapStore};

/// Context key. Unique per request.
pub type Key = Cow<'static, str>;

/// All values stored for one request.
pub type Values = HashMap<Key, Value>;

// ── Value ─────────────────────────────────────────────────────────────────────

/// An opaque, cheaply clonable context value.
///
/// [`Value::none()`] is the "no value" sentinel returned by
/// [`ContextStore::get`] for missing keys. It may also be stored explicitly;
/// [`ContextStore::get_ok`] tells the two cases apart.
#[derive(Clone, Default)]
pub struct Value(Option<Arc<dyn Any + Send + Sync>>);

impl Value {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    pub const fn none() -> Self {
        Self(None)
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// Borrows the inner value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("Value(..)"),
            None => f.write_str("Value(none)"),
        }
    }
}

// ── ContextStore ──────────────────────────────────────────────────────────────

/// Per-request key/value storage.
///
/// Every operation is total: nothing here fails. Writers take
/// `&mut Request` so that backends storing data inside the request itself
/// need no locking.
pub trait ContextStore: Send + Sync {
    /// Stores `value` under `key` for `req`, replacing any previous value.
    fn set(&self, req: &mut Request, key: Key, value: Value);

    /// Returns the value stored under `key`, or [`Value::none()`].
    fn get(&self, req: &Request, key: &str) -> Value {
        self.get_ok(req, key).unwrap_or_default()
    }

    /// Returns the value stored under `key`, or `None` if the key was never
    /// set (or was deleted, or the request was cleared).
    fn get_ok(&self, req: &Request, key: &str) -> Option<Value>;

    /// Snapshot of every value stored for `req`. Empty when there are none.
    /// Mutating the snapshot does not touch the store.
    fn get_all(&self, req: &Request) -> Values;

    /// Removes `key`. Absent keys are ignored.
    fn delete(&self, req: &mut Request, key: &str);

    /// Drops everything stored for `req`. Idempotent.
    fn clear(&self, req: &mut Request);
}

impl<S: ContextStore + ?Sized> ContextStore for Arc<S> {
    fn set(&self, req: &mut Request, key: Key, value: Value) { (**self).set(req, key, value) }
    fn get(&self, req: &Request, key: &str) -> Value { (**self).get(req, key) }
    fn get_ok(&self, req: &Request, key: &str) -> Option<Value> { (**self).get_ok(req, key) }
    fn get_all(&self, req: &Request) -> Values { (**self).get_all(req) }
    fn delete(&self, req: &mut Request, key: &str) { (**self).delete(req, key) }
    fn clear(&self, req: &mut Request) { (**self).clear(req) }
}

impl<S: ContextStore + ?Sized> ContextStore for &S {
    fn set(&self, req: &mut Request, key: Key, value: Value) { (**self).set(req, key, value) }
    fn get(&self, req: &Request, key: &str) -> Value { (**self).get(req, key) }
    fn get_ok(&self, req: &Request, key: &str) -> Option<Value> { (**self).get_ok(req, key) }
    fn get_all(&self, req: &Request) -> Values { (**self).get_all(req) }
    fn delete(&self, req: &mut Request, key: &str) { (**self).delete(req, key) }
    fn clear(&self, req: &mut Request) { (**self).clear(req) }
}
