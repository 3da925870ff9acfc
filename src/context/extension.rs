//! Context values carried inside the request itself.

use super::{ContextStore, Key, Value, Values};
use crate::request::Request;

/// Stores values in the request's own [`http::Extensions`].
///
/// The value map is installed on the first write and found again by type on
/// every later access. There is no shared map, no lock and nothing to clean
/// up: the values are dropped together with the request.
///
/// The store itself is stateless, so one `ExtensionStore` can serve every
/// request.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtensionStore;

/// The map as it sits in the extensions. A private newtype so nothing else
/// inserting a `Values` can collide with it.
#[derive(Clone, Default)]
struct Embedded(Values);

impl ExtensionStore {
    fn embedded(req: &Request) -> Option<&Values> {
        req.extensions().get::<Embedded>().map(|e| &e.0)
    }

    fn embedded_mut(req: &mut Request) -> &mut Values {
        &mut req.extensions_mut().get_or_insert_default::<Embedded>().0
    }
}

impl ContextStore for ExtensionStore {
    fn set(&self, req: &mut Request, key: Key, value: Value) {
        Self::embedded_mut(req).insert(key, value);
    }

    fn get_ok(&self, req: &Request, key: &str) -> Option<Value> {
        Self::embedded(req)?.get(key).cloned()
    }

    fn get_all(&self, req: &Request) -> Values {
        Self::embedded(req).cloned().unwrap_or_default()
    }

    fn delete(&self, req: &mut Request, key: &str) {
        if let Some(embedded) = req.extensions_mut().get_mut::<Embedded>() {
            embedded.0.remove(key);
        }
    }

    fn clear(&self, req: &mut Request) {
        req.extensions_mut().remove::<Embedded>();
    }
}
