//! Lookup strategies.
//!
//! The same logical store property shows up under different handles depending
//! on the access path. Each strategy is a pure function over the registered
//! stores and either resolves the handle or falls through to the next one.

use std::collections::{BTreeMap, HashMap};

use crate::host::{Computed, HandleId, ReactiveHandle, Store, StoreMember, Value};
use crate::types::{PropKind, StorePropertyInfo};

/// Signature shared by every strategy in the fallback chain.
pub(crate) type Strategy = fn(&ReactiveHandle, &ResolverContext<'_>) -> Option<StorePropertyInfo>;

/// Fallback chain, in priority order.
pub(crate) const LOOKUP_CHAIN: [(&str, Strategy); 4] = [
    ("identity", by_identity),
    ("raw-identity", by_raw_identity),
    ("array-scan", by_array_scan),
    ("view", by_view),
];

// =============================================================================
// Registered store
// =============================================================================

/// A property indexed under some identity.
///
/// `anchor` keeps the indexed value alive so its identity cannot be reused.
pub(crate) struct IndexedProperty {
    pub(crate) info: StorePropertyInfo,
    _anchor: Value,
}

pub(crate) struct RegisteredStore {
    pub(crate) store: Store,
    pub(crate) index: HashMap<HandleId, IndexedProperty>,
    /// Every data property and its kind.
    pub(crate) properties: BTreeMap<String, PropKind>,
    pub(crate) derived: BTreeMap<String, Computed>,
}

impl RegisteredStore {
    /// Walk the state container and the store's own members.
    ///
    /// Actions and internal (`$`/`_`) members are skipped. When two entries
    /// share an identity, the first one indexed wins.
    pub(crate) fn index(store: &Store) -> Self {
        let mut registered = Self {
            store: store.clone(),
            index: HashMap::new(),
            properties: BTreeMap::new(),
            derived: BTreeMap::new(),
        };

        for (name, value) in store.state().entries() {
            registered.index_value(&name, &value);
        }
        for (name, member) in store.members() {
            if Store::is_internal(name) {
                continue;
            }
            match member {
                StoreMember::Value(value) => registered.index_value(name, value),
                StoreMember::Derived(computed) => {
                    registered.index_value(name, &Value::from(computed.clone()))
                }
                StoreMember::Action(_) => {}
            }
        }
        registered
    }

    fn index_value(&mut self, name: &str, value: &Value) {
        let kind = match value {
            Value::Handle(ReactiveHandle::Computed(computed)) => {
                self.derived
                    .entry(name.to_string())
                    .or_insert_with(|| computed.clone());
                PropKind::Derived
            }
            _ => PropKind::State,
        };
        self.properties.entry(name.to_string()).or_insert(kind);

        match value {
            Value::Handle(handle) => {
                self.insert(handle.id(), name, kind, value.clone());
                // Both the wrapper and whatever it wraps
                if let Some(raw_id) = handle.raw_identity() {
                    if let Some(object) = handle.as_object() {
                        self.insert(raw_id, name, kind, object.raw().clone());
                    }
                }
                // A cell holding a composite: mutations target the composite
                if let ReactiveHandle::Cell(cell) = handle {
                    if let Ok(inner) = cell.get() {
                        let raw = inner.unwrap_raw();
                        if let Some(id) = raw.identity() {
                            self.insert(id, name, kind, raw);
                        }
                    }
                }
            }
            Value::Array(_) | Value::Object(_) => {
                if let Some(id) = value.identity() {
                    self.insert(id, name, kind, value.clone());
                }
            }
            _ => {}
        }
    }

    fn insert(&mut self, id: HandleId, name: &str, kind: PropKind, anchor: Value) {
        let store_id = self.store.id().to_string();
        self.index.entry(id).or_insert_with(|| IndexedProperty {
            info: StorePropertyInfo::new(store_id, name, kind),
            _anchor: anchor,
        });
    }

    pub(crate) fn info(&self, name: &str) -> Option<StorePropertyInfo> {
        self.properties
            .get(name)
            .map(|kind| StorePropertyInfo::new(self.store.id(), name, *kind))
    }

    /// Is `value` this store's state container (wrapper or raw)?
    pub(crate) fn is_container(&self, value: &Value) -> bool {
        let container = self.store.state();
        match value {
            Value::Handle(ReactiveHandle::Object(object)) => {
                object.id() == container.id() || object.raw().strict_eq(container.raw())
            }
            other => other.strict_eq(container.raw()),
        }
    }

    /// Current values of the state properties, reading through cells.
    pub(crate) fn current_state_values(&self) -> Vec<(String, Value)> {
        let mut values: Vec<(String, Value)> = self.store.state().entries();
        for (name, member) in self.store.members() {
            if let StoreMember::Value(value) = member {
                if !Store::is_internal(name) {
                    values.push((name.clone(), value.clone()));
                }
            }
        }
        values
            .into_iter()
            .filter(|(name, _)| self.properties.get(name) == Some(&PropKind::State))
            .map(|(name, value)| match value {
                Value::Handle(ReactiveHandle::Cell(cell)) => (name, cell.get().unwrap_or_default()),
                other => (name, other),
            })
            .collect()
    }
}

// =============================================================================
// Context
// =============================================================================

/// Read-only view of the registered stores handed to each strategy.
pub(crate) struct ResolverContext<'a> {
    pub(crate) stores: &'a BTreeMap<String, RegisteredStore>,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(stores: &'a BTreeMap<String, RegisteredStore>) -> Self {
        Self { stores }
    }

    fn find_indexed(&self, id: HandleId) -> Option<StorePropertyInfo> {
        self.stores
            .values()
            .find_map(|store| store.index.get(&id).map(|p| p.info.clone()))
    }
}

// =============================================================================
// Strategies
// =============================================================================

/// (1) The handle itself was indexed.
pub(crate) fn by_identity(handle: &ReactiveHandle, ctx: &ResolverContext<'_>) -> Option<StorePropertyInfo> {
    ctx.find_indexed(handle.id())
}

/// (2) The raw value under the handle was indexed.
pub(crate) fn by_raw_identity(
    handle: &ReactiveHandle,
    ctx: &ResolverContext<'_>,
) -> Option<StorePropertyInfo> {
    handle.raw_identity().and_then(|id| ctx.find_indexed(id))
}

/// (3) An array that is currently held by some store's state.
///
/// Catches arrays replaced after registration, which the index never saw.
pub(crate) fn by_array_scan(
    handle: &ReactiveHandle,
    ctx: &ResolverContext<'_>,
) -> Option<StorePropertyInfo> {
    let raw = handle.as_object()?.raw();
    let Value::Array(_) = raw else {
        return None;
    };
    ctx.stores.values().find_map(|store| {
        store
            .current_state_values()
            .into_iter()
            .find(|(_, value)| value.unwrap_raw().strict_eq(raw))
            .and_then(|(name, _)| store.info(&name))
    })
}

/// (4) A view: resolve through its source object and key.
pub(crate) fn by_view(handle: &ReactiveHandle, ctx: &ResolverContext<'_>) -> Option<StorePropertyInfo> {
    let view = handle.as_view()?;
    if let Some(info) = by_container_member(view.source(), view.key(), ctx) {
        return Some(info);
    }
    // The source may hold a handle that is itself indexed
    match view.source().get_property(view.key()) {
        Value::Handle(inner) => by_identity(&inner, ctx).or_else(|| by_raw_identity(&inner, ctx)),
        _ => None,
    }
}

/// `source` is a store's state container and `key` one of its properties.
pub(crate) fn by_container_member(
    source: &Value,
    key: &str,
    ctx: &ResolverContext<'_>,
) -> Option<StorePropertyInfo> {
    ctx.stores
        .values()
        .find(|store| store.is_container(source))
        .and_then(|store| store.info(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{TrackedObject, ValueCell, View};
    use serde_json::json;

    fn stores(list: &[Store]) -> BTreeMap<String, RegisteredStore> {
        list.iter()
            .map(|s| (s.id().to_string(), RegisteredStore::index(s)))
            .collect()
    }

    #[test]
    fn test_index_skips_actions_and_internal_members() {
        let store = Store::new("s")
            .with_state("count", ValueCell::new(0))
            .with_value("$id", "s")
            .with_value("_p", Value::Null)
            .with_derived("double", Computed::new(|| Value::from(0)))
            .with_action("inc", || {});
        let registered = RegisteredStore::index(&store);

        assert_eq!(
            registered.properties.keys().cloned().collect::<Vec<_>>(),
            vec!["count".to_string(), "double".to_string()]
        );
        assert_eq!(registered.properties["double"], PropKind::Derived);
        assert!(registered.derived.contains_key("double"));
    }

    #[test]
    fn test_identity_and_raw_identity() {
        let raw = Value::from(json!({"a": 1}));
        let wrapper = TrackedObject::wrap(raw.clone());
        let store = Store::new("s").with_state("settings", wrapper);
        let map = stores(&[store]);
        let ctx = ResolverContext::new(&map);

        let other_wrapper = ReactiveHandle::from(TrackedObject::wrap(raw));
        assert_eq!(by_identity(&other_wrapper, &ctx), None);
        assert_eq!(
            by_raw_identity(&other_wrapper, &ctx).map(|i| i.prop_name),
            Some("settings".to_string())
        );
    }

    #[test]
    fn test_array_scan_finds_replaced_array() {
        let items = ValueCell::new(Value::from(json!([1])));
        let store = Store::new("list").with_state("items", items.clone());
        let map = stores(&[store]);

        let replacement = Value::from(json!([1, 2]));
        items.set(replacement.clone());

        let ctx = ResolverContext::new(&map);
        let handle = ReactiveHandle::from(TrackedObject::wrap(replacement));
        assert_eq!(by_raw_identity(&handle, &ctx), None);
        assert_eq!(
            by_array_scan(&handle, &ctx),
            Some(StorePropertyInfo::new("list", "items", PropKind::State))
        );
    }

    #[test]
    fn test_view_resolves_through_container() {
        let store = Store::new("user").with_state("name", "ada");
        let view = ReactiveHandle::from(View::new(store.state().clone(), "name"));
        let map = stores(&[store]);
        let ctx = ResolverContext::new(&map);

        assert_eq!(
            by_view(&view, &ctx),
            Some(StorePropertyInfo::new("user", "name", PropKind::State))
        );
    }
}
