//! Store Property Resolver - anonymous handles to `{store, property, kind}`.
//!
//! Keeps an identity index per registered store and a snapshot cache of every
//! derived property. The host supplies no "before" value for derived
//! properties, so the snapshot taken at the last checkpoint plays that role:
//! - registration takes the first snapshot
//! - [`StoreResolver::action_started`] snapshots a store right before an action
//! - [`StoreResolver::snapshot_all_derived_values`] runs once per commit
//!
//! Reading old/new pairs never writes the cache, so every consumer within one
//! render cycle sees the same "before".

mod strategies;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, trace};

use self::strategies::{LOOKUP_CHAIN, RegisteredStore, ResolverContext, by_container_member};
use super::classifier::DerivedValues;
use crate::host::{Computed, OperationKind, PropertyKey, ReactiveHandle, Store, Value};
use crate::types::{PropKind, StorePropertyInfo, unreadable};

#[derive(Default)]
struct ResolverState {
    stores: BTreeMap<String, RegisteredStore>,
    /// `"storeId.prop"` -> value at the last checkpoint.
    snapshots: HashMap<String, Value>,
    /// Stores whose post-action refresh is still due.
    scheduled: BTreeSet<String>,
}

/// Resolves reactive handles to store properties.
#[derive(Default)]
pub struct StoreResolver {
    state: RefCell<ResolverState>,
    debug: Cell<bool>,
}

impl StoreResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trace every lookup step. Has no effect on results.
    pub fn set_debug(&self, enabled: bool) {
        self.debug.set(enabled);
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.get()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register `store`. Returns false if its id was already registered.
    pub fn register(&self, store: &Store) -> bool {
        let id = store.id().to_string();
        if self.state.borrow().stores.contains_key(&id) {
            trace!(store = %id, "store already registered");
            return false;
        }

        let registered = RegisteredStore::index(store);
        debug!(
            store = %id,
            properties = registered.properties.len(),
            derived = registered.derived.len(),
            "registered store"
        );
        self.state.borrow_mut().stores.insert(id.clone(), registered);
        self.snapshot_store(&id);
        true
    }

    pub fn is_registered(&self, store_id: &str) -> bool {
        self.state.borrow().stores.contains_key(store_id)
    }

    pub fn store_ids(&self) -> Vec<String> {
        self.state.borrow().stores.keys().cloned().collect()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Resolve a handle through the fallback chain.
    pub fn lookup(&self, handle: &ReactiveHandle) -> Option<StorePropertyInfo> {
        let state = self.state.borrow();
        let ctx = ResolverContext::new(&state.stores);
        for (name, strategy) in LOOKUP_CHAIN {
            let found = strategy(handle, &ctx);
            if self.debug.get() {
                trace!(strategy = name, ?handle, hit = ?found, "lookup");
            }
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// [`lookup`](Self::lookup), then treat `handle` as a state container
    /// accessed at `key`.
    pub fn lookup_access(
        &self,
        handle: &ReactiveHandle,
        key: Option<&PropertyKey>,
    ) -> Option<StorePropertyInfo> {
        if let Some(info) = self.lookup(handle) {
            return Some(info);
        }
        let key = key?;
        let state = self.state.borrow();
        let ctx = ResolverContext::new(&state.stores);
        let found = by_container_member(&Value::Handle(handle.clone()), key.as_str(), &ctx);
        if self.debug.get() {
            trace!(strategy = "container-member", ?handle, %key, hit = ?found, "lookup");
        }
        found
    }

    /// Last resort for `get` events: match a derived property by current value.
    ///
    /// Never matches state properties, undefined values, or a value shared by
    /// more than one derived property.
    pub fn lookup_by_current_value(
        &self,
        value: &Value,
        kind: OperationKind,
    ) -> Option<StorePropertyInfo> {
        if kind != OperationKind::Get || value.is_undefined() {
            return None;
        }
        let candidates = self.derived_handles();
        let state = self.state.borrow();
        let mut matches = candidates.iter().filter(|(info, computed)| {
            let current = match computed.peek_cached() {
                Ok(Some(current)) => current,
                _ => state
                    .snapshots
                    .get(&info.cache_key())
                    .cloned()
                    .unwrap_or_default(),
            };
            current.strict_eq(value)
        });

        let first = matches.next().map(|(info, _)| info.clone());
        let ambiguous = matches.next().is_some();
        if self.debug.get() {
            trace!(strategy = "current-value", hit = ?first, ambiguous, "lookup");
        }
        if ambiguous { None } else { first }
    }

    // =========================================================================
    // Derived values
    // =========================================================================

    /// Last snapshot as `old_value`, a fresh (unmemoized) evaluation as `new_value`.
    ///
    /// Does not touch the snapshot cache.
    pub fn get_derived_value_with_previous(&self, store_id: &str, prop_name: &str) -> DerivedValues {
        let (computed, old_value) = {
            let state = self.state.borrow();
            let computed = state
                .stores
                .get(store_id)
                .and_then(|s| s.derived.get(prop_name).cloned());
            let old = state
                .snapshots
                .get(&format!("{store_id}.{prop_name}"))
                .cloned()
                .unwrap_or_default();
            (computed, old)
        };
        let Some(computed) = computed else {
            return DerivedValues::default();
        };
        let new_value = computed.recompute().unwrap_or_else(|err| unreadable(&err));
        DerivedValues { old_value, new_value }
    }

    /// Recompute and store every derived property of every store.
    pub fn snapshot_all_derived_values(&self) {
        let handles = self.derived_handles();
        let count = handles.len();
        self.store_snapshots(handles);
        trace!(count, "snapshot all derived values");
    }

    /// Recompute and store the derived properties of one store.
    pub fn snapshot_store(&self, store_id: &str) {
        let handles: Vec<_> = self
            .derived_handles()
            .into_iter()
            .filter(|(info, _)| info.store_id == store_id)
            .collect();
        self.store_snapshots(handles);
    }

    /// Cached snapshot for one derived property.
    pub fn snapshot_of(&self, store_id: &str, prop_name: &str) -> Option<Value> {
        self.state
            .borrow()
            .snapshots
            .get(&format!("{store_id}.{prop_name}"))
            .cloned()
    }

    fn derived_handles(&self) -> Vec<(StorePropertyInfo, Computed)> {
        let state = self.state.borrow();
        state
            .stores
            .values()
            .flat_map(|store| {
                store.derived.iter().map(|(name, computed)| {
                    (
                        StorePropertyInfo::new(store.store.id(), name, PropKind::Derived),
                        computed.clone(),
                    )
                })
            })
            .collect()
    }

    // Getters run with no borrow held; they may read anything.
    fn store_snapshots(&self, handles: Vec<(StorePropertyInfo, Computed)>) {
        let fresh: Vec<(String, Value)> = handles
            .into_iter()
            .map(|(info, computed)| {
                let value = computed.recompute().unwrap_or_else(|err| unreadable(&err));
                (info.cache_key(), value)
            })
            .collect();
        self.state.borrow_mut().snapshots.extend(fresh);
    }

    // =========================================================================
    // Action checkpoints
    // =========================================================================

    /// Checkpoint right before an action on `store_id` executes.
    pub fn action_started(&self, store_id: &str) {
        trace!(store = store_id, "action started");
        self.snapshot_store(store_id);
    }

    /// Schedule a refresh for after the action has settled.
    pub fn action_finished(&self, store_id: &str) {
        self.state.borrow_mut().scheduled.insert(store_id.to_string());
    }

    /// Run `action` on a registered store with checkpoints around it.
    ///
    /// Returns false if the store or action does not exist.
    pub fn run_action(&self, store_id: &str, action: &str) -> bool {
        let found = self
            .state
            .borrow()
            .stores
            .get(store_id)
            .and_then(|s| s.store.action(action));
        let Some(run) = found else {
            return false;
        };
        self.action_started(store_id);
        run();
        self.action_finished(store_id);
        true
    }

    /// Run every scheduled post-action refresh. Returns how many stores were refreshed.
    ///
    /// The host calls this once it has settled, outside a render cycle.
    pub fn run_scheduled_refreshes(&self) -> usize {
        let due = std::mem::take(&mut self.state.borrow_mut().scheduled);
        for store_id in &due {
            self.snapshot_store(store_id);
        }
        due.len()
    }

    /// Drop every pending refresh without running it.
    pub(crate) fn clear_scheduled(&self) {
        self.state.borrow_mut().scheduled.clear();
    }
}
