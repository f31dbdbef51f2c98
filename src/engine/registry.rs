//! Render Registry - per-component accumulation of render triggers.
//!
//! Manages the render lifecycle of each component instance:
//! - Tracked-keys and pending-trigger buffers, filled while the component renders
//! - Finalization into one immutable [`ComponentRenderEvent`] per commit
//! - Throttling: renders inside the window are held and merged into the next emission
//! - Aggregate statistics and a bounded history of emitted events
//! - Pause/resume as the only cancellation primitive
//!
//! A registry is an explicitly owned value; independent registries share nothing.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::mem;
use std::rc::Rc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, trace};

use super::classifier::{PendingTrigger, classify};
use super::resolver::StoreResolver;
use crate::clock::{Clock, SystemClock};
use crate::config::InspectorConfig;
use crate::host::{PropertyKey, ReactiveChangeEvent, ReactiveHandle, Store};
use crate::types::{
    ComponentId, ComponentRenderEvent, ComponentRenderTotal, PropKind, RenderStats,
    RerenderReason, StorePropertyInfo, Trigger, UNKNOWN_KEY,
};

/// Maximum number of events kept in history.
pub const HISTORY_LIMIT: usize = 100;

/// Number of entries in `RenderStats::most_expensive`.
pub const MOST_EXPENSIVE_LIMIT: usize = 10;

/// Called with every emitted render event.
pub type RenderCallback = Rc<dyn Fn(&ComponentRenderEvent)>;

// =============================================================================
// Registry State
// =============================================================================

/// Render held back by throttling.
struct HeldRender {
    component_name: String,
    triggers: Vec<Trigger>,
    tracked_keys: BTreeSet<PropertyKey>,
}

#[derive(Default)]
struct ComponentState {
    tracked_keys: BTreeSet<PropertyKey>,
    pending: Vec<PendingTrigger>,
    last_emit: Option<DateTime<Utc>>,
    held: Option<HeldRender>,
}

/// Key of one history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HistoryKey {
    pub component_id: ComponentId,
    pub timestamp_ms: i64,
    /// Disambiguates emissions within the same millisecond.
    pub sequence: u64,
}

#[derive(Default)]
struct AggregateStats {
    total_renders: u64,
    renders_by_component: HashMap<String, u64>,
    no_op_render_count: u64,
}

#[derive(Default)]
struct RegistryState {
    components: HashMap<ComponentId, ComponentState>,
    rendered: HashSet<ComponentId>,
    history: VecDeque<(HistoryKey, Rc<ComponentRenderEvent>)>,
    stats: AggregateStats,
    sequence: u64,
}

impl RegistryState {
    /// Build the event, count it and store it in history.
    fn emit(
        &mut self,
        component_id: ComponentId,
        component_name: String,
        triggers: Vec<Trigger>,
        tracked_keys: BTreeSet<PropertyKey>,
        is_initial_render: bool,
        now: DateTime<Utc>,
    ) -> Rc<ComponentRenderEvent> {
        let count = self
            .stats
            .renders_by_component
            .entry(component_name.clone())
            .or_insert(0);
        *count += 1;
        let render_count = *count;

        let event = Rc::new(ComponentRenderEvent {
            rerender_reason: RerenderReason::from_triggers(&triggers),
            component_name,
            component_id,
            timestamp: now,
            triggers,
            tracked_keys,
            is_initial_render,
            render_count,
        });

        self.stats.total_renders += 1;
        if event.has_no_op() {
            self.stats.no_op_render_count += 1;
        }

        let key = HistoryKey {
            component_id,
            timestamp_ms: now.timestamp_millis(),
            sequence: self.sequence,
        };
        self.sequence += 1;
        self.history.push_back((key, event.clone()));
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }

        if let Some(component) = self.components.get_mut(&component_id) {
            component.last_emit = Some(now);
        }
        event
    }
}

// =============================================================================
// RenderRegistry
// =============================================================================

/// Aggregates classified triggers per component and finalizes render events.
///
/// # Example
///
/// ```ignore
/// let registry = RenderRegistry::new(&InspectorConfig::default());
///
/// registry.record_render_trigger(7, "Counter", &ReactiveChangeEvent::set("count", 1, 2));
/// let event = registry.finalize_render(7, "Counter").unwrap();
/// assert_eq!(event.triggers.len(), 1);
/// ```
pub struct RenderRegistry {
    state: RefCell<RegistryState>,
    paused: Cell<bool>,
    throttle: Option<TimeDelta>,
    resolver: Option<StoreResolver>,
    callback: RefCell<Option<RenderCallback>>,
    clock: Rc<dyn Clock>,
}

impl RenderRegistry {
    pub fn new(config: &InspectorConfig) -> Self {
        Self::with_clock(config, Rc::new(SystemClock))
    }

    pub fn with_clock(config: &InspectorConfig, clock: Rc<dyn Clock>) -> Self {
        let resolver = config.enable_store_tracking.then(|| {
            let resolver = StoreResolver::new();
            resolver.set_debug(config.debug_logging);
            resolver
        });
        Self {
            state: RefCell::new(RegistryState::default()),
            paused: Cell::new(config.pause_on_init),
            throttle: config.throttle(),
            resolver,
            callback: RefCell::new(None),
            clock,
        }
    }

    /// Install (or clear) the callback run for every emitted event.
    pub fn set_render_callback(&self, callback: Option<RenderCallback>) {
        *self.callback.borrow_mut() = callback;
    }

    /// The store resolver, when store tracking is enabled.
    pub fn resolver(&self) -> Option<&StoreResolver> {
        self.resolver.as_ref()
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Note that `component_id` read a dependency while rendering.
    pub fn record_tracked_dependency(
        &self,
        component_id: ComponentId,
        component_name: &str,
        event: &ReactiveChangeEvent,
    ) {
        if self.paused.get() {
            return;
        }
        let key = event
            .key
            .clone()
            .unwrap_or_else(|| PropertyKey::name(UNKNOWN_KEY));
        trace!(component = component_name, id = component_id, %key, "tracked");
        self.state
            .borrow_mut()
            .components
            .entry(component_id)
            .or_default()
            .tracked_keys
            .insert(key);
    }

    /// Classify a change that triggered a render of `component_id` and buffer it.
    pub fn record_render_trigger(
        &self,
        component_id: ComponentId,
        component_name: &str,
        event: &ReactiveChangeEvent,
    ) {
        if self.paused.get() {
            return;
        }
        let mut pending = classify(event);
        if let Some(resolver) = &self.resolver {
            attribute(resolver, &mut pending, event);
        }
        trace!(
            component = component_name,
            id = component_id,
            path = %pending.trigger().path,
            "trigger recorded"
        );
        self.state
            .borrow_mut()
            .components
            .entry(component_id)
            .or_default()
            .pending
            .push(pending);
    }

    // =========================================================================
    // Finalization
    // =========================================================================

    /// The render of `component_id` committed: build its event.
    ///
    /// Returns `None` while paused (buffers untouched) or when the render was
    /// held by throttling (buffers moved into the held render).
    pub fn finalize_render(
        &self,
        component_id: ComponentId,
        component_name: &str,
    ) -> Option<Rc<ComponentRenderEvent>> {
        if self.paused.get() {
            return None;
        }
        let now = self.clock.now();

        let (pending, tracked_keys) = {
            let mut state = self.state.borrow_mut();
            let component = state.components.entry(component_id).or_default();
            (
                mem::take(&mut component.pending),
                mem::take(&mut component.tracked_keys),
            )
        };

        // Deferred computations run host code; no borrow held.
        let triggers: Vec<Trigger> = pending.into_iter().map(PendingTrigger::finalize).collect();

        let event = {
            let mut state = self.state.borrow_mut();
            let is_initial_render = state.rendered.insert(component_id);
            let component = state.components.entry(component_id).or_default();

            let within_window = match (self.throttle, component.last_emit) {
                (Some(window), Some(last)) => now - last < window,
                _ => false,
            };
            if within_window {
                let held = component.held.get_or_insert_with(|| HeldRender {
                    component_name: component_name.to_string(),
                    triggers: Vec::new(),
                    tracked_keys: BTreeSet::new(),
                });
                held.triggers.extend(triggers);
                held.tracked_keys.extend(tracked_keys);
                debug!(
                    component = component_name,
                    id = component_id,
                    held = held.triggers.len(),
                    "render held by throttle"
                );
                return None;
            }

            let (triggers, tracked_keys) = match component.held.take() {
                Some(mut held) => {
                    held.triggers.extend(triggers);
                    held.tracked_keys.extend(tracked_keys);
                    (held.triggers, held.tracked_keys)
                }
                None => (triggers, tracked_keys),
            };

            state.emit(
                component_id,
                component_name.to_string(),
                triggers,
                tracked_keys,
                is_initial_render,
                now,
            )
        };

        self.after_emit(std::slice::from_ref(&event));
        Some(event)
    }

    /// Emit every held render whose throttle window has elapsed.
    pub fn flush_throttled(&self) -> Vec<Rc<ComponentRenderEvent>> {
        let Some(window) = self.throttle else {
            return Vec::new();
        };
        if self.paused.get() {
            return Vec::new();
        }
        let now = self.clock.now();

        let events: Vec<Rc<ComponentRenderEvent>> = {
            let mut state = self.state.borrow_mut();
            let mut due: Vec<(ComponentId, HeldRender)> = state
                .components
                .iter_mut()
                .filter(|(_, c)| c.last_emit.is_none_or(|last| now - last >= window))
                .filter_map(|(id, c)| c.held.take().map(|held| (*id, held)))
                .collect();
            due.sort_by_key(|(id, _)| *id);

            due.into_iter()
                .map(|(id, held)| {
                    let is_initial_render = state.rendered.insert(id);
                    state.emit(
                        id,
                        held.component_name,
                        held.triggers,
                        held.tracked_keys,
                        is_initial_render,
                        now,
                    )
                })
                .collect()
        };

        self.after_emit(&events);
        events
    }

    /// Commit-time work once the registry borrow is released.
    fn after_emit(&self, events: &[Rc<ComponentRenderEvent>]) {
        if events.is_empty() {
            return;
        }
        for event in events {
            debug!(
                component = %event.component_name,
                id = event.component_id,
                reason = ?event.rerender_reason,
                triggers = event.triggers.len(),
                render_count = event.render_count,
                "render emitted"
            );
        }
        let callback = self.callback.borrow().clone();
        if let Some(callback) = callback {
            for event in events {
                callback(event);
            }
        }
        // Consumers of this cycle have read their before/after pairs
        if let Some(resolver) = &self.resolver {
            resolver.snapshot_all_derived_values();
        }
    }

    // =========================================================================
    // Control
    // =========================================================================

    pub fn pause(&self) {
        if !self.paused.replace(true) {
            debug!("render tracking paused");
        }
    }

    pub fn resume(&self) {
        if self.paused.replace(false) {
            debug!("render tracking resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.get()
    }

    /// Clear history, buffers, statistics and first-render flags.
    pub fn reset(&self) {
        *self.state.borrow_mut() = RegistryState::default();
        if let Some(resolver) = &self.resolver {
            resolver.clear_scheduled();
        }
        debug!("render registry reset");
    }

    /// Release everything held for one destroyed component. Statistics stay.
    pub fn cleanup_component(&self, component_id: ComponentId) {
        let mut state = self.state.borrow_mut();
        state.components.remove(&component_id);
        state.rendered.remove(&component_id);
    }

    // =========================================================================
    // Stats and history
    // =========================================================================

    pub fn get_stats(&self) -> RenderStats {
        let state = self.state.borrow();
        let stats = &state.stats;

        let mut most_expensive: Vec<ComponentRenderTotal> = stats
            .renders_by_component
            .iter()
            .map(|(name, renders)| ComponentRenderTotal {
                name: name.clone(),
                renders: *renders,
            })
            .collect();
        most_expensive.sort_by(|a, b| b.renders.cmp(&a.renders).then_with(|| a.name.cmp(&b.name)));
        most_expensive.truncate(MOST_EXPENSIVE_LIMIT);

        RenderStats {
            total_renders: stats.total_renders,
            by_component: stats
                .renders_by_component
                .iter()
                .map(|(name, renders)| (name.clone(), *renders))
                .collect(),
            most_expensive,
            no_op_renders: stats.no_op_render_count,
        }
    }

    /// Emitted events, oldest first.
    pub fn history(&self) -> Vec<(HistoryKey, Rc<ComponentRenderEvent>)> {
        self.state.borrow().history.iter().cloned().collect()
    }

    /// Emitted events of one component, oldest first.
    pub fn history_for(&self, component_id: ComponentId) -> Vec<Rc<ComponentRenderEvent>> {
        self.state
            .borrow()
            .history
            .iter()
            .filter(|(key, _)| key.component_id == component_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    // =========================================================================
    // Stores
    // =========================================================================

    /// Register a store for attribution. False if tracking is off or the id is taken.
    pub fn register_store(&self, store: &Store) -> bool {
        match &self.resolver {
            Some(resolver) => resolver.register(store),
            None => {
                debug!(store = store.id(), "store tracking disabled; not registered");
                false
            }
        }
    }

    pub fn lookup_property(&self, handle: &ReactiveHandle) -> Option<StorePropertyInfo> {
        self.resolver.as_ref()?.lookup(handle)
    }
}

impl Default for RenderRegistry {
    fn default() -> Self {
        Self::new(&InspectorConfig::default())
    }
}

/// Upgrade a trigger to a store-attributed one when its handle resolves.
fn attribute(resolver: &StoreResolver, pending: &mut PendingTrigger, event: &ReactiveChangeEvent) {
    let info = pending
        .subject()
        .and_then(|handle| resolver.lookup_access(handle, event.key.as_ref()))
        .or_else(|| resolver.lookup_by_current_value(pending.probe_value(), event.kind));
    let Some(info) = info else {
        return;
    };

    let derived = (info.prop_kind == PropKind::Derived)
        .then(|| resolver.get_derived_value_with_previous(&info.store_id, &info.prop_name));
    pending.attribute_to_store(info, derived);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::host::{Computed, OperationKind, TrackedObject, Value, ValueCell};
    use crate::types::TriggerSource;
    use serde_json::json;

    fn registry() -> RenderRegistry {
        RenderRegistry::new(&InspectorConfig::default())
    }

    fn throttled(ms: u64) -> (RenderRegistry, Rc<ManualClock>) {
        let clock = Rc::new(ManualClock::default());
        let config = InspectorConfig {
            throttle_ms: ms,
            ..Default::default()
        };
        (RenderRegistry::with_clock(&config, clock.clone()), clock)
    }

    #[test]
    fn test_no_op_set_is_flagged() {
        let registry = registry();
        registry.record_render_trigger(1, "Counter", &ReactiveChangeEvent::set("count", 5, 5));
        let event = registry.finalize_render(1, "Counter").unwrap();

        assert_eq!(event.triggers.len(), 1);
        assert!(event.triggers[0].is_no_op);
        assert_eq!(registry.get_stats().no_op_renders, 1);
    }

    #[test]
    fn test_triggers_keep_call_order() {
        let registry = registry();
        registry.record_render_trigger(1, "Form", &ReactiveChangeEvent::set("first", 1, 2));
        registry.record_render_trigger(1, "Form", &ReactiveChangeEvent::set("second", "a", "b"));
        let event = registry.finalize_render(1, "Form").unwrap();

        let keys: Vec<_> = event.triggers.iter().map(|t| t.key.to_string()).collect();
        assert_eq!(keys, vec!["first", "second"]);
        assert_eq!(event.rerender_reason, RerenderReason::InternalState);
    }

    #[test]
    fn test_initial_render_flag() {
        let registry = registry();
        let first = registry.finalize_render(1, "App").unwrap();
        assert!(first.is_initial_render);
        assert_eq!(first.rerender_reason, RerenderReason::Initial);
        assert_eq!(first.render_count, 1);

        for n in 2..4 {
            let next = registry.finalize_render(1, "App").unwrap();
            assert!(!next.is_initial_render);
            assert_eq!(next.render_count, n);
        }
    }

    #[test]
    fn test_tracked_keys() {
        let registry = registry();
        registry.record_tracked_dependency(1, "List", &ReactiveChangeEvent::get("items"));
        registry.record_tracked_dependency(1, "List", &ReactiveChangeEvent::get("items"));
        registry.record_tracked_dependency(1, "List", &ReactiveChangeEvent::new(OperationKind::Iterate));
        let event = registry.finalize_render(1, "List").unwrap();

        assert_eq!(
            event.tracked_keys,
            BTreeSet::from([PropertyKey::from("items"), PropertyKey::from(UNKNOWN_KEY)])
        );
        // Buffers were cleared
        let next = registry.finalize_render(1, "List").unwrap();
        assert!(next.tracked_keys.is_empty());
    }

    #[test]
    fn test_pause_drops_recording_and_resume_restores() {
        let registry = registry();
        registry.record_render_trigger(1, "A", &ReactiveChangeEvent::set("before", 1, 2));
        registry.pause();
        registry.pause();
        assert!(registry.is_paused());

        registry.record_render_trigger(1, "A", &ReactiveChangeEvent::set("during", 1, 2));
        registry.record_tracked_dependency(1, "A", &ReactiveChangeEvent::get("during"));
        assert!(registry.finalize_render(1, "A").is_none());

        registry.resume();
        let event = registry.finalize_render(1, "A").unwrap();
        let keys: Vec<_> = event.triggers.iter().map(|t| t.key.to_string()).collect();
        // Recorded before the pause survives; nothing from the pause does
        assert_eq!(keys, vec!["before"]);
        assert!(event.tracked_keys.is_empty());
        assert_eq!(registry.get_stats().total_renders, 1);
    }

    #[test]
    fn test_pause_on_init() {
        let config = InspectorConfig {
            pause_on_init: true,
            ..Default::default()
        };
        let registry = RenderRegistry::new(&config);
        assert!(registry.finalize_render(1, "A").is_none());
        registry.resume();
        assert!(registry.finalize_render(1, "A").is_some());
    }

    #[test]
    fn test_stats_by_component() {
        let registry = registry();
        registry.finalize_render(1, "A");
        registry.finalize_render(1, "A");
        registry.finalize_render(2, "B");

        let stats = registry.get_stats();
        assert_eq!(stats.total_renders, 3);
        assert_eq!(stats.by_component.get("A"), Some(&2));
        assert_eq!(stats.by_component.get("B"), Some(&1));
        assert_eq!(stats.by_component.len(), 2);
        assert_eq!(stats.most_expensive[0].name, "A");
        assert_eq!(stats.most_expensive[1].name, "B");
    }

    #[test]
    fn test_most_expensive_is_capped() {
        let registry = registry();
        for i in 0..15u64 {
            for _ in 0..=i {
                registry.finalize_render(i, &format!("C{i:02}"));
            }
        }
        let stats = registry.get_stats();
        assert_eq!(stats.most_expensive.len(), MOST_EXPENSIVE_LIMIT);
        assert_eq!(stats.most_expensive[0].name, "C14");
        assert_eq!(stats.most_expensive[0].renders, 15);
    }

    #[test]
    fn test_reset() {
        let registry = registry();
        registry.record_render_trigger(1, "A", &ReactiveChangeEvent::set("x", 1, 1));
        registry.finalize_render(1, "A");
        registry.record_render_trigger(1, "A", &ReactiveChangeEvent::set("y", 1, 2));

        registry.reset();
        let stats = registry.get_stats();
        assert_eq!(stats.total_renders, 0);
        assert!(stats.by_component.is_empty());
        assert_eq!(stats.no_op_renders, 0);
        assert!(registry.history().is_empty());

        let event = registry.finalize_render(1, "A").unwrap();
        assert!(event.is_initial_render);
        assert!(event.triggers.is_empty());
    }

    #[test]
    fn test_cleanup_component_keeps_stats_and_others() {
        let registry = registry();
        registry.finalize_render(1, "A");
        registry.finalize_render(2, "B");
        registry.record_render_trigger(1, "A", &ReactiveChangeEvent::set("x", 1, 2));
        registry.record_render_trigger(2, "B", &ReactiveChangeEvent::set("y", 1, 2));

        registry.cleanup_component(1);
        assert_eq!(registry.get_stats().total_renders, 2);

        let a = registry.finalize_render(1, "A").unwrap();
        assert!(a.is_initial_render);
        assert!(a.triggers.is_empty());

        let b = registry.finalize_render(2, "B").unwrap();
        assert!(!b.is_initial_render);
        assert_eq!(b.triggers.len(), 1);
    }

    #[test]
    fn test_throttle_holds_and_prepends() {
        let (registry, clock) = throttled(100);
        assert!(registry.finalize_render(1, "A").is_some());

        clock.advance_ms(10);
        registry.record_tracked_dependency(1, "A", &ReactiveChangeEvent::get("first"));
        registry.record_render_trigger(1, "A", &ReactiveChangeEvent::set("held", 1, 2));
        assert!(registry.finalize_render(1, "A").is_none());

        clock.advance_ms(10);
        registry.record_tracked_dependency(1, "A", &ReactiveChangeEvent::get("second"));
        registry.record_render_trigger(1, "A", &ReactiveChangeEvent::set("held2", 1, 2));
        assert!(registry.finalize_render(1, "A").is_none());
        assert_eq!(registry.get_stats().total_renders, 1);

        clock.advance_ms(100);
        registry.record_tracked_dependency(1, "A", &ReactiveChangeEvent::get("third"));
        registry.record_tracked_dependency(1, "A", &ReactiveChangeEvent::get("first"));
        registry.record_render_trigger(1, "A", &ReactiveChangeEvent::set("now", 1, 2));
        let event = registry.finalize_render(1, "A").unwrap();
        let keys: Vec<_> = event.triggers.iter().map(|t| t.key.to_string()).collect();
        assert_eq!(keys, vec!["held", "held2", "now"]);
        assert_eq!(
            event.tracked_keys,
            BTreeSet::from([
                PropertyKey::from("first"),
                PropertyKey::from("second"),
                PropertyKey::from("third"),
            ])
        );
        assert_eq!(event.render_count, 2);
        assert_eq!(registry.get_stats().total_renders, 2);
    }

    #[test]
    fn test_oversized_throttle_holds_without_panicking() {
        let clock = Rc::new(ManualClock::default());
        let config = InspectorConfig {
            throttle_ms: u64::MAX,
            ..Default::default()
        };
        let registry = RenderRegistry::with_clock(&config, clock.clone());

        assert!(registry.finalize_render(1, "A").is_some());
        clock.advance_ms(1);
        assert!(registry.finalize_render(1, "A").is_none());
        assert!(registry.flush_throttled().is_empty());
        assert_eq!(registry.get_stats().total_renders, 1);
    }

    #[test]
    fn test_flush_throttled_emits_due_holds() {
        let (registry, clock) = throttled(50);
        registry.finalize_render(1, "A");
        registry.finalize_render(2, "B");

        clock.advance_ms(5);
        registry.record_render_trigger(1, "A", &ReactiveChangeEvent::set("x", 1, 2));
        assert!(registry.finalize_render(1, "A").is_none());
        assert!(registry.flush_throttled().is_empty());

        clock.advance_ms(50);
        let flushed = registry.flush_throttled();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].component_id, 1);
        assert_eq!(flushed[0].triggers.len(), 1);
        assert!(!flushed[0].is_initial_render);
        assert!(registry.flush_throttled().is_empty());
    }

    #[test]
    fn test_callback_sees_every_emission() {
        let registry = Rc::new(registry());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let reg = Rc::downgrade(&registry);
        registry.set_render_callback(Some(Rc::new(move |event: &ComponentRenderEvent| {
            // Re-entering the registry from the callback is allowed
            let total = reg.upgrade().map(|r| r.get_stats().total_renders).unwrap_or(0);
            sink.borrow_mut().push((event.component_name.clone(), total));
        })));

        registry.finalize_render(1, "A");
        registry.finalize_render(2, "B");
        assert_eq!(
            *seen.borrow(),
            vec![("A".to_string(), 1), ("B".to_string(), 2)]
        );
    }

    #[test]
    fn test_history_is_bounded() {
        let registry = registry();
        for i in 0..(HISTORY_LIMIT as u64 + 5) {
            registry.finalize_render(i, "Row");
        }
        let history = registry.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].0.component_id, 5);
        assert_eq!(registry.history_for(7).len(), 1);
    }

    #[test]
    fn test_external_input_reason() {
        let registry = registry();
        let props = TrackedObject::input(Value::from(json!({"label": "b"})));
        registry.record_render_trigger(
            1,
            "Button",
            &ReactiveChangeEvent::set("label", "a", "b").with_target(props),
        );
        let event = registry.finalize_render(1, "Button").unwrap();
        assert_eq!(event.rerender_reason, RerenderReason::ExternalInput);
    }

    #[test]
    fn test_store_disabled_by_default() {
        let registry = registry();
        assert!(registry.resolver().is_none());
        assert!(!registry.register_store(&Store::new("s")));
        assert_eq!(registry.lookup_property(&ValueCell::new(1).into()), None);
    }

    #[test]
    fn test_store_attribution() {
        let config = InspectorConfig {
            enable_store_tracking: true,
            ..Default::default()
        };
        let registry = RenderRegistry::new(&config);
        let count = ValueCell::new(1);
        let c = count.clone();
        let double = Computed::new(move || {
            Value::from(c.get().ok().and_then(|v| v.as_number()).unwrap_or(0.0) * 2.0)
        });
        let store = Store::new("counter")
            .with_state("count", count.clone())
            .with_derived("double", double.clone());
        assert!(registry.register_store(&store));

        count.set(2);
        double.invalidate();
        registry.record_render_trigger(
            1,
            "Counter",
            &ReactiveChangeEvent::set("value", 1, 2).with_target(count.clone()),
        );
        registry.record_render_trigger(
            1,
            "Counter",
            &ReactiveChangeEvent::new(OperationKind::Get).with_target(double.clone()),
        );
        let event = registry.finalize_render(1, "Counter").unwrap();

        assert_eq!(event.rerender_reason, RerenderReason::StoreChange);
        let state = &event.triggers[0];
        assert_eq!(state.source, TriggerSource::Store);
        assert_eq!(state.path, "counter.count");
        assert_eq!(state.store_prop_kind, Some(PropKind::State));

        let derived = &event.triggers[1];
        assert_eq!(derived.path, "counter.double");
        assert_eq!(derived.old_value, Value::from(2));
        assert_eq!(derived.new_value, Value::from(4));
        assert!(!derived.is_no_op);

        // Commit refreshed the snapshot
        let resolver = registry.resolver().unwrap();
        assert_eq!(resolver.snapshot_of("counter", "double"), Some(Value::from(4)));
    }

    fn tracking_with_counter(start: i32) -> (RenderRegistry, ValueCell) {
        let config = InspectorConfig {
            enable_store_tracking: true,
            ..Default::default()
        };
        let registry = RenderRegistry::new(&config);
        let count = ValueCell::new(start);
        let c = count.clone();
        let double = Computed::new(move || {
            Value::from(c.get().ok().and_then(|v| v.as_number()).unwrap_or(0.0) * 2.0)
        });
        let store = Store::new("counter")
            .with_state("count", count.clone())
            .with_derived("double", double);
        assert!(registry.register_store(&store));
        (registry, count)
    }

    #[test]
    fn test_get_without_handle_matches_derived_by_value() {
        let (registry, _count) = tracking_with_counter(3);

        registry.record_render_trigger(
            1,
            "Counter",
            &ReactiveChangeEvent::new(OperationKind::Get).with_new(6),
        );
        let event = registry.finalize_render(1, "Counter").unwrap();
        let t = &event.triggers[0];

        assert!(t.is_store_attributed());
        assert_eq!(t.source, TriggerSource::Store);
        assert_eq!(t.path, "counter.double");
        assert_eq!(t.store_prop_kind, Some(PropKind::Derived));
        assert_eq!(t.old_value, Value::from(6));
        assert_eq!(t.new_value, Value::from(6));
        assert!(t.is_no_op);
    }

    #[test]
    fn test_set_without_handle_is_never_matched_by_value() {
        let (registry, _count) = tracking_with_counter(3);

        registry.record_render_trigger(1, "Counter", &ReactiveChangeEvent::set("total", 6, 6));
        let event = registry.finalize_render(1, "Counter").unwrap();
        let t = &event.triggers[0];

        assert!(!t.is_store_attributed());
        assert_eq!(t.source, TriggerSource::Unknown);
        assert_eq!(t.path, "unknown.total");
        assert_eq!(event.rerender_reason, RerenderReason::InternalState);
    }

    #[test]
    fn test_callback_sees_previous_derived_snapshot() {
        let (registry, count) = tracking_with_counter(1);
        let registry = Rc::new(registry);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let reg = Rc::downgrade(&registry);
        registry.set_render_callback(Some(Rc::new(move |_: &ComponentRenderEvent| {
            if let Some(resolver) = reg.upgrade().as_deref().and_then(|r| r.resolver()) {
                let values = resolver.get_derived_value_with_previous("counter", "double");
                sink.borrow_mut().push((values.old_value, values.new_value));
            }
        })));

        count.set(2);
        registry.finalize_render(1, "Counter");
        count.set(5);
        registry.finalize_render(1, "Counter");

        assert_eq!(
            *seen.borrow(),
            vec![
                (Value::from(2), Value::from(4)),
                (Value::from(4), Value::from(10)),
            ]
        );
    }
}
