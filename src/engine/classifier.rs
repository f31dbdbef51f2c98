//! Event classification - raw notification in, provisional trigger out.
//!
//! All handling of missing `target`/`key`/values lives in [`infer`]; nothing
//! downstream looks at the raw event again. Classification never fails: read
//! errors turn into sentinel strings and inference falls back to `Unknown`.
//!
//! Triggers are two-phase. A computation's new value is not read here (doing
//! so would force a lazy recomputation out of order); the trigger keeps the
//! computation and [`PendingTrigger::finalize`] reads it at commit time.

use tracing::trace;

use super::equivalence::detect_no_op;
use crate::host::{
    Computed, EffectHandle, OperationKind, PropertyKey, ReactiveChangeEvent, ReactiveHandle, Shape,
    Value,
};
use crate::types::{
    CHANGED_SENTINEL, CollectionIndex, DEPENDENCY_KEY, PENDING_SENTINEL, PropKind,
    StorePropertyInfo, Trigger, TriggerSource, UNKNOWN_KEY, unreadable,
};

/// Default key for handles that hold a single value.
const VALUE_KEY: &str = "value";

// =============================================================================
// PendingTrigger
// =============================================================================

/// Old/new pair of a derived store property.
#[derive(Debug, Clone, Default)]
pub struct DerivedValues {
    pub old_value: Value,
    pub new_value: Value,
}

/// A trigger that may still be waiting on a computation's new value.
#[derive(Debug, Clone)]
pub struct PendingTrigger {
    trigger: Trigger,
    subject: Option<ReactiveHandle>,
    deferred: Option<Computed>,
}

impl PendingTrigger {
    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// The handle classification was based on (target, or a dependency of the effect).
    pub fn subject(&self) -> Option<&ReactiveHandle> {
        self.subject.as_ref()
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    /// Best current value for value-identity matching: the new value unless
    /// it is still pending.
    pub fn probe_value(&self) -> &Value {
        if self.deferred.is_some() {
            &self.trigger.old_value
        } else {
            &self.trigger.new_value
        }
    }

    /// Rewrite as a store-attributed trigger.
    ///
    /// Derived properties take their old/new pair from the resolver's snapshot
    /// cache, which also settles any deferred read.
    pub fn attribute_to_store(&mut self, info: StorePropertyInfo, derived: Option<DerivedValues>) {
        let t = &mut self.trigger;
        t.source = TriggerSource::Store;
        t.key = PropertyKey::name(info.prop_name.clone());
        t.path = format!("{}.{}", info.store_id, info.prop_name);
        if let Some(values) = derived.filter(|_| info.prop_kind == PropKind::Derived) {
            t.old_value = values.old_value;
            t.new_value = values.new_value;
            self.deferred = None;
        }
        t.is_no_op = detect_no_op(&t.old_value, &t.new_value);
        t.store_id = Some(info.store_id);
        t.store_prop_name = Some(info.prop_name);
        t.store_prop_kind = Some(info.prop_kind);
    }

    /// Read any deferred computation and recompute the no-op flag.
    ///
    /// Only call once the render has committed; the computation is then forced.
    pub fn finalize(self) -> Trigger {
        let mut trigger = self.trigger;
        if let Some(computed) = self.deferred {
            trigger.new_value = computed.get().unwrap_or_else(|err| unreadable(&err));
            trigger.is_no_op = detect_no_op(&trigger.old_value, &trigger.new_value);
        }
        trigger
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Classify one raw notification. Never fails.
pub fn classify(event: &ReactiveChangeEvent) -> PendingTrigger {
    let inference = infer(event);

    let kind = inference.kind.unwrap_or(event.kind);
    let key = inference
        .key
        .or_else(|| event.key.clone())
        .unwrap_or_else(|| PropertyKey::name(inference.default_key));

    let collection_index = match kind {
        OperationKind::Add | OperationKind::Delete => Some(CollectionIndex::from_key(&key)),
        OperationKind::Set => key.as_index().map(CollectionIndex::Position),
        _ => None,
    };

    let is_no_op = detect_no_op(&inference.old_value, &inference.new_value);
    let path = format!("{}.{}", inference.owner, key);
    trace!(%path, ?kind, source = ?inference.source, is_no_op, "classified");

    PendingTrigger {
        trigger: Trigger {
            key,
            kind,
            old_value: inference.old_value,
            new_value: inference.new_value,
            is_no_op,
            source: inference.source,
            path,
            store_id: None,
            store_prop_name: None,
            store_prop_kind: None,
            collection_index,
        },
        subject: inference.subject,
        deferred: inference.deferred,
    }
}

/// What could be recovered from an event.
struct Inference {
    source: TriggerSource,
    owner: &'static str,
    default_key: &'static str,
    /// Forced key/kind, for the graph fallback.
    key: Option<PropertyKey>,
    kind: Option<OperationKind>,
    old_value: Value,
    new_value: Value,
    subject: Option<ReactiveHandle>,
    deferred: Option<Computed>,
}

impl Inference {
    fn unknown(event: &ReactiveChangeEvent) -> Self {
        Self {
            source: TriggerSource::Unknown,
            owner: TriggerSource::Unknown.owner_label(),
            default_key: UNKNOWN_KEY,
            key: None,
            kind: None,
            old_value: event.old_value.clone().unwrap_or_default(),
            new_value: event.new_value.clone().unwrap_or_default(),
            subject: None,
            deferred: None,
        }
    }

    fn dependency_changed() -> Self {
        Self {
            source: TriggerSource::DerivedComputation,
            owner: "effect",
            default_key: DEPENDENCY_KEY,
            key: Some(PropertyKey::name(DEPENDENCY_KEY)),
            kind: Some(OperationKind::Change),
            old_value: Value::Undefined,
            new_value: Value::str(CHANGED_SENTINEL),
            subject: None,
            deferred: None,
        }
    }
}

fn infer(event: &ReactiveChangeEvent) -> Inference {
    match (&event.target, &event.effect) {
        (Some(target), _) => infer_from_handle(target, event),
        (None, Some(effect)) => infer_from_effect(effect, event),
        (None, None) => Inference::unknown(event),
    }
}

/// Target absent: use the first dependency that is a cell, view or computation.
fn infer_from_effect(effect: &EffectHandle, event: &ReactiveChangeEvent) -> Inference {
    effect
        .deps()
        .iter()
        .find(|dep| dep.shape().intersects(Shape::BACKING_VALUE | Shape::COMPUTATION))
        .map(|dep| infer_from_handle(dep, event))
        .unwrap_or_else(Inference::dependency_changed)
}

fn infer_from_handle(handle: &ReactiveHandle, event: &ReactiveChangeEvent) -> Inference {
    let shape = handle.shape();

    if shape.contains(Shape::COMPUTATION) {
        if let Some(computed) = handle.as_computed() {
            return infer_computation(handle, computed, event);
        }
    }

    if shape.contains(Shape::BACKING_VALUE) {
        // A direct cell has settled by the time it notifies.
        let current = || match handle.backing_value() {
            Some(Ok(value)) => value,
            Some(Err(err)) => unreadable(&err),
            None => Value::Undefined,
        };
        let old_value = event.old_value.clone().unwrap_or_else(current);
        let new_value = event.new_value.clone().unwrap_or_else(current);
        return Inference {
            source: TriggerSource::DirectValue,
            owner: TriggerSource::DirectValue.owner_label(),
            default_key: VALUE_KEY,
            key: None,
            kind: None,
            old_value,
            new_value,
            subject: Some(handle.clone()),
            deferred: None,
        };
    }

    if shape.contains(Shape::COMPOSITE) {
        let source = if shape.contains(Shape::EXTERNAL_INPUT) {
            TriggerSource::ExternalInput
        } else {
            TriggerSource::TrackedObject
        };
        let new_value = match (&event.new_value, &event.key, handle.as_object()) {
            (Some(value), _, _) => value.clone(),
            (None, Some(key), Some(object)) => object.get(key.as_str()),
            _ => Value::Undefined,
        };
        return Inference {
            source,
            owner: source.owner_label(),
            default_key: UNKNOWN_KEY,
            key: None,
            kind: None,
            old_value: event.old_value.clone().unwrap_or_default(),
            new_value,
            subject: Some(handle.clone()),
            deferred: None,
        };
    }

    Inference::unknown(event)
}

fn infer_computation(
    handle: &ReactiveHandle,
    computed: &Computed,
    event: &ReactiveChangeEvent,
) -> Inference {
    let old_value = event.old_value.clone().unwrap_or_else(|| match computed.peek_cached() {
        Ok(cached) => cached.unwrap_or_default(),
        Err(err) => unreadable(&err),
    });
    let (new_value, deferred) = match &event.new_value {
        Some(value) => (value.clone(), None),
        None => (Value::str(PENDING_SENTINEL), Some(computed.clone())),
    };
    Inference {
        source: TriggerSource::DerivedComputation,
        owner: TriggerSource::DerivedComputation.owner_label(),
        default_key: VALUE_KEY,
        key: None,
        kind: None,
        old_value,
        new_value,
        subject: Some(handle.clone()),
        deferred,
    }
}
