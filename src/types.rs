//! Core types for render-probe.
//!
//! These are the records the engine produces: classified triggers, finalized
//! render events, and aggregate statistics.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReadError;
use crate::host::{OperationKind, PropertyKey, Value};

/// Host-assigned identity of a component instance.
pub type ComponentId = u64;

// =============================================================================
// Sentinels
// =============================================================================

/// New value of a computation whose result has not been read yet.
pub const PENDING_SENTINEL: &str = "[pending]";

/// New value when only a qualitative "something changed" signal exists.
pub const CHANGED_SENTINEL: &str = "[changed]";

/// Key used when a notification came from a dependency graph with nothing usable.
pub const DEPENDENCY_KEY: &str = "dependency";

/// Key used when nothing better is known.
pub const UNKNOWN_KEY: &str = "unknown";

/// Diagnostic value standing in for a read that failed.
pub fn unreadable(err: &ReadError) -> Value {
    Value::str(format!("[unreadable: {err}]"))
}

// =============================================================================
// Provenance
// =============================================================================

/// Where a trigger came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerSource {
    DirectValue,
    DerivedComputation,
    TrackedObject,
    Store,
    ExternalInput,
    Unknown,
}

impl TriggerSource {
    /// Owner label used as the first segment of a trigger path.
    pub fn owner_label(self) -> &'static str {
        match self {
            TriggerSource::DirectValue => "cell",
            TriggerSource::DerivedComputation => "computed",
            TriggerSource::TrackedObject => "object",
            TriggerSource::Store => "store",
            TriggerSource::ExternalInput => "props",
            TriggerSource::Unknown => "unknown",
        }
    }
}

/// Kind of a store property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropKind {
    State,
    Derived,
    Action,
}

impl fmt::Display for PropKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropKind::State => f.write_str("state"),
            PropKind::Derived => f.write_str("derived"),
            PropKind::Action => f.write_str("action"),
        }
    }
}

/// A store property, resolved from an anonymous handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorePropertyInfo {
    pub store_id: String,
    pub prop_name: String,
    pub prop_kind: PropKind,
}

impl StorePropertyInfo {
    pub fn new(store_id: impl Into<String>, prop_name: impl Into<String>, prop_kind: PropKind) -> Self {
        Self {
            store_id: store_id.into(),
            prop_name: prop_name.into(),
            prop_kind,
        }
    }

    /// Snapshot-cache key, `"storeId.prop"`.
    pub fn cache_key(&self) -> String {
        format!("{}.{}", self.store_id, self.prop_name)
    }
}

/// Position or key of an indexed collection mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionIndex {
    Position(u64),
    Key(String),
}

impl CollectionIndex {
    pub fn from_key(key: &PropertyKey) -> Self {
        match key.as_index() {
            Some(position) => CollectionIndex::Position(position),
            None => CollectionIndex::Key(key.to_string()),
        }
    }
}

impl fmt::Display for CollectionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionIndex::Position(p) => write!(f, "{p}"),
            CollectionIndex::Key(k) => f.write_str(k),
        }
    }
}

// =============================================================================
// Trigger
// =============================================================================

/// A classified change that caused (or accompanied) a render.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub key: PropertyKey,
    pub kind: OperationKind,
    pub old_value: Value,
    pub new_value: Value,
    pub is_no_op: bool,
    pub source: TriggerSource,
    /// Dotted locator, `"<owner>.<key>"`.
    pub path: String,
    pub store_id: Option<String>,
    pub store_prop_name: Option<String>,
    pub store_prop_kind: Option<PropKind>,
    pub collection_index: Option<CollectionIndex>,
}

impl Trigger {
    pub fn is_store_attributed(&self) -> bool {
        self.store_id.is_some()
    }
}

// =============================================================================
// ComponentRenderEvent
// =============================================================================

/// Why a component rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RerenderReason {
    Initial,
    ExternalInput,
    InternalState,
    StoreChange,
}

impl RerenderReason {
    /// Store changes win over external input, which wins over internal state.
    pub fn from_triggers(triggers: &[Trigger]) -> Self {
        if triggers.is_empty() {
            RerenderReason::Initial
        } else if triggers.iter().any(|t| t.source == TriggerSource::Store) {
            RerenderReason::StoreChange
        } else if triggers.iter().any(|t| t.source == TriggerSource::ExternalInput) {
            RerenderReason::ExternalInput
        } else {
            RerenderReason::InternalState
        }
    }
}

/// One completed render of one component. Immutable once emitted.
#[derive(Debug, Clone)]
pub struct ComponentRenderEvent {
    pub component_name: String,
    pub component_id: ComponentId,
    pub timestamp: DateTime<Utc>,
    pub triggers: Vec<Trigger>,
    pub tracked_keys: BTreeSet<PropertyKey>,
    pub is_initial_render: bool,
    pub rerender_reason: RerenderReason,
    pub render_count: u64,
}

impl ComponentRenderEvent {
    pub fn has_no_op(&self) -> bool {
        self.triggers.iter().any(|t| t.is_no_op)
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Render count of one component name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRenderTotal {
    pub name: String,
    pub renders: u64,
}

/// Snapshot returned by `RenderRegistry::get_stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderStats {
    pub total_renders: u64,
    pub by_component: BTreeMap<String, u64>,
    /// Top components by render count, highest first.
    pub most_expensive: Vec<ComponentRenderTotal>,
    pub no_op_renders: u64,
}
