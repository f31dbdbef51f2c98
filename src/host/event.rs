//! Raw change notifications as delivered by the host's render hooks.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::handle::{EffectHandle, ReactiveHandle};
use super::value::Value;

/// What the access or mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Get,
    Has,
    Iterate,
    Set,
    Add,
    Delete,
    Clear,
    Change,
}

impl OperationKind {
    /// True for the write-side operations.
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            OperationKind::Set
                | OperationKind::Add
                | OperationKind::Delete
                | OperationKind::Clear
                | OperationKind::Change
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Get => "get",
            OperationKind::Has => "has",
            OperationKind::Iterate => "iterate",
            OperationKind::Set => "set",
            OperationKind::Add => "add",
            OperationKind::Delete => "delete",
            OperationKind::Clear => "clear",
            OperationKind::Change => "change",
        };
        f.write_str(s)
    }
}

// =============================================================================
// PropertyKey
// =============================================================================

/// A property key: a plain name or a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyKey {
    Name(String),
    Symbol(String),
}

impl PropertyKey {
    pub fn name(name: impl Into<String>) -> Self {
        PropertyKey::Name(name.into())
    }

    pub fn symbol(description: impl Into<String>) -> Self {
        PropertyKey::Symbol(description.into())
    }

    /// The raw name or symbol description.
    pub fn as_str(&self) -> &str {
        match self {
            PropertyKey::Name(s) | PropertyKey::Symbol(s) => s,
        }
    }

    /// The key as a non-negative integer literal (`"0"`, `"12"`; not `"01"`).
    pub fn as_index(&self) -> Option<u64> {
        let PropertyKey::Name(name) = self else {
            return None;
        };
        let index: u64 = name.parse().ok()?;
        (index.to_string() == *name).then_some(index)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Name(s) => f.write_str(s),
            PropertyKey::Symbol(s) => write!(f, "Symbol({s})"),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(value: &str) -> Self {
        PropertyKey::Name(value.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(value: String) -> Self {
        PropertyKey::Name(value)
    }
}

impl From<usize> for PropertyKey {
    fn from(value: usize) -> Self {
        PropertyKey::Name(value.to_string())
    }
}

// =============================================================================
// ReactiveChangeEvent
// =============================================================================

/// One dependency access or mutation, as reported by the host.
///
/// Every field but `kind` may be missing; values are `None` when the host
/// did not supply them (as opposed to supplying `Value::Undefined`).
#[derive(Debug, Clone)]
pub struct ReactiveChangeEvent {
    pub effect: Option<EffectHandle>,
    pub target: Option<ReactiveHandle>,
    pub kind: OperationKind,
    pub key: Option<PropertyKey>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl ReactiveChangeEvent {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            effect: None,
            target: None,
            kind,
            key: None,
            old_value: None,
            new_value: None,
        }
    }

    /// A `set` of `key` from `old` to `new`, without a target.
    pub fn set(key: impl Into<PropertyKey>, old: impl Into<Value>, new: impl Into<Value>) -> Self {
        Self::new(OperationKind::Set)
            .with_key(key)
            .with_old(old)
            .with_new(new)
    }

    /// A `get` of `key`, without a target.
    pub fn get(key: impl Into<PropertyKey>) -> Self {
        Self::new(OperationKind::Get).with_key(key)
    }

    pub fn with_target(mut self, target: impl Into<ReactiveHandle>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_effect(mut self, effect: EffectHandle) -> Self {
        self.effect = Some(effect);
        self
    }

    pub fn with_key(mut self, key: impl Into<PropertyKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_old(mut self, value: impl Into<Value>) -> Self {
        self.old_value = Some(value.into());
        self
    }

    pub fn with_new(mut self, value: impl Into<Value>) -> Self {
        self.new_value = Some(value.into());
        self
    }
}
