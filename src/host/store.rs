//! Named stores: a state container plus derived getters and actions.

use std::fmt;
use std::rc::Rc;

use super::handle::{Computed, TrackedObject};
use super::value::Value;

/// Store action. Actions are never tracked as data.
pub type Action = Rc<dyn Fn()>;

/// A named member exposed on the store itself (outside its state container).
#[derive(Clone)]
pub enum StoreMember {
    Value(Value),
    Derived(Computed),
    Action(Action),
}

impl fmt::Debug for StoreMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreMember::Value(v) => f.debug_tuple("Value").field(v).finish(),
            StoreMember::Derived(c) => f.debug_tuple("Derived").field(c).finish(),
            StoreMember::Action(_) => f.write_str("Action"),
        }
    }
}

/// A store handle as exposed by the host.
///
/// # Example
///
/// ```ignore
/// let count = ValueCell::new(0);
/// let c = count.clone();
/// let store = Store::new("counter")
///     .with_state("count", count)
///     .with_derived("double", Computed::new(move || {
///         Value::from(c.get().ok().and_then(|v| v.as_number()).unwrap_or(0.0) * 2.0)
///     }))
///     .with_action("increment", || {});
/// ```
#[derive(Clone, Debug)]
pub struct Store {
    id: String,
    state: TrackedObject,
    members: Vec<(String, StoreMember)>,
}

impl Store {
    /// New store with an empty state container.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_container(id, TrackedObject::wrap(Value::object::<String>([])))
    }

    /// New store around an existing state container.
    pub fn with_container(id: impl Into<String>, state: TrackedObject) -> Self {
        Self {
            id: id.into(),
            state,
            members: Vec::new(),
        }
    }

    /// Put an entry in the state container.
    pub fn with_state(self, name: &str, value: impl Into<Value>) -> Self {
        self.state.set(name, value);
        self
    }

    /// Expose a plain value member.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.members.push((name.into(), StoreMember::Value(value.into())));
        self
    }

    /// Expose a derived getter.
    pub fn with_derived(mut self, name: impl Into<String>, computed: Computed) -> Self {
        self.members.push((name.into(), StoreMember::Derived(computed)));
        self
    }

    pub fn with_action(mut self, name: impl Into<String>, action: impl Fn() + 'static) -> Self {
        self.members.push((name.into(), StoreMember::Action(Rc::new(action))));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &TrackedObject {
        &self.state
    }

    pub fn members(&self) -> &[(String, StoreMember)] {
        &self.members
    }

    pub fn action(&self, name: &str) -> Option<Action> {
        self.members.iter().find_map(|(n, m)| match m {
            StoreMember::Action(action) if n == name => Some(action.clone()),
            _ => None,
        })
    }

    /// Framework-internal member names (`$id`, `_p`, ...).
    pub fn is_internal(name: &str) -> bool {
        name.starts_with('$') || name.starts_with('_')
    }
}
