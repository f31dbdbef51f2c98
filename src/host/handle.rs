//! Reactive handles - the opaque objects the host uses to track values.
//!
//! Four shapes exist:
//! - [`ValueCell`]: one mutable backing value
//! - [`Computed`]: a memoized computation with a cached value
//! - [`TrackedObject`]: a wrapper around a raw array/object with its own identity
//! - [`View`]: a key on a source object, read through a back-pointer
//!
//! Handles are cheap to clone (`Rc`). Identity is pointer identity and stays
//! stable for as long as any clone is alive.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use super::value::Value;
use crate::error::ReadError;

// =============================================================================
// Identity and shape
// =============================================================================

/// Pointer identity of a handle or composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(usize);

impl HandleId {
    pub(crate) fn of<T: ?Sized>(rc: &Rc<T>) -> Self {
        HandleId(Rc::as_ptr(rc) as *const () as usize)
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

bitflags! {
    /// Runtime shape of a handle, as seen by the classifier.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Shape: u8 {
        /// Holds (or reads through to) a settled value.
        const BACKING_VALUE = 1 << 0;
        /// Has an attached computation function.
        const COMPUTATION = 1 << 1;
        /// Wraps a multi-property composite.
        const COMPOSITE = 1 << 2;
        /// Carries a back-pointer to a source object and key.
        const VIEW = 1 << 3;
        /// Marked by the host as a component's external input.
        const EXTERNAL_INPUT = 1 << 4;
    }
}

// =============================================================================
// ValueCell
// =============================================================================

struct CellInner {
    value: RefCell<Value>,
    disposed: Cell<bool>,
}

/// Direct value cell.
#[derive(Clone)]
pub struct ValueCell(Rc<CellInner>);

impl ValueCell {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(Rc::new(CellInner {
            value: RefCell::new(value.into()),
            disposed: Cell::new(false),
        }))
    }

    pub fn id(&self) -> HandleId {
        HandleId::of(&self.0)
    }

    pub fn get(&self) -> Result<Value, ReadError> {
        if self.0.disposed.get() {
            return Err(ReadError::Disposed);
        }
        self.0
            .value
            .try_borrow()
            .map(|v| v.clone())
            .map_err(|_| ReadError::Busy)
    }

    pub fn set(&self, value: impl Into<Value>) {
        *self.0.value.borrow_mut() = value.into();
    }

    /// Mark the cell disposed. Later reads fail.
    pub fn dispose(&self) {
        self.0.disposed.set(true);
    }
}

// =============================================================================
// Computed
// =============================================================================

type Getter = Box<dyn Fn() -> Result<Value, ReadError>>;

struct ComputedInner {
    getter: Getter,
    cached: RefCell<Option<Value>>,
    dirty: Cell<bool>,
    evaluations: Cell<u64>,
}

/// Memoized derived computation.
///
/// Starts dirty; the first [`get`](Computed::get) evaluates the getter.
#[derive(Clone)]
pub struct Computed(Rc<ComputedInner>);

impl Computed {
    pub fn new(getter: impl Fn() -> Value + 'static) -> Self {
        Self::fallible(move || Ok(getter()))
    }

    /// Computation whose getter can fail.
    pub fn fallible(getter: impl Fn() -> Result<Value, ReadError> + 'static) -> Self {
        Self(Rc::new(ComputedInner {
            getter: Box::new(getter),
            cached: RefCell::new(None),
            dirty: Cell::new(true),
            evaluations: Cell::new(0),
        }))
    }

    pub fn id(&self) -> HandleId {
        HandleId::of(&self.0)
    }

    /// The cached value without evaluating. `None` if never evaluated.
    pub fn peek_cached(&self) -> Result<Option<Value>, ReadError> {
        self.0
            .cached
            .try_borrow()
            .map(|v| v.clone())
            .map_err(|_| ReadError::Busy)
    }

    /// Memoized read: evaluates only when dirty.
    pub fn get(&self) -> Result<Value, ReadError> {
        if !self.0.dirty.get() {
            if let Some(value) = self.peek_cached()? {
                return Ok(value);
            }
        }
        self.recompute()
    }

    /// Evaluate the getter unconditionally and refresh the cache.
    pub fn recompute(&self) -> Result<Value, ReadError> {
        self.0.evaluations.set(self.0.evaluations.get() + 1);
        let value = (self.0.getter)()?;
        let mut cached = self.0.cached.try_borrow_mut().map_err(|_| ReadError::Busy)?;
        *cached = Some(value.clone());
        self.0.dirty.set(false);
        Ok(value)
    }

    /// Mark the cached value stale (a dependency changed).
    pub fn invalidate(&self) {
        self.0.dirty.set(true);
    }

    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    /// How many times the getter has run.
    pub fn evaluation_count(&self) -> u64 {
        self.0.evaluations.get()
    }
}

// =============================================================================
// TrackedObject
// =============================================================================

struct TrackedInner {
    raw: Value,
    external_input: bool,
}

/// Wrapper around a raw array or object.
///
/// Two wrappers of the same raw value have different identities.
#[derive(Clone)]
pub struct TrackedObject(Rc<TrackedInner>);

impl TrackedObject {
    /// Wrap `raw`. Existing wrappers are unwrapped first, so wrappers never nest.
    pub fn wrap(raw: impl Into<Value>) -> Self {
        Self::build(raw.into(), false)
    }

    /// Wrap `raw` as a component's external input (props).
    pub fn input(raw: impl Into<Value>) -> Self {
        Self::build(raw.into(), true)
    }

    fn build(raw: Value, external_input: bool) -> Self {
        Self(Rc::new(TrackedInner {
            raw: raw.unwrap_raw(),
            external_input,
        }))
    }

    pub fn id(&self) -> HandleId {
        HandleId::of(&self.0)
    }

    pub fn raw(&self) -> &Value {
        &self.0.raw
    }

    pub fn is_external_input(&self) -> bool {
        self.0.external_input
    }

    pub fn get(&self, key: &str) -> Value {
        self.0.raw.get_property(key)
    }

    /// Write `key` on the raw object (or array slot).
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        match &self.0.raw {
            Value::Object(map) => {
                map.borrow_mut().insert(key.to_string(), value);
            }
            Value::Array(items) => {
                if let Ok(index) = key.parse::<usize>() {
                    let mut items = items.borrow_mut();
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                }
            }
            _ => {}
        }
    }

    /// Key/value pairs of an object, or index/value pairs of an array.
    pub fn entries(&self) -> Vec<(String, Value)> {
        match &self.0.raw {
            Value::Object(map) => map
                .try_borrow()
                .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default(),
            Value::Array(items) => items
                .try_borrow()
                .map(|v| {
                    v.iter()
                        .enumerate()
                        .map(|(i, item)| (i.to_string(), item.clone()))
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

// =============================================================================
// View
// =============================================================================

struct ViewInner {
    source: Value,
    key: String,
}

/// A single key of a source object, exposed as its own handle.
#[derive(Clone)]
pub struct View(Rc<ViewInner>);

impl View {
    pub fn new(source: impl Into<Value>, key: impl Into<String>) -> Self {
        Self(Rc::new(ViewInner {
            source: source.into(),
            key: key.into(),
        }))
    }

    pub fn id(&self) -> HandleId {
        HandleId::of(&self.0)
    }

    pub fn source(&self) -> &Value {
        &self.0.source
    }

    pub fn key(&self) -> &str {
        &self.0.key
    }

    /// Current value at `source[key]`, reading through a cell if one is stored there.
    pub fn get(&self) -> Result<Value, ReadError> {
        match self.0.source.get_property(&self.0.key) {
            Value::Handle(ReactiveHandle::Cell(cell)) => cell.get(),
            other => Ok(other),
        }
    }
}

// =============================================================================
// ReactiveHandle
// =============================================================================

#[derive(Clone)]
pub enum ReactiveHandle {
    Cell(ValueCell),
    Computed(Computed),
    Object(TrackedObject),
    View(View),
}

impl ReactiveHandle {
    pub fn id(&self) -> HandleId {
        match self {
            ReactiveHandle::Cell(c) => c.id(),
            ReactiveHandle::Computed(c) => c.id(),
            ReactiveHandle::Object(o) => o.id(),
            ReactiveHandle::View(v) => v.id(),
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            ReactiveHandle::Cell(_) => Shape::BACKING_VALUE,
            ReactiveHandle::Computed(_) => Shape::BACKING_VALUE | Shape::COMPUTATION,
            ReactiveHandle::Object(o) if o.is_external_input() => {
                Shape::COMPOSITE | Shape::EXTERNAL_INPUT
            }
            ReactiveHandle::Object(_) => Shape::COMPOSITE,
            ReactiveHandle::View(_) => Shape::BACKING_VALUE | Shape::VIEW,
        }
    }

    /// Identity of the raw value under a wrapper, if this handle wraps one.
    pub fn raw_identity(&self) -> Option<HandleId> {
        match self {
            ReactiveHandle::Object(o) => o.raw().identity(),
            _ => None,
        }
    }

    /// Settled value of a cell or view.
    pub fn backing_value(&self) -> Option<Result<Value, ReadError>> {
        match self {
            ReactiveHandle::Cell(c) => Some(c.get()),
            ReactiveHandle::View(v) => Some(v.get()),
            _ => None,
        }
    }

    pub fn as_computed(&self) -> Option<&Computed> {
        match self {
            ReactiveHandle::Computed(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&TrackedObject> {
        match self {
            ReactiveHandle::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_view(&self) -> Option<&View> {
        match self {
            ReactiveHandle::View(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for ReactiveHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for ReactiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ReactiveHandle::Cell(_) => "Cell",
            ReactiveHandle::Computed(_) => "Computed",
            ReactiveHandle::Object(_) => "Object",
            ReactiveHandle::View(_) => "View",
        };
        write!(f, "{kind}@{}", self.id())
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Computed@{}", self.id())
    }
}

impl fmt::Debug for TrackedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object@{}", self.id())
    }
}

impl From<ValueCell> for ReactiveHandle {
    fn from(value: ValueCell) -> Self {
        ReactiveHandle::Cell(value)
    }
}

impl From<Computed> for ReactiveHandle {
    fn from(value: Computed) -> Self {
        ReactiveHandle::Computed(value)
    }
}

impl From<TrackedObject> for ReactiveHandle {
    fn from(value: TrackedObject) -> Self {
        ReactiveHandle::Object(value)
    }
}

impl From<View> for ReactiveHandle {
    fn from(value: View) -> Self {
        ReactiveHandle::View(value)
    }
}

impl From<ValueCell> for Value {
    fn from(value: ValueCell) -> Self {
        Value::Handle(value.into())
    }
}

impl From<Computed> for Value {
    fn from(value: Computed) -> Self {
        Value::Handle(value.into())
    }
}

impl From<TrackedObject> for Value {
    fn from(value: TrackedObject) -> Self {
        Value::Handle(value.into())
    }
}

impl From<View> for Value {
    fn from(value: View) -> Self {
        Value::Handle(value.into())
    }
}

// =============================================================================
// Effects
// =============================================================================

/// An effect (e.g. a component's render effect) and its dependency chain.
#[derive(Clone, Default)]
pub struct EffectHandle(Rc<RefCell<Vec<ReactiveHandle>>>);

impl EffectHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deps(deps: impl IntoIterator<Item = ReactiveHandle>) -> Self {
        Self(Rc::new(RefCell::new(deps.into_iter().collect())))
    }

    /// Append a dependency to the chain.
    pub fn track(&self, dep: impl Into<ReactiveHandle>) {
        self.0.borrow_mut().push(dep.into());
    }

    /// Dependencies in tracking order.
    pub fn deps(&self) -> Vec<ReactiveHandle> {
        self.0.try_borrow().map(|d| d.clone()).unwrap_or_default()
    }
}

impl fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Effect@{}", HandleId::of(&self.0))
    }
}
