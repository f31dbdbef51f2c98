//! # render-probe
//!
//! Render-cause introspection for reactive component UIs.
//!
//! Hooks into a fine-grained reactive runtime and answers, for every
//! component render: what changed, where it lives, and whether the change
//! was a no-op.
//!
//! ## Architecture
//!
//! The host runtime reports raw notifications (`get`, `set`, `add`, ...)
//! against anonymous handles. The engine classifies each one, attributes it
//! to a registered store where possible, buffers it per component, and
//! emits one immutable event when the render commits:
//!
//! ```text
//! ReactiveChangeEvent → classify → PendingTrigger → finalize_render → ComponentRenderEvent
//!                                      ▲
//!                            StoreResolver (optional)
//! ```
//!
//! Everything is single-threaded and explicitly owned. Two registries never
//! share state.
//!
//! ## Modules
//!
//! - [`host`] - Handles, values and notifications as the host reports them
//! - [`engine`] - Equivalence, classifier, store resolver, render registry
//! - [`types`] - Triggers, render events, statistics
//! - [`config`] - Inspector configuration
//! - [`clock`] - Time source for timestamps and throttling

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{InspectorConfig, LogLevel};
pub use error::{ConfigError, ReadError};

pub use engine::{
    DerivedValues, HISTORY_LIMIT, HistoryKey, MOST_EXPENSIVE_LIMIT, PendingTrigger, RenderCallback,
    RenderRegistry, StoreResolver, classify, detect_no_op,
};

pub use host::{
    Computed, EffectHandle, HandleId, OperationKind, PropertyKey, ReactiveChangeEvent,
    ReactiveHandle, Shape, Store, StoreMember, TrackedObject, Value, ValueCell, View,
};
