//! Introspection engine.
//!
//! Four parts, leaf first:
//! - Equivalence: is a change a no-op?
//! - Classifier: raw notification to provisional trigger
//! - Resolver: anonymous handle to store property
//! - Registry: per-component buffers, finalization, stats
//!
//! # Render cycle
//!
//! ```text
//! host notification ─► classify ─► (resolver attribution) ─► pending buffer
//!                                                              │
//! host commit ─────────────────────────► finalize_render ◄─────┘
//!                                          │
//!                                          ├─► ComponentRenderEvent ─► callback
//!                                          └─► derived snapshot refresh
//! ```

mod classifier;
mod equivalence;
mod registry;
mod resolver;

pub use classifier::*;
pub use equivalence::*;
pub use registry::*;
pub use resolver::*;
