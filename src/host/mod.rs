//! Host boundary - the shapes the host framework hands to the engine.
//!
//! The engine never creates reactivity of its own. Everything in here is the
//! vocabulary a host uses to describe what it is doing:
//! - [`Value`]: dynamically typed values with reference identity for composites
//! - [`ReactiveHandle`]: cells, computations, tracked objects, views
//! - [`EffectHandle`]: an effect and its dependency chain
//! - [`Store`]: a named container registered for property attribution
//! - [`ReactiveChangeEvent`]: one render-tracked / render-triggered notification

mod event;
mod handle;
mod store;
mod value;

pub use event::*;
pub use handle::*;
pub use store::*;
pub use value::*;
