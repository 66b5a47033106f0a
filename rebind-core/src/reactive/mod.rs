//! Reactive Primitives
//!
//! This module implements the core reactive system: cells, refs, computed refs
//! and effects. These primitives form the foundation every binding in
//! [`crate::ui`] is built on.
//!
//! # Concepts
//!
//! ## Refs
//!
//! A [`Ref`] is a read-write handle to a [`SignalCell`]. When a ref is read
//! within a tracking context (such as a computed ref or effect), the cell
//! registers that context as a dependent. When the value changes, all
//! dependents re-run before `set` returns.
//!
//! ## Computed Refs
//!
//! A computed ref is a derived value that caches its result. It re-evaluates
//! only when one of its dependencies changes, and is exposed as a
//! [`DescReadonlyRef`].
//!
//! ## Effects
//!
//! An [`Effect`] is a side-effecting computation that runs whenever its
//! dependencies change. Effects push reactive state into UI elements.
//! `on` effects track an explicit list of refs instead of whatever they read.
//!
//! ## Scopes
//!
//! Every computed ref and effect is created through a [`ReactiveScope`], which
//! disposes them together.
//!
//! # Implementation Notes
//!
//! Dependencies are detected automatically through a thread-local tracking
//! context. When a cell is read, we check if there is an active tracking
//! context and, if so, register the dependency.

mod context;
mod effect;
mod memo;
mod refs;
mod runtime;
mod scheduler;
mod scope;
mod signal;
mod subscriber;

pub use context::ReactiveContext;
pub use effect::{Effect, EffectOptions, OnOptions};
pub use memo::{Computed, ComputedBuilder, ComputedOptions, DebugTrigger, TriggerEvent};
pub use refs::{
    is_ref, to_ref, to_value, AnyRef, DescReadonlyRef, IntoDeps, MaybeRef, ReadonlyRef, Ref,
};
pub use runtime::{Runtime, WeakRuntime};
pub use scope::{ReactiveScope, WeakScope};
pub use signal::{Comparison, RefValue, SignalCell};
pub use subscriber::{CellId, Priority, SubscriberId};

/// Run `f` without registering any reads with the surrounding computation.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _quiet = ReactiveContext::untracked();
    f()
}
