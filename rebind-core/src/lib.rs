//! Rebind Core
//!
//! This crate provides a reactive binding layer for retained-mode UI
//! elements. It implements:
//!
//! - Reactive primitives (refs, computed refs, effects, scopes)
//! - Synchronous, priority-ordered change propagation
//! - Bindable element adapters that push ref values into element properties
//! - Refreshable views that re-render when their inputs change
//!
//! The element layer itself is abstract: anything implementing
//! [`ui::UiElement`] can be bound.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `ui`: Element trait, binding adapters and event payloads
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use rebind_core::ReactiveScope;
//!
//! let scope = ReactiveScope::new();
//!
//! // Create a ref
//! let count = scope.create_ref(0);
//!
//! // Create a derived value
//! let doubled = {
//!     let count = count.clone();
//!     scope.ref_computed(move || count.get() * 2).unwrap()
//! };
//!
//! // Create an effect
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! {
//!     let seen = seen.clone();
//!     scope.effect(move || seen.borrow_mut().push(doubled.get())).unwrap();
//! }
//!
//! // Update the ref; the effect has re-run when `set` returns
//! count.set(5).unwrap();
//! assert_eq!(*seen.borrow(), vec![0, 10]);
//! ```

pub mod reactive;
pub mod ui;

mod config;
mod error;

pub use config::RuntimeConfig;
pub use error::{ElementError, ReactiveError, Result};
pub use reactive::{
    to_ref, to_value, untrack, DescReadonlyRef, Effect, MaybeRef, ReactiveScope, ReadonlyRef, Ref,
};
pub use ui::{BindableUi, Chart, EffectRefreshable, SingleValueBindableUi, UiElement};
