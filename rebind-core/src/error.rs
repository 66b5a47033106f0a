//! Error Types
//!
//! Reads never fail. Writes propagate synchronously through the effect graph,
//! so anything that goes wrong inside a re-run (an element rejecting a
//! property, a cycle) comes back out of the `set` that caused it.

use thiserror::Error;

use crate::ui::ElementId;

/// Crate-wide result alias.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

/// Errors produced by the reactive runtime and the binding layer.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// Propagation nested deeper than the configured limit, or an effect kept
    /// invalidating itself.
    #[error("cyclic dependency: propagation reached depth {depth} (limit {limit})")]
    CyclicDependency { depth: usize, limit: usize },

    /// The wrapped UI element refused a write.
    #[error(transparent)]
    Element(#[from] ElementError),

    /// A bound value could not be turned into a property value, or an event
    /// payload did not have the expected shape.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Attempted to write through a read-only ref.
    #[error("ref `{desc}` is read-only")]
    ReadOnly { desc: String },

    /// The scope was disposed before the node could be created.
    #[error("reactive scope has been disposed")]
    ScopeDisposed,
}

/// Errors raised by a [`UiElement`](crate::ui::UiElement) implementation.
///
/// These are produced by the host framework and passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElementError {
    #[error("element {element} does not support property `{prop}`")]
    UnsupportedProperty { element: ElementId, prop: String },

    #[error("element {element} rejected value for `{prop}`: {reason}")]
    Rejected {
        element: ElementId,
        prop: String,
        reason: String,
    },
}
