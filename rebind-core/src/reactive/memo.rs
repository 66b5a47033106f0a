//! Computed Refs
//!
//! A computed ref is a cached derived value that re-evaluates only when one of
//! the cells it read changes.
//!
//! # How Computed Refs Work
//!
//! 1. On creation, the function runs once under tracking and the result is
//!    cached.
//!
//! 2. Reads return the cached value while it is clean.
//!
//! 3. When a dependency changes, the node is marked dirty and the change is
//!    forwarded to the computed ref's own readers.
//!
//! 4. During propagation a dirty computed ref with readers recomputes in
//!    priority order. One without readers stays dirty until it is read.
//!
//! Either way the function runs at most once per change.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{error, trace};

use super::context::ReactiveContext;
use super::refs::{DescReadonlyRef, ReadonlyRef};
use super::runtime::{Reactive, WeakRuntime};
use super::scope::ReactiveScope;
use super::subscriber::{CellId, Priority, SubscriberId};
use crate::error::Result;

/// Passed to a computed ref's debug trigger on every recomputation.
#[derive(Debug, Clone, Copy)]
pub struct TriggerEvent<'a> {
    pub subscriber: SubscriberId,
    pub desc: &'a str,
    /// Number of runs including this one.
    pub run_count: usize,
}

/// Diagnostic observer of recomputations.
pub type DebugTrigger = Rc<dyn Fn(&TriggerEvent<'_>)>;

/// Options accepted by [`ComputedBuilder`].
#[derive(Clone, Default)]
pub struct ComputedOptions {
    pub desc: String,
    pub debug_trigger: Option<DebugTrigger>,
    /// Defaults to the runtime's `default_priority_level`.
    pub priority_level: Option<i32>,
}

impl fmt::Debug for ComputedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedOptions")
            .field("desc", &self.desc)
            .field("debug_trigger", &self.debug_trigger.is_some())
            .field("priority_level", &self.priority_level)
            .finish()
    }
}

/// Builder for computed refs.
///
/// ```rust
/// use rebind_core::ReactiveScope;
///
/// let scope = ReactiveScope::new();
/// let price = scope.create_ref(10);
/// let total = {
///     let price = price.clone();
///     scope.computed()
///         .desc("total")
///         .priority_level(0)
///         .build(move || price.get() * 3)
///         .unwrap()
/// };
///
/// price.set(20).unwrap();
/// assert_eq!(total.get(), 60);
/// assert_eq!(total.desc(), "total");
/// ```
pub struct ComputedBuilder {
    scope: ReactiveScope,
    options: ComputedOptions,
}

impl ComputedBuilder {
    pub fn new(scope: &ReactiveScope) -> Self {
        Self::with_options(scope, ComputedOptions::default())
    }

    pub fn with_options(scope: &ReactiveScope, options: ComputedOptions) -> Self {
        Self {
            scope: scope.clone(),
            options,
        }
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.options.desc = desc.into();
        self
    }

    pub fn debug_trigger(mut self, trigger: impl Fn(&TriggerEvent<'_>) + 'static) -> Self {
        self.options.debug_trigger = Some(Rc::new(trigger));
        self
    }

    pub fn priority_level(mut self, level: i32) -> Self {
        self.options.priority_level = Some(level);
        self
    }

    /// Create the computed ref. The function runs once immediately.
    pub fn build<T, F>(self, compute: F) -> Result<DescReadonlyRef<T>>
    where
        T: Clone + 'static,
        F: Fn() -> T + 'static,
    {
        let computed = Computed::new(&self.scope, self.options, compute)?;
        let desc = computed.desc().to_string();
        let node = Rc::clone(&computed.node);
        Ok(DescReadonlyRef::new(
            ReadonlyRef::from_getter(move || node.get()),
            desc,
        ))
    }
}

struct ComputedNode<T> {
    subscriber_id: SubscriberId,
    cell_id: CellId,
    level: i32,
    desc: String,
    compute: Box<dyn Fn() -> T>,
    value: RefCell<T>,
    dirty: Cell<bool>,
    stale: Cell<bool>,
    computing: Cell<bool>,
    disposed: Cell<bool>,
    run_count: Cell<usize>,
    debug_trigger: Option<DebugTrigger>,
    runtime: WeakRuntime,
}

impl<T: Clone + 'static> ComputedNode<T> {
    fn get(&self) -> T {
        ReactiveContext::track_dependency(self.cell_id);

        if self.dirty.get() && !self.disposed.get() {
            self.recompute();
        }

        self.value.borrow().clone()
    }

    fn recompute(&self) {
        if self.computing.get() {
            error!(
                subscriber = %self.subscriber_id,
                desc = %self.desc,
                "computed ref read itself while computing, returning cached value"
            );
            return;
        }
        self.computing.set(true);

        let ctx = ReactiveContext::enter(self.subscriber_id);
        let value = (self.compute)();
        let deps = ctx.finish();

        if let Some(runtime) = self.runtime.upgrade() {
            runtime.subscribe(self.subscriber_id, deps);
        }

        *self.value.borrow_mut() = value;
        self.dirty.set(self.stale.replace(false));
        self.computing.set(false);

        let run_count = self.run_count.get() + 1;
        self.run_count.set(run_count);
        trace!(
            subscriber = %self.subscriber_id,
            desc = %self.desc,
            run_count,
            "computed ref recomputed"
        );

        if let Some(trigger) = &self.debug_trigger {
            trigger(&TriggerEvent {
                subscriber: self.subscriber_id,
                desc: &self.desc,
                run_count,
            });
        }
    }
}

impl<T: Clone + 'static> Reactive for ComputedNode<T> {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn priority(&self) -> Priority {
        Priority::new(self.level, self.subscriber_id)
    }

    fn mark_dirty(&self) -> Option<CellId> {
        if self.disposed.get() {
            return None;
        }
        self.dirty.set(true);
        Some(self.cell_id)
    }

    fn mark_stale(&self) {
        self.stale.set(true);
    }

    fn run(&self) -> Result<()> {
        let has_readers = self
            .runtime
            .upgrade()
            .is_some_and(|runtime| runtime.dependent_count(self.cell_id) > 0);

        if self.dirty.get() && has_readers && !self.disposed.get() {
            self.recompute();
        }
        Ok(())
    }

    fn dispose(&self) {
        self.disposed.set(true);
    }
}

/// Handle to a computed ref's node.
///
/// Most code only needs the [`DescReadonlyRef`] returned by
/// `ReactiveScope::ref_computed`; this handle adds introspection.
pub struct Computed<T> {
    node: Rc<ComputedNode<T>>,
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a computed ref owned by `scope`. The function runs immediately.
    pub fn new<F>(scope: &ReactiveScope, options: ComputedOptions, compute: F) -> Result<Self>
    where
        F: Fn() -> T + 'static,
    {
        let runtime = scope.live_runtime()?;
        let subscriber_id = SubscriberId::new();

        let ctx = ReactiveContext::enter(subscriber_id);
        let value = compute();
        let deps = ctx.finish();

        let node = Rc::new(ComputedNode {
            subscriber_id,
            cell_id: CellId::new(),
            level: options
                .priority_level
                .unwrap_or(runtime.config().default_priority_level),
            desc: options.desc,
            compute: Box::new(compute),
            value: RefCell::new(value),
            dirty: Cell::new(false),
            stale: Cell::new(false),
            computing: Cell::new(false),
            disposed: Cell::new(false),
            run_count: Cell::new(1),
            debug_trigger: options.debug_trigger,
            runtime: runtime.downgrade(),
        });

        runtime.register(node.clone());
        runtime.subscribe(subscriber_id, deps);
        scope.adopt(subscriber_id);

        Ok(Self { node })
    }

    pub fn get(&self) -> T {
        self.node.get()
    }

    pub fn id(&self) -> SubscriberId {
        self.node.subscriber_id
    }

    /// The cell readers of this computed ref depend on.
    pub fn cell_id(&self) -> CellId {
        self.node.cell_id
    }

    pub fn desc(&self) -> &str {
        &self.node.desc
    }

    /// Number of times the function has run, including the initial run.
    pub fn run_count(&self) -> usize {
        self.node.run_count.get()
    }

    pub fn is_dirty(&self) -> bool {
        self.node.dirty.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.node.disposed.get()
    }

    pub fn to_ref(&self) -> DescReadonlyRef<T> {
        let node = Rc::clone(&self.node);
        DescReadonlyRef::new(
            ReadonlyRef::from_getter(move || node.get()),
            self.node.desc.as_str(),
        )
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.node.subscriber_id)
            .field("desc", &self.node.desc)
            .field("value", &*self.node.value.borrow())
            .field("dirty", &self.node.dirty.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn computes_on_creation_and_caches() {
        let scope = ReactiveScope::new();
        let (calls, calls_inner) = counter();

        let computed = Computed::new(&scope, ComputedOptions::default(), move || {
            calls_inner.set(calls_inner.get() + 1);
            42
        })
        .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(computed.get(), 42);
        assert_eq!(computed.get(), 42);
        assert_eq!(calls.get(), 1);
        assert_eq!(computed.run_count(), 1);
    }

    #[test]
    fn unread_computed_recomputes_lazily() {
        let scope = ReactiveScope::new();
        let source = scope.create_ref(1);
        let (calls, calls_inner) = counter();

        let computed = {
            let source = source.clone();
            Computed::new(&scope, ComputedOptions::default(), move || {
                calls_inner.set(calls_inner.get() + 1);
                source.get() + 1
            })
            .unwrap()
        };

        source.set(5).unwrap();
        assert!(computed.is_dirty());
        assert_eq!(calls.get(), 1);

        assert_eq!(computed.get(), 6);
        assert_eq!(computed.get(), 6);
        assert_eq!(calls.get(), 2);
        assert!(!computed.is_dirty());
    }

    #[test]
    fn debug_trigger_sees_each_recompute() {
        let scope = ReactiveScope::new();
        let source = scope.create_ref(0);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let doubled = {
            let source = source.clone();
            let seen = seen.clone();
            scope
                .computed()
                .desc("doubled")
                .debug_trigger(move |event| {
                    seen.borrow_mut().push((event.desc.to_string(), event.run_count));
                })
                .build(move || source.get() * 2)
                .unwrap()
        };

        source.set(3).unwrap();
        assert_eq!(doubled.get(), 6);

        assert_eq!(&*seen.borrow(), &[("doubled".to_string(), 2)]);
    }

    #[test]
    fn self_read_returns_cached_value() {
        let scope = ReactiveScope::new();
        let source = scope.create_ref(1);
        let slot: Rc<RefCell<Option<DescReadonlyRef<i32>>>> = Rc::new(RefCell::new(None));

        let looped = {
            let source = source.clone();
            let slot = slot.clone();
            scope
                .ref_computed(move || {
                    let previous = slot.borrow().as_ref().map_or(0, DescReadonlyRef::get);
                    source.get() + previous
                })
                .unwrap()
        };
        *slot.borrow_mut() = Some(looped.clone());

        source.set(2).unwrap();
        // 2 + cached 1
        assert_eq!(looped.get(), 3);
    }

    #[test]
    fn disposed_computed_keeps_last_value() {
        let scope = ReactiveScope::new();
        let source = scope.create_ref(1);
        let computed = {
            let source = source.clone();
            Computed::new(&scope, ComputedOptions::default(), move || source.get() * 10).unwrap()
        };

        scope.dispose();
        source.set(2).unwrap();

        assert!(computed.is_disposed());
        assert_eq!(computed.get(), 10);
    }
}
