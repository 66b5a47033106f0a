//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects cells, computed refs
//! and effects. It owns the dependency graph and runs propagation when a cell
//! changes.
//!
//! # How It Works
//!
//! 1. Computed refs and effects register a node with the runtime.
//!
//! 2. When a node finishes a tracked run, the runtime replaces its recorded
//!    dependencies with the cells it actually read.
//!
//! 3. When a cell's value changes, the runtime:
//!    a. Collects every dependent (transitively through computed refs)
//!    b. Marks computations that are mid-run and already read the cell, or a
//!       computed ref it dirtied, stale
//!    c. Runs them in priority order, synchronously. A failing node does not
//!       stop the others; the first error is returned
//!
//! # Threading
//!
//! Everything is single-threaded. The runtime lives behind an `Rc` and is
//! shared by every scope derived from the same root.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, error, trace, warn};

use super::context::{Dependencies, ReactiveContext};
use super::scheduler::PropagationPlan;
use super::subscriber::{CellId, Priority, SubscriberId};
use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Result};

/// A computation registered with the runtime.
pub(crate) trait Reactive {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Scheduling key.
    fn priority(&self) -> Priority;

    /// Invalidate after a dependency changed.
    ///
    /// Computed refs return their own cell so the invalidation continues to
    /// their readers.
    fn mark_dirty(&self) -> Option<CellId>;

    /// A dependency changed while this computation was running.
    fn mark_stale(&self);

    /// Bring the computation up to date if it was invalidated.
    fn run(&self) -> Result<()>;

    /// Stop the computation permanently.
    fn dispose(&self);
}

/// The dependency graph proper.
#[derive(Default)]
pub(crate) struct GraphState {
    /// Registered computations, in registration order.
    nodes: IndexMap<SubscriberId, Rc<dyn Reactive>>,

    /// Cell -> computations that read it during their last run.
    dependents: HashMap<CellId, IndexSet<SubscriberId>>,

    /// Computation -> cells it read during its last run.
    sources: HashMap<SubscriberId, Dependencies>,
}

impl GraphState {
    pub(crate) fn node(&self, id: SubscriberId) -> Option<&Rc<dyn Reactive>> {
        self.nodes.get(&id)
    }

    pub(crate) fn dependents_of(&self, cell: CellId) -> impl Iterator<Item = SubscriberId> + '_ {
        self.dependents.get(&cell).into_iter().flatten().copied()
    }

    fn clear_dependencies(&mut self, subscriber_id: SubscriberId) {
        if let Some(cells) = self.sources.remove(&subscriber_id) {
            for cell in cells {
                if let Some(subs) = self.dependents.get_mut(&cell) {
                    subs.shift_remove(&subscriber_id);
                    if subs.is_empty() {
                        self.dependents.remove(&cell);
                    }
                }
            }
        }
    }
}

struct RuntimeInner {
    config: RuntimeConfig,
    graph: RefCell<GraphState>,
    depth: Cell<usize>,
}

/// Handle to a reactive runtime.
///
/// Cloning is cheap and yields a handle to the same graph.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Non-owning handle held by cells and nodes, so they never keep the graph
/// alive on their own.
#[derive(Clone, Default)]
pub struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }
}

impl fmt::Debug for WeakRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakRuntime")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Decrements the propagation depth when a propagation round ends.
struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                graph: RefCell::new(GraphState::default()),
                depth: Cell::new(0),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Current propagation nesting.
    pub fn depth(&self) -> usize {
        self.inner.depth.get()
    }

    /// Register a computation with the runtime.
    pub(crate) fn register(&self, node: Rc<dyn Reactive>) {
        let id = node.subscriber_id();
        debug!(subscriber = %id, "registering reactive node");
        self.inner.graph.borrow_mut().nodes.insert(id, node);
    }

    /// Remove a computation and all of its edges, then dispose it.
    ///
    /// Returns false if the node was not registered.
    pub fn dispose_node(&self, id: SubscriberId) -> bool {
        let node = {
            let mut graph = self.inner.graph.borrow_mut();
            graph.clear_dependencies(id);
            graph.nodes.shift_remove(&id)
        };

        match node {
            Some(node) => {
                debug!(subscriber = %id, "disposing reactive node");
                node.dispose();
                true
            }
            None => false,
        }
    }

    /// Replace the recorded dependencies of a subscriber.
    ///
    /// Called after every tracked run, so stale edges from earlier runs never
    /// linger.
    pub fn subscribe(&self, subscriber_id: SubscriberId, cells: Dependencies) {
        let mut graph = self.inner.graph.borrow_mut();
        graph.clear_dependencies(subscriber_id);
        if !graph.nodes.contains_key(&subscriber_id) {
            // Disposed while it was running.
            return;
        }
        for &cell in &cells {
            graph
                .dependents
                .entry(cell)
                .or_default()
                .insert(subscriber_id);
        }
        graph.sources.insert(subscriber_id, cells);
    }

    /// Remove all dependencies for a subscriber.
    pub fn clear_dependencies(&self, subscriber_id: SubscriberId) {
        self.inner.graph.borrow_mut().clear_dependencies(subscriber_id);
    }

    /// Number of computations currently reading the cell.
    pub fn dependent_count(&self, cell: CellId) -> usize {
        self.inner
            .graph
            .borrow()
            .dependents
            .get(&cell)
            .map_or(0, IndexSet::len)
    }

    /// Number of cells the subscriber read during its last run.
    pub fn dependency_count(&self, subscriber_id: SubscriberId) -> usize {
        self.inner
            .graph
            .borrow()
            .sources
            .get(&subscriber_id)
            .map_or(0, |cells| cells.len())
    }

    /// Number of live computations.
    pub fn node_count(&self) -> usize {
        self.inner.graph.borrow().nodes.len()
    }

    pub fn contains(&self, subscriber_id: SubscriberId) -> bool {
        self.inner.graph.borrow().nodes.contains_key(&subscriber_id)
    }

    fn enter_propagation(&self) -> Result<DepthGuard<'_>> {
        let depth = self.inner.depth.get() + 1;
        let limit = self.inner.config.max_propagation_depth;
        if depth > limit {
            error!(depth, limit, "propagation depth exceeded, aborting");
            return Err(ReactiveError::CyclicDependency { depth, limit });
        }
        self.inner.depth.set(depth);
        Ok(DepthGuard {
            depth: &self.inner.depth,
        })
    }

    /// Notify all dependents that a cell changed.
    ///
    /// This is the core update propagation mechanism. Every dependent has run
    /// (or failed) by the time this returns.
    pub fn notify_cell_change(&self, cell: CellId) -> Result<()> {
        let plan = self.with_graph(|graph| PropagationPlan::collect(graph, cell));

        for &reached in plan.cells() {
            for reader in ReactiveContext::readers_of(reached) {
                let node = self.inner.graph.borrow().node(reader).cloned();
                if let Some(node) = node {
                    node.mark_stale();
                }
            }
        }

        if plan.is_empty() {
            return Ok(());
        }

        let _depth = self.enter_propagation()?;
        trace!(%cell, dependents = plan.len(), depth = self.depth(), "propagating change");

        let mut first_error = None;
        for node in plan.into_ordered() {
            if let Err(err) = node.run() {
                match first_error {
                    None => first_error = Some(err),
                    Some(_) => warn!(subscriber = %node.subscriber_id(), %err, "dependent failed"),
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if reads are currently being tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    pub(crate) fn with_graph<R>(&self, f: impl FnOnce(&GraphState) -> R) -> R {
        f(&self.inner.graph.borrow())
    }

    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("node_count", &self.node_count())
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    struct MockReactive {
        id: SubscriberId,
        derived: Option<CellId>,
        dirty: Cell<bool>,
        runs: Cell<usize>,
        disposed: Cell<bool>,
    }

    impl MockReactive {
        fn new(derived: Option<CellId>) -> Rc<Self> {
            Rc::new(Self {
                id: SubscriberId::new(),
                derived,
                dirty: Cell::new(false),
                runs: Cell::new(0),
                disposed: Cell::new(false),
            })
        }
    }

    impl Reactive for MockReactive {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn priority(&self) -> Priority {
            Priority::new(1, self.id)
        }

        fn mark_dirty(&self) -> Option<CellId> {
            self.dirty.set(true);
            self.derived
        }

        fn mark_stale(&self) {}

        fn run(&self) -> Result<()> {
            if self.dirty.replace(false) {
                self.runs.set(self.runs.get() + 1);
            }
            Ok(())
        }

        fn dispose(&self) {
            self.disposed.set(true);
        }
    }

    #[test]
    fn runtime_registers_and_disposes() {
        let runtime = Runtime::default();
        let node = MockReactive::new(None);
        runtime.register(node.clone());

        assert!(runtime.contains(node.id));
        assert!(runtime.dispose_node(node.id));
        assert!(!runtime.contains(node.id));
        assert!(node.disposed.get());
        assert!(!runtime.dispose_node(node.id));
    }

    #[test]
    fn runtime_notifies_dependents_transitively() {
        let runtime = Runtime::default();
        let source = CellId::new();
        let derived_cell = CellId::new();

        let derived = MockReactive::new(Some(derived_cell));
        let leaf = MockReactive::new(None);
        runtime.register(derived.clone());
        runtime.register(leaf.clone());
        runtime.subscribe(derived.id, smallvec![source]);
        runtime.subscribe(leaf.id, smallvec![derived_cell]);

        runtime.notify_cell_change(source).unwrap();

        assert_eq!(derived.runs.get(), 1);
        assert_eq!(leaf.runs.get(), 1);
        assert_eq!(runtime.depth(), 0);
    }

    #[test]
    fn subscribe_replaces_previous_edges() {
        let runtime = Runtime::default();
        let (a, b) = (CellId::new(), CellId::new());
        let node = MockReactive::new(None);
        runtime.register(node.clone());

        runtime.subscribe(node.id, smallvec![a]);
        assert_eq!(runtime.dependent_count(a), 1);

        runtime.subscribe(node.id, smallvec![b]);
        assert_eq!(runtime.dependent_count(a), 0);
        assert_eq!(runtime.dependent_count(b), 1);
        assert_eq!(runtime.dependency_count(node.id), 1);
    }

    #[test]
    fn unregistered_subscriber_gets_no_edges() {
        let runtime = Runtime::default();
        let cell = CellId::new();

        runtime.subscribe(SubscriberId::new(), smallvec![cell]);

        assert_eq!(runtime.dependent_count(cell), 0);
    }
}
