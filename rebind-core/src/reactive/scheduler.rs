//! Update Scheduler
//!
//! The scheduler decides which computations a cell change reaches and in what
//! order they run.
//!
//! # Algorithm
//!
//! 1. Start from the changed cell's direct dependents.
//! 2. Breadth-first, mark each reached node dirty. A computed ref hands back
//!    its own cell, whose readers are reached next.
//! 3. Sort the reached nodes by priority: level ascending, then registration
//!    order.
//!
//! Running the plan is the runtime's job. A node reached twice (directly and
//! through a computed ref) appears once. The plan also remembers every cell
//! the change reached, so computations mid-run can be checked against all of
//! them.

use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use super::runtime::{GraphState, Reactive};
use super::subscriber::{CellId, SubscriberId};

/// The ordered set of nodes one cell change has to bring up to date.
pub(crate) struct PropagationPlan {
    nodes: Vec<Rc<dyn Reactive>>,
    /// The changed cell followed by the cells of computed refs it dirtied.
    cells: Vec<CellId>,
}

impl PropagationPlan {
    /// Mark every node reachable from `source` dirty and collect it.
    pub(crate) fn collect(graph: &GraphState, source: CellId) -> Self {
        let mut nodes = Vec::new();
        let mut cells = Vec::new();
        let mut visited: HashSet<SubscriberId> = HashSet::new();
        let mut queue: VecDeque<CellId> = VecDeque::from([source]);

        while let Some(cell) = queue.pop_front() {
            cells.push(cell);
            for id in graph.dependents_of(cell) {
                if !visited.insert(id) {
                    continue;
                }
                let Some(node) = graph.node(id) else {
                    continue;
                };

                if let Some(derived) = node.mark_dirty() {
                    queue.push_back(derived);
                }
                nodes.push(Rc::clone(node));
            }
        }

        Self { nodes, cells }
    }

    pub(crate) fn cells(&self) -> &[CellId] {
        &self.cells
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in run order.
    pub(crate) fn into_ordered(mut self) -> Vec<Rc<dyn Reactive>> {
        self.nodes.sort_by_key(|node| node.priority());
        self.nodes
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use smallvec::smallvec;

    use super::*;
    use crate::error::Result;
    use crate::reactive::runtime::Runtime;
    use crate::reactive::subscriber::Priority;

    struct Node {
        id: SubscriberId,
        level: i32,
        derived: Option<CellId>,
        dirty: Cell<bool>,
    }

    impl Node {
        fn new(level: i32, derived: Option<CellId>) -> Rc<Self> {
            Rc::new(Self {
                id: SubscriberId::new(),
                level,
                derived,
                dirty: Cell::new(false),
            })
        }
    }

    impl Reactive for Node {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn priority(&self) -> Priority {
            Priority::new(self.level, self.id)
        }

        fn mark_dirty(&self) -> Option<CellId> {
            self.dirty.set(true);
            self.derived
        }

        fn mark_stale(&self) {}

        fn run(&self) -> Result<()> {
            Ok(())
        }

        fn dispose(&self) {}
    }

    fn ids(plan: PropagationPlan) -> Vec<SubscriberId> {
        plan.into_ordered()
            .iter()
            .map(|node| node.subscriber_id())
            .collect()
    }

    #[test]
    fn plan_orders_by_level_then_registration() {
        let runtime = Runtime::default();
        let source = CellId::new();

        let late_level = Node::new(2, None);
        let first = Node::new(1, None);
        let second = Node::new(1, None);
        for node in [&late_level, &first, &second] {
            runtime.register(node.clone());
            runtime.subscribe(node.id, smallvec![source]);
        }

        let plan = runtime.with_graph(|graph| PropagationPlan::collect(graph, source));

        assert_eq!(ids(plan), vec![first.id, second.id, late_level.id]);
    }

    #[test]
    fn plan_reaches_through_derived_cells_once() {
        let runtime = Runtime::default();
        let source = CellId::new();
        let derived_cell = CellId::new();

        let derived = Node::new(1, Some(derived_cell));
        let diamond = Node::new(1, None);
        runtime.register(derived.clone());
        runtime.register(diamond.clone());
        runtime.subscribe(derived.id, smallvec![source]);
        runtime.subscribe(diamond.id, smallvec![source, derived_cell]);

        let plan = runtime.with_graph(|graph| PropagationPlan::collect(graph, source));

        assert_eq!(plan.len(), 2);
        assert!(derived.dirty.get());
        assert!(diamond.dirty.get());
    }

    #[test]
    fn plan_for_unread_cell_is_empty() {
        let runtime = Runtime::default();
        let plan = runtime.with_graph(|graph| PropagationPlan::collect(graph, CellId::new()));
        assert!(plan.is_empty());
    }
}
