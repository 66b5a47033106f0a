//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! When a cell is read, it registers itself with the innermost context; when
//! the computation finishes, the collected set replaces the computation's
//! previous dependencies.
//!
//! # Implementation
//!
//! A thread-local stack of entries. Running a computed ref or an effect pushes
//! an entry; the returned guard pops it. Nested computations (an effect reading
//! a computed ref that has to recompute) therefore collect into separate
//! entries. An untracked entry shadows everything below it, which is how `on`
//! and [`untrack`](super::untrack) hide incidental reads.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::{CellId, SubscriberId};

/// Dependencies collected during one run. Most computations read a handful of
/// cells, so they stay inline.
pub type Dependencies = SmallVec<[CellId; 4]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug, Clone)]
struct ContextEntry {
    /// `None` marks an untracked region.
    subscriber_id: Option<SubscriberId>,
    /// Cells read so far, in first-read order, without duplicates.
    dependencies: Dependencies,
}

/// Guard that pops the context when dropped.
///
/// The stack stays balanced even if the computation panics.
#[derive(Debug)]
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a tracking context for the given subscriber.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        Self::push(Some(subscriber_id))
    }

    /// Enter a region where reads are not tracked.
    pub fn untracked() -> Self {
        Self::push(None)
    }

    fn push(subscriber_id: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                dependencies: Dependencies::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the subscriber of the innermost context, if it tracks.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber_id))
    }

    /// Record a read of the given cell.
    ///
    /// Called by cells and computed refs on every read.
    pub fn track_dependency(cell_id: CellId) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if entry.subscriber_id.is_some() && !entry.dependencies.contains(&cell_id) {
                    entry.dependencies.push(cell_id);
                }
            }
        });
    }

    /// Get the dependencies collected in the current context.
    pub fn get_dependencies() -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.clone())
                .unwrap_or_default()
        })
    }

    /// Subscribers currently on the stack that already read `cell_id` during
    /// their in-progress run.
    ///
    /// A write to such a cell makes the running computation stale.
    pub fn readers_of(cell_id: CellId) -> SmallVec<[SubscriberId; 2]> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .filter(|entry| entry.dependencies.contains(&cell_id))
                .filter_map(|entry| entry.subscriber_id)
                .collect()
        })
    }

    /// Leave the context, returning what it collected.
    pub fn finish(self) -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|entry| std::mem::take(&mut entry.dependencies))
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}
