//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is re-run during propagation.
//!
//! 3. Every run starts with an empty dependency set and records what it reads,
//!    so a branch that stops reading a cell also stops reacting to it.
//!
//! # Explicit dependencies
//!
//! An effect created with `on` tracks only the refs it was given. The body
//! runs in an untracked region, so incidental reads do not subscribe.
//!
//! # Self-invalidation
//!
//! If a cell the effect already read during the current run changes before
//! the run ends, the effect runs again right after. More consecutive re-runs
//! than `max_propagation_depth` is reported as a cyclic dependency.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{error, trace, warn};

use super::context::ReactiveContext;
use super::refs::AnyRef;
use super::runtime::{Reactive, WeakRuntime};
use super::scope::ReactiveScope;
use super::subscriber::{CellId, Priority, SubscriberId};
use crate::error::{ReactiveError, Result};

type Body = Box<dyn FnMut() -> Result<()>>;

/// Options for `ReactiveScope::effect_with`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectOptions {
    /// Defaults to the runtime's `default_priority_level`.
    pub priority_level: Option<i32>,
}

/// Options for `ReactiveScope::on_with`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OnOptions {
    /// Skip the initial invocation; the body first runs on the first change.
    pub on_changes: bool,
    pub priority_level: Option<i32>,
}

struct EffectNode {
    subscriber_id: SubscriberId,
    level: i32,
    body: RefCell<Body>,
    /// `Some` for `on` effects: only these are tracked.
    explicit: Option<Vec<AnyRef>>,
    skip_next_body: Cell<bool>,
    pending: Cell<bool>,
    stale: Cell<bool>,
    disposed: Cell<bool>,
    run_count: Cell<usize>,
    runtime: WeakRuntime,
}

impl EffectNode {
    fn execute(&self) -> Result<()> {
        if self.disposed.get() {
            return Ok(());
        }
        if self.body.try_borrow_mut().is_err() {
            // Re-entered from inside its own body; the outer run loops again.
            self.stale.set(true);
            return Ok(());
        }

        let limit = self
            .runtime
            .upgrade()
            .map_or(usize::MAX, |runtime| runtime.config().max_propagation_depth);

        let mut reruns = 0;
        loop {
            self.pending.set(false);
            self.run_once()?;

            if !self.stale.replace(false) || self.disposed.get() {
                return Ok(());
            }

            reruns += 1;
            if reruns > limit {
                error!(
                    subscriber = %self.subscriber_id,
                    reruns,
                    "effect keeps invalidating itself"
                );
                return Err(ReactiveError::CyclicDependency {
                    depth: reruns,
                    limit,
                });
            }
        }
    }

    fn run_once(&self) -> Result<()> {
        let Ok(mut body) = self.body.try_borrow_mut() else {
            self.stale.set(true);
            return Ok(());
        };

        trace!(subscriber = %self.subscriber_id, "running effect");

        // Unsubscribed while running: writes to cells already read this run
        // mark it stale instead of re-entering it.
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.clear_dependencies(self.subscriber_id);
        }

        let ctx = ReactiveContext::enter(self.subscriber_id);
        let result = match &self.explicit {
            Some(deps) => {
                for dep in deps {
                    dep.track();
                }
                if self.skip_next_body.replace(false) {
                    Ok(())
                } else {
                    let _quiet = ReactiveContext::untracked();
                    body()
                }
            }
            None => body(),
        };
        let deps = ctx.finish();
        drop(body);

        match self.runtime.upgrade() {
            Some(runtime) => runtime.subscribe(self.subscriber_id, deps),
            None => warn!(
                subscriber = %self.subscriber_id,
                "effect ran after its runtime was dropped"
            ),
        }
        self.run_count.set(self.run_count.get() + 1);

        result
    }
}

impl Reactive for EffectNode {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn priority(&self) -> Priority {
        Priority::new(self.level, self.subscriber_id)
    }

    fn mark_dirty(&self) -> Option<CellId> {
        self.pending.set(true);
        None
    }

    fn mark_stale(&self) {
        self.stale.set(true);
    }

    fn run(&self) -> Result<()> {
        // A nested propagation may already have brought it up to date.
        if self.pending.get() {
            self.execute()
        } else {
            Ok(())
        }
    }

    fn dispose(&self) {
        self.disposed.set(true);
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// The handle does not own the effect: dropping it leaves the effect running
/// until it (or its scope) is disposed.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use rebind_core::ReactiveScope;
///
/// let scope = ReactiveScope::new();
/// let count = scope.create_ref(0);
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let effect = {
///     let (count, log) = (count.clone(), log.clone());
///     scope.effect(move || log.borrow_mut().push(count.get() * 2)).unwrap()
/// };
///
/// count.set(5).unwrap();
/// assert_eq!(*log.borrow(), vec![0, 10]);
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone)]
pub struct Effect {
    node: Rc<EffectNode>,
}

impl Effect {
    pub(crate) fn create(
        scope: &ReactiveScope,
        level: Option<i32>,
        explicit: Option<Vec<AnyRef>>,
        skip_first_body: bool,
        body: Body,
    ) -> Result<Self> {
        let runtime = scope.live_runtime()?;

        let node = Rc::new(EffectNode {
            subscriber_id: SubscriberId::new(),
            level: level.unwrap_or(runtime.config().default_priority_level),
            body: RefCell::new(body),
            explicit,
            skip_next_body: Cell::new(skip_first_body),
            pending: Cell::new(false),
            stale: Cell::new(false),
            disposed: Cell::new(false),
            run_count: Cell::new(0),
            runtime: runtime.downgrade(),
        });

        runtime.register(node.clone());
        scope.adopt(node.subscriber_id);

        let effect = Self { node };
        if let Err(err) = effect.node.execute() {
            effect.dispose();
            return Err(err);
        }
        Ok(effect)
    }

    pub fn id(&self) -> SubscriberId {
        self.node.subscriber_id
    }

    /// Run the effect now, re-tracking its dependencies.
    pub fn execute(&self) -> Result<()> {
        self.node.execute()
    }

    /// Stop the effect and detach it from every cell.
    pub fn dispose(&self) {
        match self.node.runtime.upgrade() {
            Some(runtime) => {
                runtime.dispose_node(self.node.subscriber_id);
            }
            None => self.node.dispose(),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.node.disposed.get()
    }

    /// Number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.node.run_count.get()
    }

    /// Number of cells read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.node
            .runtime
            .upgrade()
            .map_or(0, |runtime| runtime.dependency_count(self.node.subscriber_id))
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.node.subscriber_id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> Rc<Cell<usize>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn effect_runs_on_creation() {
        let scope = ReactiveScope::new();
        let runs = counter();
        let runs_inner = runs.clone();

        let effect = scope.effect(move || runs_inner.set(runs_inner.get() + 1)).unwrap();

        assert_eq!(runs.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn manual_execute_reruns() {
        let scope = ReactiveScope::new();
        let effect = scope.effect(|| {}).unwrap();

        effect.execute().unwrap();
        effect.execute().unwrap();
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let scope = ReactiveScope::new();
        let source = scope.create_ref(0);
        let runs = counter();

        let effect = {
            let (source, runs) = (source.clone(), runs.clone());
            scope
                .effect(move || {
                    source.get();
                    runs.set(runs.get() + 1);
                })
                .unwrap()
        };
        assert_eq!(effect.dependency_count(), 1);

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(source.signal().map(|s| s.subscriber_count()), Some(0));

        source.set(1).unwrap();
        effect.execute().unwrap();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn clone_shares_state() {
        let scope = ReactiveScope::new();
        let effect1 = scope.effect(|| {}).unwrap();
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        effect1.execute().unwrap();
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }

    #[test]
    fn on_ignores_incidental_reads() {
        let scope = ReactiveScope::new();
        let watched = scope.create_ref(0);
        let incidental = scope.create_ref(0);
        let runs = counter();

        let effect = {
            let (incidental, runs) = (incidental.clone(), runs.clone());
            scope
                .on(&watched, move || {
                    incidental.get();
                    runs.set(runs.get() + 1);
                })
                .unwrap()
        };
        assert_eq!(effect.dependency_count(), 1);

        incidental.set(1).unwrap();
        assert_eq!(runs.get(), 1);

        watched.set(1).unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn on_changes_skips_initial_call() {
        let scope = ReactiveScope::new();
        let watched = scope.create_ref("a".to_string());
        let runs = counter();

        let effect = {
            let runs = runs.clone();
            scope
                .on_with(
                    &watched,
                    OnOptions {
                        on_changes: true,
                        ..OnOptions::default()
                    },
                    move || runs.set(runs.get() + 1),
                )
                .unwrap()
        };

        assert_eq!(runs.get(), 0);
        assert_eq!(effect.dependency_count(), 1);
        watched.set("b".into()).unwrap();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn self_increment_is_reported_as_cycle() {
        let scope = ReactiveScope::new();
        let count = scope.create_ref(0);

        let result = {
            let count = count.clone();
            scope.try_effect(move || {
                let current = count.get();
                count.set(current + 1)
            })
        };

        assert!(matches!(result, Err(ReactiveError::CyclicDependency { .. })));
        assert_eq!(scope.runtime().node_count(), 0);
    }

    #[test]
    fn converging_self_write_settles() {
        let scope = ReactiveScope::new();
        let level = scope.create_ref(15);

        let effect = {
            let level = level.clone();
            scope
                .try_effect(move || {
                    if level.get() > 10 {
                        level.set(10)?;
                    }
                    Ok(())
                })
                .unwrap()
        };

        assert_eq!(level.get(), 10);
        assert_eq!(effect.run_count(), 2);

        level.set(12).unwrap();
        assert_eq!(level.get(), 10);
    }

    #[test]
    fn write_behind_a_computed_read_reruns() {
        let scope = ReactiveScope::new();
        let source = scope.create_ref(1);
        let doubled = {
            let source = source.clone();
            scope.ref_computed(move || source.get() * 2).unwrap()
        };
        let seen = Rc::new(RefCell::new(Vec::new()));

        {
            let (source, doubled, seen) = (source.clone(), doubled.clone(), seen.clone());
            scope
                .try_effect(move || {
                    seen.borrow_mut().push(doubled.get());
                    if source.get_untracked() < 10 {
                        source.set(10)?;
                    }
                    Ok(())
                })
                .unwrap();
        }
        assert_eq!(*seen.borrow(), vec![2, 20]);

        source.set(3).unwrap();
        assert_eq!(*seen.borrow(), vec![2, 20, 6, 20]);
        assert_eq!(doubled.get(), 20);
    }
}
