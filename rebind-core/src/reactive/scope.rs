//! Reactive Scopes
//!
//! A scope owns the computed refs and effects created through it. Disposing a
//! scope disposes all of them, and every child scope, in one call.
//! Application code passes scopes around explicitly; there is no ambient
//! global graph.
//!
//! Cells are not owned: a ref stays readable and writable after its scope is
//! gone, it just has nobody left to notify.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::effect::{Effect, EffectOptions, OnOptions};
use super::memo::{ComputedBuilder, ComputedOptions};
use super::refs::{DescReadonlyRef, IntoDeps, Ref};
use super::runtime::Runtime;
use super::signal::{Comparison, RefValue, SignalCell};
use super::subscriber::SubscriberId;
use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Result};

/// `owned` is pruned of disposed nodes once it grows past this many entries.
const PRUNE_FLOOR: usize = 32;

struct ScopeInner {
    runtime: Runtime,
    owned: RefCell<Vec<SubscriberId>>,
    prune_at: Cell<usize>,
    children: RefCell<Vec<ReactiveScope>>,
    parent: Option<Weak<ScopeInner>>,
    disposed: Cell<bool>,
}

/// Owner of a group of reactive computations.
///
/// Cloning yields another handle to the same scope.
#[derive(Clone)]
pub struct ReactiveScope {
    inner: Rc<ScopeInner>,
}

/// Non-owning scope handle, for closures that must not keep a scope alive.
#[derive(Clone)]
pub struct WeakScope {
    inner: Weak<ScopeInner>,
}

impl WeakScope {
    pub fn upgrade(&self) -> Option<ReactiveScope> {
        self.inner.upgrade().map(|inner| ReactiveScope { inner })
    }
}

impl fmt::Debug for WeakScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakScope")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl ReactiveScope {
    /// A root scope with its own runtime and the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// A root scope with its own runtime.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::from_parts(Runtime::new(config), None)
    }

    fn from_parts(runtime: Runtime, parent: Option<Weak<ScopeInner>>) -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                runtime,
                owned: RefCell::new(Vec::new()),
                prune_at: Cell::new(PRUNE_FLOOR),
                children: RefCell::new(Vec::new()),
                parent,
                disposed: Cell::new(false),
            }),
        }
    }

    /// A scope sharing this scope's runtime, disposed together with it.
    ///
    /// A child of a disposed scope starts out disposed.
    pub fn child(&self) -> ReactiveScope {
        let child = Self::from_parts(self.inner.runtime.clone(), Some(Rc::downgrade(&self.inner)));
        if self.is_disposed() {
            child.inner.disposed.set(true);
        } else {
            self.inner.children.borrow_mut().push(child.clone());
        }
        child
    }

    pub fn downgrade(&self) -> WeakScope {
        WeakScope {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub fn config(&self) -> &RuntimeConfig {
        self.inner.runtime.config()
    }

    pub(crate) fn live_runtime(&self) -> Result<Runtime> {
        if self.is_disposed() {
            return Err(ReactiveError::ScopeDisposed);
        }
        Ok(self.inner.runtime.clone())
    }

    pub(crate) fn adopt(&self, id: SubscriberId) {
        let mut owned = self.inner.owned.borrow_mut();
        if owned.len() >= self.inner.prune_at.get() {
            // Nodes disposed individually are still listed here.
            let runtime = &self.inner.runtime;
            owned.retain(|owned_id| runtime.contains(*owned_id));
            self.inner.prune_at.set((owned.len() * 2).max(PRUNE_FLOOR));
        }
        owned.push(id);
    }

    /// Create a cell and a ref over it (the `ref` operation).
    ///
    /// Scalars ignore writes of an equal value; composites notify on every
    /// write. See [`RefValue`].
    pub fn create_ref<T: RefValue>(&self, value: T) -> Ref<T> {
        self.create_ref_with(value, T::comparison())
    }

    /// Create a ref with an explicit comparison policy.
    pub fn create_ref_with<T: Clone + 'static>(
        &self,
        value: T,
        comparison: Comparison<T>,
    ) -> Ref<T> {
        Ref::from_signal(SignalCell::new(self.inner.runtime.downgrade(), value, comparison))
    }

    /// A memoized derived ref with default options.
    pub fn ref_computed<T, F>(&self, compute: F) -> Result<DescReadonlyRef<T>>
    where
        T: Clone + 'static,
        F: Fn() -> T + 'static,
    {
        self.computed().build(compute)
    }

    /// Builder for computed refs with a description, debug trigger or
    /// priority level.
    pub fn computed(&self) -> ComputedBuilder {
        ComputedBuilder::new(self)
    }

    pub fn computed_with(&self, options: ComputedOptions) -> ComputedBuilder {
        ComputedBuilder::with_options(self, options)
    }

    /// Run `f` now and again whenever a cell it read changes.
    pub fn effect(&self, mut f: impl FnMut() + 'static) -> Result<Effect> {
        self.try_effect(move || {
            f();
            Ok(())
        })
    }

    /// Like [`effect`](Self::effect) for a fallible body. The first run's
    /// error is returned here; later errors surface from the write that
    /// triggered the re-run.
    pub fn try_effect(&self, f: impl FnMut() -> Result<()> + 'static) -> Result<Effect> {
        self.try_effect_with(EffectOptions::default(), f)
    }

    pub fn effect_with(
        &self,
        options: EffectOptions,
        mut f: impl FnMut() + 'static,
    ) -> Result<Effect> {
        self.try_effect_with(options, move || {
            f();
            Ok(())
        })
    }

    pub fn try_effect_with(
        &self,
        options: EffectOptions,
        f: impl FnMut() -> Result<()> + 'static,
    ) -> Result<Effect> {
        Effect::create(self, options.priority_level, None, false, Box::new(f))
    }

    /// Run `f` now and again whenever one of `deps` changes. Nothing `f`
    /// itself reads is tracked.
    pub fn on(&self, deps: impl IntoDeps, mut f: impl FnMut() + 'static) -> Result<Effect> {
        self.try_on_with(deps, OnOptions::default(), move || {
            f();
            Ok(())
        })
    }

    pub fn try_on(
        &self,
        deps: impl IntoDeps,
        f: impl FnMut() -> Result<()> + 'static,
    ) -> Result<Effect> {
        self.try_on_with(deps, OnOptions::default(), f)
    }

    pub fn on_with(
        &self,
        deps: impl IntoDeps,
        options: OnOptions,
        mut f: impl FnMut() + 'static,
    ) -> Result<Effect> {
        self.try_on_with(deps, options, move || {
            f();
            Ok(())
        })
    }

    pub fn try_on_with(
        &self,
        deps: impl IntoDeps,
        options: OnOptions,
        f: impl FnMut() -> Result<()> + 'static,
    ) -> Result<Effect> {
        Effect::create(
            self,
            options.priority_level,
            Some(deps.into_deps()),
            options.on_changes,
            Box::new(f),
        )
    }

    /// Dispose every computation created through this scope and its children.
    ///
    /// Idempotent. Safe to call from inside one of the scope's own effects.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }

        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        for child in children {
            child.dispose();
        }

        let owned = std::mem::take(&mut *self.inner.owned.borrow_mut());
        debug!(nodes = owned.len(), "disposing reactive scope");
        for id in owned {
            self.inner.runtime.dispose_node(id);
        }

        if let Some(parent) = self.inner.parent.as_ref().and_then(Weak::upgrade) {
            if let Ok(mut siblings) = parent.children.try_borrow_mut() {
                siblings.retain(|child| !Rc::ptr_eq(&child.inner, &self.inner));
            }
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Number of live computations created directly through this scope.
    pub fn owned_count(&self) -> usize {
        let runtime = &self.inner.runtime;
        self.inner
            .owned
            .borrow()
            .iter()
            .filter(|id| runtime.contains(**id))
            .count()
    }

    pub fn ptr_eq(&self, other: &ReactiveScope) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for ReactiveScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReactiveScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveScope")
            .field("owned", &self.inner.owned.borrow().len())
            .field("children", &self.inner.children.borrow().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
