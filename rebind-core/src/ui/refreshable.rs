//! Effect-Refreshable Views
//!
//! A refreshable view re-renders a container whenever its inputs change. The
//! first run renders into the empty container; every later run clears the
//! container and renders again in place.
//!
//! Each render receives a fresh child scope. Whatever the previous render
//! created in its scope (bindings, nested views) is disposed before the next
//! render starts, so old subtrees stop reacting.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::trace;

use super::bindable::with_element;
use super::element::UiElement;
use crate::error::Result;
use crate::reactive::{AnyRef, Effect, IntoDeps, ReactiveScope};

/// Lifecycle of a refreshable view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Uninitialized,
    /// Rendered once.
    Mounted,
    /// Re-rendered at least once.
    Refreshed,
}

/// A container re-rendered by an effect.
///
/// Dropping the handle leaves the view live until its scope is disposed.
pub struct EffectRefreshable<E: UiElement> {
    container: Rc<RefCell<E>>,
    state: Rc<Cell<RefreshState>>,
    scope: ReactiveScope,
    effect: Effect,
}

impl<E: UiElement> EffectRefreshable<E> {
    /// Render `container` now, and again whenever one of `refs` changes.
    ///
    /// With an empty `refs` list every ref the render function reads is
    /// tracked instead.
    pub fn new(
        scope: &ReactiveScope,
        container: E,
        refs: Vec<AnyRef>,
        mut render: impl FnMut(&ReactiveScope, &mut E) -> Result<()> + 'static,
    ) -> Result<Self> {
        let owner = scope.child();
        let container = Rc::new(RefCell::new(container));
        let state = Rc::new(Cell::new(RefreshState::Uninitialized));

        let runner = {
            let weak_owner = owner.downgrade();
            let container = Rc::clone(&container);
            let state = Rc::clone(&state);
            let mut current: Option<ReactiveScope> = None;

            move || -> Result<()> {
                let Some(owner) = weak_owner.upgrade() else {
                    return Ok(());
                };
                if let Some(previous) = current.take() {
                    previous.dispose();
                }
                let render_scope = owner.child();
                current = Some(render_scope.clone());

                with_element(&container, |el| -> Result<()> {
                    match state.get() {
                        RefreshState::Uninitialized => {
                            render(&render_scope, el)?;
                            state.set(RefreshState::Mounted);
                        }
                        RefreshState::Mounted | RefreshState::Refreshed => {
                            trace!(container = %el.id(), "refreshing view");
                            el.clear();
                            render(&render_scope, el)?;
                            el.update();
                            state.set(RefreshState::Refreshed);
                        }
                    }
                    Ok(())
                })
                .unwrap_or(Ok(()))
            }
        };

        let effect = if refs.is_empty() {
            owner.try_effect(runner)?
        } else {
            owner.try_on(refs, runner)?
        };

        Ok(Self {
            container,
            state,
            scope: owner,
            effect,
        })
    }

    /// Start a view that refreshes on explicit dependencies:
    ///
    /// ```rust,ignore
    /// EffectRefreshable::on((&rows, &filter)).render(&scope, table, |scope, table| {
    ///     // ...
    ///     Ok(())
    /// })?;
    /// ```
    pub fn on(refs: impl IntoDeps) -> RefreshOn<E> {
        RefreshOn {
            refs: refs.into_deps(),
            _element: PhantomData,
        }
    }

    pub fn state(&self) -> RefreshState {
        self.state.get()
    }

    pub fn container(&self) -> std::cell::Ref<'_, E> {
        self.container.borrow()
    }

    pub fn effect(&self) -> &Effect {
        &self.effect
    }

    /// The scope owning the refresh effect and every render's scope.
    pub fn scope(&self) -> &ReactiveScope {
        &self.scope
    }

    /// Stop refreshing and dispose the current render's scope.
    pub fn dispose(&self) {
        self.scope.dispose();
    }
}

impl<E: UiElement> fmt::Debug for EffectRefreshable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRefreshable")
            .field("state", &self.state.get())
            .field("effect", &self.effect)
            .finish()
    }
}

/// Explicit dependency list waiting for a render function.
pub struct RefreshOn<E> {
    refs: Vec<AnyRef>,
    _element: PhantomData<fn() -> E>,
}

impl<E: UiElement> RefreshOn<E> {
    pub fn render(
        self,
        scope: &ReactiveScope,
        container: E,
        render: impl FnMut(&ReactiveScope, &mut E) -> Result<()> + 'static,
    ) -> Result<EffectRefreshable<E>> {
        EffectRefreshable::new(scope, container, self.refs, render)
    }
}
