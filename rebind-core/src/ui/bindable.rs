//! Bindable UI Adapter
//!
//! [`BindableUi`] wraps one element and turns refs into element state. Each
//! `bind_*` call creates an effect in the adapter's own child scope, so
//! dropping or disposing the adapter detaches it from every ref it was bound
//! to.

use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::element::{Edit, EventOptions, Slot, UiElement, UiEventArguments};
use crate::error::Result;
use crate::reactive::{ReactiveScope, ReadonlyRef};

/// JavaScript-style truthiness, used when a non-boolean ref drives visibility.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Truthiness of a bound value. A value that cannot be serialized hides the
/// element.
fn truthy_or_hidden<T: Serialize>(value: &T) -> bool {
    match serde_json::to_value(value) {
        Ok(value) => is_truthy(&value),
        Err(err) => {
            warn!(%err, "visibility value could not be serialized, hiding element");
            false
        }
    }
}

/// Borrow the element for a write issued by an effect or handler.
///
/// A write that arrives while the element is already borrowed (the host is
/// calling into us from inside one of its own methods) is dropped with a
/// warning.
pub(crate) fn with_element<E: UiElement, R>(
    element: &Rc<RefCell<E>>,
    f: impl FnOnce(&mut E) -> R,
) -> Option<R> {
    match element.try_borrow_mut() {
        Ok(mut el) => Some(f(&mut el)),
        Err(_) => {
            warn!("element is busy, dropping reactive write");
            None
        }
    }
}

/// Adapter that binds refs to one element.
///
/// Mutators return `&mut Self` for chaining:
///
/// ```rust,ignore
/// label
///     .classes(Edit::add("text-lg"))
///     .bind_prop("text", &title)?
///     .bind_not_visible(&hidden)?;
/// ```
pub struct BindableUi<E: UiElement> {
    element: Rc<RefCell<E>>,
    scope: ReactiveScope,
}

impl<E: UiElement> BindableUi<E> {
    /// Wrap `element`. Bindings live in a child of `scope`.
    pub fn new(scope: &ReactiveScope, element: E) -> Self {
        Self::from_shared(scope, Rc::new(RefCell::new(element)))
    }

    /// Wrap an element that is also held elsewhere.
    pub fn from_shared(scope: &ReactiveScope, element: Rc<RefCell<E>>) -> Self {
        Self {
            element,
            scope: scope.child(),
        }
    }

    pub fn element(&self) -> std::cell::Ref<'_, E> {
        self.element.borrow()
    }

    pub fn element_mut(&self) -> RefMut<'_, E> {
        self.element.borrow_mut()
    }

    pub(crate) fn shared_element(&self) -> &Rc<RefCell<E>> {
        &self.element
    }

    /// The scope owning this adapter's bindings.
    pub fn scope(&self) -> &ReactiveScope {
        &self.scope
    }

    /// Keep the named property equal to `source`'s value.
    ///
    /// `"visible"` binds visibility instead. `"text"` on an element with a
    /// text capability also notifies it of every change.
    pub fn bind_prop<T>(
        &mut self,
        prop: &str,
        source: impl Into<ReadonlyRef<T>>,
    ) -> Result<&mut Self>
    where
        T: Serialize + Clone + 'static,
    {
        let source = source.into();

        if prop == "visible" {
            let visible = ReadonlyRef::from_getter(move || truthy_or_hidden(&source.get()));
            return self.bind_visible(visible);
        }

        let has_text = self.element.borrow_mut().as_text_element().is_some();
        if prop == "text" && has_text {
            let (element, source) = (Rc::clone(&self.element), source.clone());
            self.scope.try_effect(move || {
                let text = match serde_json::to_value(source.get())? {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                with_element(&element, |el| {
                    if let Some(text_el) = el.as_text_element() {
                        text_el.on_text_change(&text);
                    }
                });
                Ok(())
            })?;
        }

        let element = Rc::clone(&self.element);
        let name = prop.to_string();
        self.scope.try_effect(move || {
            let value = serde_json::to_value(source.get())?;
            with_element(&element, |el| -> Result<()> {
                el.set_prop(&name, value)?;
                el.update();
                Ok(())
            })
            .unwrap_or(Ok(()))
        })?;

        debug!(element = %self.element.borrow().id(), prop, "bound property");
        Ok(self)
    }

    /// Keep the element's visibility equal to `source`.
    pub fn bind_visible(&mut self, source: impl Into<ReadonlyRef<bool>>) -> Result<&mut Self> {
        let source = source.into();
        let element = Rc::clone(&self.element);
        self.scope.effect(move || {
            let visible = source.get();
            with_element(&element, |el| el.set_visibility(visible));
        })?;
        Ok(self)
    }

    /// Hide the element while `source` is true.
    pub fn bind_not_visible(&mut self, source: impl Into<ReadonlyRef<bool>>) -> Result<&mut Self> {
        let source = source.into();
        let hidden = self
            .scope
            .computed()
            .desc("not visible")
            .build(move || !source.get())?;
        self.bind_visible(hidden)
    }

    /// Register an event handler with default delivery options.
    pub fn on(
        &mut self,
        event: &str,
        handler: impl FnMut(&UiEventArguments) + 'static,
    ) -> &mut Self {
        self.on_with(event, handler, None, EventOptions::default())
    }

    pub fn on_with(
        &mut self,
        event: &str,
        handler: impl FnMut(&UiEventArguments) + 'static,
        args: Option<&[&str]>,
        options: EventOptions,
    ) -> &mut Self {
        self.element.borrow_mut().on(event, Box::new(handler), args, options);
        self
    }

    pub fn props(&mut self, edit: Edit<'_>) -> &mut Self {
        self.element.borrow_mut().props(edit);
        self
    }

    pub fn classes(&mut self, edit: Edit<'_>) -> &mut Self {
        self.element.borrow_mut().classes(edit);
        self
    }

    pub fn style(&mut self, edit: Edit<'_>) -> &mut Self {
        self.element.borrow_mut().style(edit);
        self
    }

    pub fn tooltip(&mut self, text: &str) -> &mut Self {
        self.element.borrow_mut().tooltip(text);
        self
    }

    pub fn add_slot(&mut self, name: &str, template: Option<&str>) -> Slot {
        self.element.borrow_mut().add_slot(name, template)
    }

    pub fn clear(&mut self) {
        self.element.borrow_mut().clear();
    }

    /// Detach every binding this adapter created. The element keeps its last
    /// state.
    pub fn dispose(&self) {
        self.scope.dispose();
    }
}

impl<E: UiElement> Drop for BindableUi<E> {
    fn drop(&mut self) {
        self.scope.dispose();
    }
}

impl<E: UiElement> fmt::Debug for BindableUi<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("BindableUi");
        if let Ok(el) = self.element.try_borrow() {
            s.field("element", &el.id());
        }
        s.field("scope", &self.scope).finish()
    }
}
