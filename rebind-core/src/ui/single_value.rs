//! Single-Value Bindable Adapter
//!
//! Input-like elements (text fields, sliders, date pickers) carry one value.
//! [`SingleValueBindableUi`] owns that value as a ref and adds the bindings
//! that move it in and out of the element.

use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::bindable::BindableUi;
use super::element::{UiElement, UiEventArguments};
use crate::error::Result;
use crate::reactive::{to_ref, MaybeRef, ReactiveScope, ReadonlyRef, Ref, RefValue};

/// A [`BindableUi`] that also owns the element's value.
///
/// Dereferences to the underlying adapter, so every `BindableUi` method is
/// available.
pub struct SingleValueBindableUi<T, E: UiElement> {
    base: BindableUi<E>,
    value: MaybeRef<T>,
}

impl<T: RefValue, E: UiElement> SingleValueBindableUi<T, E> {
    /// Plain values are lifted into a new ref; refs are used as-is.
    pub fn new(scope: &ReactiveScope, value: impl Into<MaybeRef<T>>, element: E) -> Self {
        Self {
            value: to_ref(scope, value),
            base: BindableUi::new(scope, element),
        }
    }

    /// Current value, tracked when read inside a computation.
    pub fn value(&self) -> T {
        self.value.get()
    }

    /// A read-only view of the owned value.
    pub fn value_ref(&self) -> ReadonlyRef<T> {
        self.value.to_readonly()
    }

    /// Write through the owned ref.
    pub fn set_value(&mut self, value: T) -> Result<()> {
        self.value.set(value)
    }

    /// Mirror the owned value into `target`.
    pub fn bind_ref(&mut self, target: &Ref<T>) -> Result<&mut Self> {
        let (source, target) = (self.value.clone(), target.clone());
        self.base.scope().try_effect(move || target.set(source.get()))?;
        Ok(self)
    }

    /// Mirror `source` into the owned value.
    ///
    /// Fails with `ReadOnly` when the owned value is a read-only ref.
    pub fn bind_value(&mut self, source: impl Into<ReadonlyRef<T>>) -> Result<&mut Self> {
        let source = source.into();
        let mut owned = self.value.clone();
        self.base.scope().try_effect(move || owned.set(source.get()))?;
        Ok(self)
    }
}

impl<T, E> SingleValueBindableUi<T, E>
where
    T: RefValue + Serialize + DeserializeOwned + Default,
    E: UiElement,
{
    /// Like [`BindableUi::bind_prop`], except that `"value"` binds the owned
    /// value. The source is converted to `T` through its JSON form.
    pub fn bind_prop<U>(
        &mut self,
        prop: &str,
        source: impl Into<ReadonlyRef<U>>,
    ) -> Result<&mut Self>
    where
        U: Serialize + Clone + 'static,
    {
        if prop != "value" {
            self.base.bind_prop(prop, source)?;
            return Ok(self);
        }

        let source = source.into();
        let mut owned = self.value.clone();
        self.base.scope().try_effect(move || {
            let value: T = serde_json::from_value(serde_json::to_value(source.get())?)?;
            owned.set(value)
        })?;
        Ok(self)
    }

    /// Two-way binding between the owned value and an element property.
    ///
    /// The value is written into `prop`; every `event` writes its first
    /// argument back. A `null` argument resets the value to `T::default()`.
    pub fn sync_model(&mut self, prop: &str, event: &str) -> Result<&mut Self> {
        self.base.bind_prop(prop, self.value.to_readonly())?;

        let mut owned = self.value.clone();
        let event_name = event.to_string();
        self.base.on(event, move |e: &UiEventArguments| {
            let payload = match &e.args {
                Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
                other => other.clone(),
            };
            let next = if payload.is_null() {
                T::default()
            } else {
                match serde_json::from_value(payload) {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(
                            sender = %e.sender,
                            event = %event_name,
                            %err,
                            "dropping malformed model update"
                        );
                        return;
                    }
                }
            };
            if let Err(err) = owned.set(next) {
                warn!(sender = %e.sender, event = %event_name, %err, "model update failed");
            }
        });
        Ok(self)
    }
}

impl<T, E: UiElement> Deref for SingleValueBindableUi<T, E> {
    type Target = BindableUi<E>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<T, E: UiElement> DerefMut for SingleValueBindableUi<T, E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

impl<T: fmt::Debug, E: UiElement> fmt::Debug for SingleValueBindableUi<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleValueBindableUi")
            .field("base", &self.base)
            .field("value", &self.value)
            .finish()
    }
}
