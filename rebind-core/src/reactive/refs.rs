//! Ref Façade
//!
//! Refs decouple consumers from the cell behind them. A [`ReadonlyRef`] is a
//! getter; a [`Ref`] adds a setter and remembers the cell it came from. Both
//! are cheap to clone and compare by identity.
//!
//! Binding APIs accept `impl Into<ReadonlyRef<T>>`, so any ref kind (owned or
//! borrowed) can be passed where a read-only view is needed. [`MaybeRef`] is
//! the "either a plain value or some ref" input accepted by widgets.

use std::fmt;
use std::rc::Rc;

use super::context::ReactiveContext;
use super::scope::ReactiveScope;
use super::signal::{RefValue, SignalCell};
use crate::error::{ReactiveError, Result};

/// A read-only view: `get()` invokes the getter.
pub struct ReadonlyRef<T> {
    getter: Rc<dyn Fn() -> T>,
}

impl<T: 'static> ReadonlyRef<T> {
    /// Wrap an arbitrary getter. Reads inside it are tracked as usual.
    pub fn from_getter(getter: impl Fn() -> T + 'static) -> Self {
        Self {
            getter: Rc::new(getter),
        }
    }

    /// Current value. Tracked when called inside a computed ref or effect.
    pub fn get(&self) -> T {
        (self.getter)()
    }

    /// Current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        let _quiet = ReactiveContext::untracked();
        (self.getter)()
    }

    /// Whether both handles share the same getter.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.getter, &other.getter)
    }

    /// Type-erased handle usable as an explicit dependency.
    pub fn erase(&self) -> AnyRef {
        let getter = Rc::clone(&self.getter);
        AnyRef {
            track: Rc::new(move || {
                getter();
            }),
        }
    }
}

impl<T> Clone for ReadonlyRef<T> {
    fn clone(&self) -> Self {
        Self {
            getter: Rc::clone(&self.getter),
        }
    }
}

impl<T: 'static> PartialEq for ReadonlyRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> fmt::Debug for ReadonlyRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadonlyRef").finish_non_exhaustive()
    }
}

type Setter<T> = Rc<dyn Fn(T) -> Result<()>>;

/// A read-write ref: `set()` invokes the setter, which propagates the change
/// before returning.
pub struct Ref<T> {
    readonly: ReadonlyRef<T>,
    setter: Setter<T>,
    signal: Option<SignalCell<T>>,
}

impl<T: Clone + 'static> Ref<T> {
    /// Build a ref from arbitrary getter and setter closures.
    pub fn from_parts(
        getter: impl Fn() -> T + 'static,
        setter: impl Fn(T) -> Result<()> + 'static,
    ) -> Self {
        Self {
            readonly: ReadonlyRef::from_getter(getter),
            setter: Rc::new(setter),
            signal: None,
        }
    }

    /// Build a ref over a cell, keeping the cell for introspection.
    pub fn from_signal(signal: SignalCell<T>) -> Self {
        let reader = signal.clone();
        let writer = signal.clone();
        Self {
            readonly: ReadonlyRef::from_getter(move || reader.get()),
            setter: Rc::new(move |value| writer.set(value)),
            signal: Some(signal),
        }
    }

    pub fn get(&self) -> T {
        self.readonly.get()
    }

    pub fn get_untracked(&self) -> T {
        self.readonly.get_untracked()
    }

    /// Write through the setter. Dependents have re-run when this returns.
    pub fn set(&self, value: T) -> Result<()> {
        (self.setter)(value)
    }

    /// Read, modify, write back.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> Result<()> {
        let mut value = self.get_untracked();
        f(&mut value);
        self.set(value)
    }

    /// The cell this ref was created over, if any.
    pub fn signal(&self) -> Option<&SignalCell<T>> {
        self.signal.as_ref()
    }

    pub fn as_readonly(&self) -> &ReadonlyRef<T> {
        &self.readonly
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.readonly.ptr_eq(&other.readonly)
    }

    pub fn erase(&self) -> AnyRef {
        self.readonly.erase()
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            readonly: self.readonly.clone(),
            setter: Rc::clone(&self.setter),
            signal: self.signal.clone(),
        }
    }
}

impl<T: Clone + 'static> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}

/// A read-only ref with a human-readable description, returned for derived
/// values.
pub struct DescReadonlyRef<T> {
    readonly: ReadonlyRef<T>,
    desc: Rc<str>,
}

impl<T: 'static> DescReadonlyRef<T> {
    pub fn new(readonly: ReadonlyRef<T>, desc: impl Into<Rc<str>>) -> Self {
        Self {
            readonly,
            desc: desc.into(),
        }
    }

    pub fn get(&self) -> T {
        self.readonly.get()
    }

    pub fn get_untracked(&self) -> T {
        self.readonly.get_untracked()
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn as_readonly(&self) -> &ReadonlyRef<T> {
        &self.readonly
    }

    pub fn erase(&self) -> AnyRef {
        self.readonly.erase()
    }
}

impl<T> Clone for DescReadonlyRef<T> {
    fn clone(&self) -> Self {
        Self {
            readonly: self.readonly.clone(),
            desc: Rc::clone(&self.desc),
        }
    }
}

impl<T> fmt::Debug for DescReadonlyRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescReadonlyRef")
            .field("desc", &self.desc)
            .finish_non_exhaustive()
    }
}

impl<T> From<Ref<T>> for ReadonlyRef<T> {
    fn from(r: Ref<T>) -> Self {
        r.readonly
    }
}

impl<T> From<&Ref<T>> for ReadonlyRef<T> {
    fn from(r: &Ref<T>) -> Self {
        r.readonly.clone()
    }
}

impl<T> From<&ReadonlyRef<T>> for ReadonlyRef<T> {
    fn from(r: &ReadonlyRef<T>) -> Self {
        r.clone()
    }
}

impl<T> From<DescReadonlyRef<T>> for ReadonlyRef<T> {
    fn from(r: DescReadonlyRef<T>) -> Self {
        r.readonly
    }
}

impl<T> From<&DescReadonlyRef<T>> for ReadonlyRef<T> {
    fn from(r: &DescReadonlyRef<T>) -> Self {
        r.readonly.clone()
    }
}

/// A type-erased read-only ref, used for explicit dependency lists whose
/// members have different value types.
#[derive(Clone)]
pub struct AnyRef {
    track: Rc<dyn Fn()>,
}

impl AnyRef {
    /// Read the ref, discarding the value. Inside a tracking context this
    /// registers the dependency.
    pub fn track(&self) {
        (self.track)();
    }
}

impl fmt::Debug for AnyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyRef").finish_non_exhaustive()
    }
}

impl<T: 'static> From<&ReadonlyRef<T>> for AnyRef {
    fn from(r: &ReadonlyRef<T>) -> Self {
        r.erase()
    }
}

impl<T: Clone + 'static> From<&Ref<T>> for AnyRef {
    fn from(r: &Ref<T>) -> Self {
        r.erase()
    }
}

impl<T: 'static> From<&DescReadonlyRef<T>> for AnyRef {
    fn from(r: &DescReadonlyRef<T>) -> Self {
        r.erase()
    }
}

/// Anything that can serve as the explicit dependency list of `on`.
pub trait IntoDeps {
    fn into_deps(self) -> Vec<AnyRef>;
}

impl IntoDeps for AnyRef {
    fn into_deps(self) -> Vec<AnyRef> {
        vec![self]
    }
}

impl IntoDeps for Vec<AnyRef> {
    fn into_deps(self) -> Vec<AnyRef> {
        self
    }
}

impl IntoDeps for &[AnyRef] {
    fn into_deps(self) -> Vec<AnyRef> {
        self.to_vec()
    }
}

impl<const N: usize> IntoDeps for [AnyRef; N] {
    fn into_deps(self) -> Vec<AnyRef> {
        self.into()
    }
}

impl<T: 'static> IntoDeps for &ReadonlyRef<T> {
    fn into_deps(self) -> Vec<AnyRef> {
        vec![self.erase()]
    }
}

impl<T: Clone + 'static> IntoDeps for &Ref<T> {
    fn into_deps(self) -> Vec<AnyRef> {
        vec![self.erase()]
    }
}

impl<T: 'static> IntoDeps for &DescReadonlyRef<T> {
    fn into_deps(self) -> Vec<AnyRef> {
        vec![self.erase()]
    }
}

impl<A: Into<AnyRef>, B: Into<AnyRef>> IntoDeps for (A, B) {
    fn into_deps(self) -> Vec<AnyRef> {
        vec![self.0.into(), self.1.into()]
    }
}

impl<A: Into<AnyRef>, B: Into<AnyRef>, C: Into<AnyRef>> IntoDeps for (A, B, C) {
    fn into_deps(self) -> Vec<AnyRef> {
        vec![self.0.into(), self.1.into(), self.2.into()]
    }
}

/// Either a plain value or a ref to one.
pub enum MaybeRef<T> {
    Value(T),
    Ref(Ref<T>),
    Readonly(ReadonlyRef<T>),
}

impl<T: Clone + 'static> MaybeRef<T> {
    pub fn is_ref(&self) -> bool {
        !matches!(self, MaybeRef::Value(_))
    }

    /// The current value; reads through refs are tracked.
    pub fn get(&self) -> T {
        match self {
            MaybeRef::Value(value) => value.clone(),
            MaybeRef::Ref(r) => r.get(),
            MaybeRef::Readonly(r) => r.get(),
        }
    }

    /// Write through a writable ref, or replace a plain value.
    pub fn set(&mut self, value: T) -> Result<()> {
        match self {
            MaybeRef::Value(slot) => {
                *slot = value;
                Ok(())
            }
            MaybeRef::Ref(r) => r.set(value),
            MaybeRef::Readonly(_) => Err(ReactiveError::ReadOnly {
                desc: std::any::type_name::<T>().to_string(),
            }),
        }
    }

    /// A read-only view over whatever this holds.
    pub fn to_readonly(&self) -> ReadonlyRef<T> {
        match self {
            MaybeRef::Value(value) => {
                let value = value.clone();
                ReadonlyRef::from_getter(move || value.clone())
            }
            MaybeRef::Ref(r) => r.as_readonly().clone(),
            MaybeRef::Readonly(r) => r.clone(),
        }
    }
}

impl<T: Clone> Clone for MaybeRef<T> {
    fn clone(&self) -> Self {
        match self {
            MaybeRef::Value(value) => MaybeRef::Value(value.clone()),
            MaybeRef::Ref(r) => MaybeRef::Ref(r.clone()),
            MaybeRef::Readonly(r) => MaybeRef::Readonly(r.clone()),
        }
    }
}

/// Plain values compare by value, refs by identity.
impl<T: Clone + PartialEq + 'static> PartialEq for MaybeRef<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MaybeRef::Value(a), MaybeRef::Value(b)) => a == b,
            (MaybeRef::Ref(a), MaybeRef::Ref(b)) => a.ptr_eq(b),
            (MaybeRef::Readonly(a), MaybeRef::Readonly(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for MaybeRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaybeRef::Value(value) => f.debug_tuple("Value").field(value).finish(),
            MaybeRef::Ref(r) => f.debug_tuple("Ref").field(r).finish(),
            MaybeRef::Readonly(r) => f.debug_tuple("Readonly").field(r).finish(),
        }
    }
}

impl<T> From<Ref<T>> for MaybeRef<T> {
    fn from(r: Ref<T>) -> Self {
        MaybeRef::Ref(r)
    }
}

impl<T> From<ReadonlyRef<T>> for MaybeRef<T> {
    fn from(r: ReadonlyRef<T>) -> Self {
        MaybeRef::Readonly(r)
    }
}

impl<T> From<DescReadonlyRef<T>> for MaybeRef<T> {
    fn from(r: DescReadonlyRef<T>) -> Self {
        MaybeRef::Readonly(r.readonly)
    }
}

/// Lift into a ref: refs come back unchanged, plain values get a new cell in
/// `scope`.
pub fn to_ref<T: RefValue>(scope: &ReactiveScope, maybe: impl Into<MaybeRef<T>>) -> MaybeRef<T> {
    match maybe.into() {
        MaybeRef::Value(value) => MaybeRef::Ref(scope.create_ref(value)),
        existing => existing,
    }
}

/// Unwrap to a plain value.
pub fn to_value<T: Clone + 'static>(maybe: &MaybeRef<T>) -> T {
    maybe.get()
}

/// Whether `maybe` holds a ref (read-only or writable).
pub fn is_ref<T: Clone + 'static>(maybe: &MaybeRef<T>) -> bool {
    maybe.is_ref()
}
