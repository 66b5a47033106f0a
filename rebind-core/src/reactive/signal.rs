//! Signal Cell Implementation
//!
//! A signal cell is the fundamental reactive primitive. It holds a value and
//! a comparison policy, and reports reads and changes to the runtime.
//!
//! # How Cells Work
//!
//! 1. When a cell is read within a reactive context (computed ref or effect),
//!    it records itself as a dependency of that context.
//!
//! 2. When a cell is written, the comparison policy decides whether the value
//!    changed. Only a change reaches the runtime.
//!
//! 3. The runtime re-runs every computation that read the cell, before `set`
//!    returns.
//!
//! # Comparison Policies
//!
//! Scalars (strings, numbers, booleans) compare by value, so writing the same
//! value twice is a no-op. Composite values are not compared at all: every
//! write counts as a change, because deep equality is not assumed. The policy
//! is picked statically through [`RefValue`].

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::{self, Debug};
use std::rc::Rc;

use tracing::trace;

use super::context::ReactiveContext;
use super::runtime::WeakRuntime;
use super::CellId;
use crate::error::Result;

/// Decides whether a write counts as a change.
pub struct Comparison<T> {
    /// Returns true when the two values are equal. `None` means every write
    /// is a change.
    equal: Option<Rc<dyn Fn(&T, &T) -> bool>>,
}

impl<T> Comparison<T> {
    /// Every write notifies dependents.
    pub fn always() -> Self {
        Self { equal: None }
    }

    /// Writes equal to the current value (per `equal`) are ignored.
    pub fn by(equal: impl Fn(&T, &T) -> bool + 'static) -> Self {
        Self {
            equal: Some(Rc::new(equal)),
        }
    }

    pub fn is_always(&self) -> bool {
        self.equal.is_none()
    }

    /// Whether replacing `old` with `new` should notify dependents.
    pub fn is_change(&self, old: &T, new: &T) -> bool {
        match &self.equal {
            Some(equal) => !equal(old, new),
            None => true,
        }
    }
}

impl<T: PartialEq + 'static> Comparison<T> {
    /// Writes equal to the current value are ignored.
    pub fn equal() -> Self {
        Self::by(|a: &T, b: &T| a == b)
    }
}

impl<T> Clone for Comparison<T> {
    fn clone(&self) -> Self {
        Self {
            equal: self.equal.clone(),
        }
    }
}

impl<T> Debug for Comparison<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_always() { "Always" } else { "Equal" })
    }
}

/// A value that can live in a ref created by `create_ref`.
///
/// The default policy is [`Comparison::always`]; scalar types override it
/// with value equality. Implement it (usually with an empty body) for your own
/// composite types.
pub trait RefValue: Clone + 'static {
    fn comparison() -> Comparison<Self> {
        Comparison::always()
    }
}

macro_rules! scalar_ref_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl RefValue for $ty {
                fn comparison() -> Comparison<Self> {
                    Comparison::equal()
                }
            }
        )*
    };
}

scalar_ref_value!(
    bool, char, String, &'static str, Rc<str>,
    i8, i16, i32, i64, i128, isize,
    u8, u16, u32, u64, u128, usize,
    f32, f64,
);

impl RefValue for () {}
impl RefValue for serde_json::Value {}
impl<T: Clone + 'static> RefValue for Option<T> {}
impl<T: Clone + 'static> RefValue for Vec<T> {}
impl<K: Clone + 'static, V: Clone + 'static> RefValue for HashMap<K, V> {}
impl<K: Clone + 'static, V: Clone + 'static> RefValue for BTreeMap<K, V> {}
impl<T: Clone + 'static> RefValue for HashSet<T> {}
impl<T: Clone + 'static> RefValue for BTreeSet<T> {}

/// An observable value holder.
///
/// Cloning yields another handle to the same cell.
pub struct SignalCell<T> {
    id: CellId,
    value: Rc<RefCell<T>>,
    comparison: Comparison<T>,
    runtime: WeakRuntime,
}

impl<T: Clone + 'static> SignalCell<T> {
    /// Create a cell bound to a runtime.
    pub fn new(runtime: WeakRuntime, value: T, comparison: Comparison<T>) -> Self {
        Self {
            id: CellId::new(),
            value: Rc::new(RefCell::new(value)),
            comparison,
            runtime,
        }
    }

    /// Get the cell's unique ID.
    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn comparison(&self) -> &Comparison<T> {
        &self.comparison
    }

    /// Get the current value, registering the read with the active context.
    pub fn get(&self) -> T {
        ReactiveContext::track_dependency(self.id);
        self.value.borrow().clone()
    }

    /// Get the current value without tracking.
    pub fn get_untracked(&self) -> T {
        self.value.borrow().clone()
    }

    /// Borrow the current value, registering the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        ReactiveContext::track_dependency(self.id);
        f(&self.value.borrow())
    }

    /// Write a value and propagate if the comparison policy sees a change.
    pub fn set(&self, value: T) -> Result<()> {
        let changed = self.comparison.is_change(&self.value.borrow(), &value);
        if !changed {
            trace!(cell = %self.id, "write ignored, value unchanged");
            return Ok(());
        }

        *self.value.borrow_mut() = value;
        self.trigger()
    }

    /// Modify the value in place and propagate.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> Result<()> {
        let mut next = self.get_untracked();
        f(&mut next);
        self.set(next)
    }

    /// Notify dependents without changing the value.
    pub fn trigger(&self) -> Result<()> {
        match self.runtime.upgrade() {
            Some(runtime) => runtime.notify_cell_change(self.id),
            None => Ok(()),
        }
    }

    /// Get the number of computations reading this cell.
    pub fn subscriber_count(&self) -> usize {
        self.runtime
            .upgrade()
            .map_or(0, |runtime| runtime.dependent_count(self.id))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }
}

impl<T> Clone for SignalCell<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Rc::clone(&self.value),
            comparison: self.comparison.clone(),
            runtime: self.runtime.clone(),
        }
    }
}

impl<T: Debug> Debug for SignalCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalCell")
            .field("id", &self.id)
            .field("value", &*self.value.borrow())
            .field("comparison", &self.comparison)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::reactive::runtime::Runtime;
    use crate::reactive::SubscriberId;

    fn cell<T: RefValue>(runtime: &Runtime, value: T) -> SignalCell<T> {
        SignalCell::new(runtime.downgrade(), value, T::comparison())
    }

    #[test]
    fn cell_get_and_set() {
        let runtime = Runtime::default();
        let signal = cell(&runtime, 0);
        assert_eq!(signal.get(), 0);

        signal.set(42).unwrap();
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn cell_update() {
        let runtime = Runtime::default();
        let signal = cell(&runtime, vec![1, 2]);
        signal.update(|v| v.push(3)).unwrap();
        assert_eq!(signal.get(), vec![1, 2, 3]);
    }

    #[test]
    fn scalars_compare_by_value() {
        assert!(!i32::comparison().is_change(&3, &3));
        assert!(i32::comparison().is_change(&3, &4));
        assert!(!String::comparison().is_change(&"a".to_string(), &"a".to_string()));
        assert!(!bool::comparison().is_change(&true, &true));
    }

    #[test]
    fn composites_always_change() {
        assert!(Vec::<i32>::comparison().is_change(&vec![1], &vec![1]));
        assert!(Option::<i32>::comparison().is_change(&None, &None));
        let empty = serde_json::json!({});
        assert!(serde_json::Value::comparison().is_change(&empty, &empty.clone()));
    }

    #[test]
    fn read_registers_with_context() {
        let runtime = Runtime::default();
        let signal = cell(&runtime, 1);

        let ctx = ReactiveContext::enter(SubscriberId::new());
        signal.get();
        assert_eq!(ctx.finish().as_slice(), &[signal.id()]);

        let ctx = ReactiveContext::enter(SubscriberId::new());
        signal.get_untracked();
        assert!(ctx.finish().is_empty());
    }

    #[test]
    fn custom_comparison_is_used() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let runtime = Runtime::default();
        let signal = SignalCell::new(
            runtime.downgrade(),
            1.0_f64,
            Comparison::by(move |a: &f64, b: &f64| {
                seen.set(seen.get() + 1);
                (a - b).abs() < 0.5
            }),
        );

        signal.set(1.2).unwrap();
        assert_eq!(signal.get(), 1.0);
        signal.set(2.0).unwrap();
        assert_eq!(signal.get(), 2.0);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn clone_shares_state() {
        let runtime = Runtime::default();
        let signal1 = cell(&runtime, 0);
        let signal2 = signal1.clone();

        signal1.set(42).unwrap();
        assert_eq!(signal2.get(), 42);
        assert!(signal1.ptr_eq(&signal2));
        assert_eq!(signal1.id(), signal2.id());
    }

    #[test]
    fn set_without_runtime_still_stores() {
        let signal = {
            let runtime = Runtime::default();
            cell(&runtime, 1)
        };
        signal.set(2).unwrap();
        assert_eq!(signal.get(), 2);
        assert_eq!(signal.subscriber_count(), 0);
    }
}
