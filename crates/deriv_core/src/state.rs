//! Live numerical state and scoped snapshot/restore.
//!
//! [`Values`] is the array store shared by the model runtime and the
//! verification engine; [`ModelState`] adds the complex-preallocation flag
//! consulted before any complex-step sweep. [`StateGuard`] gives the engine
//! temporary, exclusive write access to a set of arrays and restores the
//! captured values on every exit path, including early returns and panics.

use std::collections::BTreeMap;

use num_complex::Complex64;
use num_traits::Zero;

use crate::types::CheckError;

/// Named array store over an element type (real by default, complex for
/// complex-step sweeps).
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Values<T = f64> {
    arrays: BTreeMap<String, Vec<T>>,
}

impl<T> Values<T> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            arrays: BTreeMap::new(),
        }
    }

    /// Inserts or replaces an array.
    pub fn insert(&mut self, name: impl Into<String>, data: Vec<T>) {
        self.arrays.insert(name.into(), data);
    }

    /// Immutable view of a named array.
    ///
    /// # Errors
    /// [`CheckError::UnknownVariable`] when the name is absent.
    pub fn get(&self, name: &str) -> Result<&[T], CheckError> {
        self.arrays
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| CheckError::UnknownVariable {
                name: name.to_string(),
            })
    }

    /// Mutable view of a named array.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Vec<T>, CheckError> {
        self.arrays
            .get_mut(name)
            .ok_or_else(|| CheckError::UnknownVariable {
                name: name.to_string(),
            })
    }

    /// Whether an array with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }

    /// Iterates array names in deterministic (sorted) order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    /// Iterates `(name, array)` entries in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.arrays.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of stored arrays.
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}

impl<T: Clone + Zero> Values<T> {
    /// A store with the same names and lengths, zero-filled.
    pub fn zeros_like(&self) -> Values<T> {
        let arrays = self
            .arrays
            .iter()
            .map(|(k, v)| (k.clone(), vec![T::zero(); v.len()]))
            .collect();
        Values { arrays }
    }
}

impl Values<f64> {
    /// A complex mirror of this store with zero imaginary parts.
    pub fn to_complex(&self) -> Values<Complex64> {
        let arrays = self
            .arrays
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    v.iter().map(|&x| Complex64::new(x, 0.0)).collect(),
                )
            })
            .collect();
        Values { arrays }
    }
}

/// The live numerical state of an instrumented model.
///
/// Owned by the model runtime; the verification engine only takes scoped
/// write access through [`StateGuard`]. The `alloc_complex` flag records
/// whether complex-capable storage was requested at build time; complex-step
/// checks fail fast without it.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelState {
    values: Values<f64>,
    alloc_complex: bool,
}

impl ModelState {
    /// Wraps an array store, recording the complex-preallocation choice.
    pub fn new(values: Values<f64>, alloc_complex: bool) -> Self {
        Self {
            values,
            alloc_complex,
        }
    }

    /// Whether complex-capable storage was preallocated.
    pub fn alloc_complex(&self) -> bool {
        self.alloc_complex
    }

    /// The underlying arrays.
    pub fn values(&self) -> &Values<f64> {
        &self.values
    }

    /// Mutable access to the underlying arrays.
    pub fn values_mut(&mut self) -> &mut Values<f64> {
        &mut self.values
    }

    /// Immutable view of a named array.
    pub fn get(&self, name: &str) -> Result<&[f64], CheckError> {
        self.values.get(name)
    }
}

/// Scoped snapshot/restore over a subset of a [`Values`] store.
///
/// Captures the named arrays on construction and restores them when dropped,
/// so a perturbation sweep can never leak corrupted state to its caller.
/// [`StateGuard::restore`] additionally restores mid-scope, which the
/// approximator uses between columns.
///
/// # Examples
/// ```
/// use deriv_core::state::{StateGuard, Values};
///
/// let mut values = Values::new();
/// values.insert("x", vec![3.0]);
/// {
///     let mut guard = StateGuard::capture(&mut values, &["x".to_string()]).unwrap();
///     guard.values_mut().get_mut("x").unwrap()[0] = 99.0;
/// }
/// assert_eq!(values.get("x").unwrap(), &[3.0]);
/// ```
pub struct StateGuard<'a, T: Clone = f64> {
    target: &'a mut Values<T>,
    saved: Vec<(String, Vec<T>)>,
}

impl<'a, T: Clone> StateGuard<'a, T> {
    /// Captures the named arrays for guaranteed restoration.
    ///
    /// # Errors
    /// [`CheckError::UnknownVariable`] when any name is absent.
    pub fn capture(target: &'a mut Values<T>, names: &[String]) -> Result<Self, CheckError> {
        let mut saved = Vec::with_capacity(names.len());
        for name in names {
            let data = target.get(name)?.to_vec();
            saved.push((name.clone(), data));
        }
        Ok(Self { target, saved })
    }

    /// Captures every array in the store.
    pub fn capture_all(target: &'a mut Values<T>) -> Self {
        let saved = target
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_vec()))
            .collect();
        Self { target, saved }
    }

    /// The guarded store.
    pub fn values(&self) -> &Values<T> {
        self.target
    }

    /// Mutable access to the guarded store.
    pub fn values_mut(&mut self) -> &mut Values<T> {
        self.target
    }

    /// Restores the captured arrays now, keeping the guard armed.
    pub fn restore(&mut self) {
        for (name, data) in &self.saved {
            if let Some(slot) = self.target.arrays.get_mut(name) {
                slot.clone_from(data);
            }
        }
    }
}

impl<T: Clone> Drop for StateGuard<'_, T> {
    fn drop(&mut self) {
        self.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn state_with(x: f64, y: f64) -> Values {
        let mut v = Values::new();
        v.insert("x", vec![x]);
        v.insert("y", vec![y]);
        v
    }

    #[test]
    fn test_values_get_unknown() {
        let v: Values = Values::new();
        assert!(matches!(
            v.get("missing"),
            Err(CheckError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn test_values_deterministic_order() {
        let mut v = Values::new();
        v.insert("b", vec![2.0]);
        v.insert("a", vec![1.0]);
        let names: Vec<&str> = v.names().collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_zeros_like() {
        let v = state_with(3.0, 5.0);
        let z = v.zeros_like();
        assert_eq!(z.get("x").unwrap(), &[0.0]);
        assert_eq!(z.get("y").unwrap(), &[0.0]);
    }

    #[test]
    fn test_to_complex() {
        let v = state_with(3.0, 5.0);
        let c = v.to_complex();
        assert_eq!(c.get("x").unwrap()[0].re, 3.0);
        assert_eq!(c.get("x").unwrap()[0].im, 0.0);
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let mut v = state_with(3.0, 5.0);
        {
            let mut guard = StateGuard::capture(&mut v, &["x".to_string()]).unwrap();
            guard.values_mut().get_mut("x").unwrap()[0] = 100.0;
        }
        assert_eq!(v.get("x").unwrap(), &[3.0]);
        assert_eq!(v.get("y").unwrap(), &[5.0]);
    }

    #[test]
    fn test_guard_restore_mid_scope() {
        let mut v = state_with(3.0, 5.0);
        let mut guard = StateGuard::capture(&mut v, &["x".to_string()]).unwrap();
        guard.values_mut().get_mut("x").unwrap()[0] = 100.0;
        guard.restore();
        assert_eq!(guard.values().get("x").unwrap(), &[3.0]);
    }

    #[test]
    fn test_guard_restores_on_panic() {
        let mut v = state_with(3.0, 5.0);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut guard = StateGuard::capture_all(&mut v);
            guard.values_mut().get_mut("x").unwrap()[0] = 100.0;
            panic!("evaluation blew up");
        }));
        assert!(result.is_err());
        assert_eq!(v.get("x").unwrap(), &[3.0]);
    }

    #[test]
    fn test_guard_restore_is_bit_exact() {
        let exact: f64 = 0.1 + 0.2; // not representable as 0.3
        let mut v = Values::new();
        v.insert("x", vec![exact]);
        {
            let mut guard = StateGuard::capture_all(&mut v);
            guard.values_mut().get_mut("x").unwrap()[0] = 7.0;
        }
        assert_eq!(v.get("x").unwrap()[0].to_bits(), exact.to_bits());
    }

    #[test]
    fn test_guard_capture_unknown_name() {
        let mut v = state_with(3.0, 5.0);
        assert!(StateGuard::capture(&mut v, &["z".to_string()]).is_err());
    }

    #[test]
    fn test_model_state_flags() {
        let state = ModelState::new(state_with(1.0, 2.0), true);
        assert!(state.alloc_complex());
        assert_eq!(state.get("x").unwrap(), &[1.0]);
    }

    proptest! {
        #[test]
        fn prop_guard_restore_round_trips_any_array(
            data in proptest::collection::vec(proptest::num::f64::ANY, 1..16),
            scribble in proptest::num::f64::ANY,
        ) {
            let mut v = Values::new();
            v.insert("x", data.clone());
            {
                let mut guard = StateGuard::capture_all(&mut v);
                for slot in guard.values_mut().get_mut("x").unwrap().iter_mut() {
                    *slot = scribble;
                }
            }
            // bitwise comparison so NaN payloads and signed zeros count too
            let restored = v.get("x").unwrap();
            prop_assert_eq!(restored.len(), data.len());
            for (a, b) in restored.iter().zip(&data) {
                prop_assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }
}
