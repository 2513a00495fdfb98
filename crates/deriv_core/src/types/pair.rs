//! Ordered (output, input) pair keys.

use std::fmt;

/// An ordered (output-name, input-name) tuple identifying one Jacobian block.
///
/// Unique within a component's local namespace for partials, or within the
/// model's promoted/absolute namespace for totals.
///
/// # Examples
/// ```
/// use deriv_core::types::PairKey;
///
/// let pair = PairKey::new("y", "x1");
/// assert_eq!(format!("{}", pair), "('y', 'x1')");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PairKey {
    /// Output (or response) name.
    pub of: String,
    /// Input (or design-variable) name.
    pub wrt: String,
}

impl PairKey {
    /// Creates a pair key.
    pub fn new(of: impl Into<String>, wrt: impl Into<String>) -> Self {
        Self {
            of: of.into(),
            wrt: wrt.into(),
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "('{}', '{}')", self.of, self.wrt)
    }
}
