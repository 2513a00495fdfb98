//! Error types for structured error handling.
//!
//! This module provides [`CheckError`], the single error taxonomy shared by
//! the model interface and the verification engine.
//!
//! Two failure classes matter here:
//! - configuration errors (fatal, surfaced immediately): complex-step without
//!   complex preallocation, shape mismatches between blocks;
//! - structural conditions (not errors): a missing analytic capability or a
//!   negligible declared-non-dependent pair, which are handled by the report
//!   inclusion rules and never reach this type.

use thiserror::Error;

/// Categorised errors raised while checking derivatives.
///
/// # Examples
/// ```
/// use deriv_core::types::CheckError;
///
/// let err = CheckError::ComplexNotAllocated { component: "comp".to_string() };
/// assert!(format!("{}", err).contains("alloc_complex"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CheckError {
    /// Complex-step was requested against a state without complex storage.
    #[error(
        "complex step requested for component '{component}' but complex storage \
         was not preallocated; build the model state with alloc_complex = true"
    )]
    ComplexNotAllocated {
        /// Component whose check requested complex-step.
        component: String,
    },

    /// The component has no complex compute path.
    #[error("component does not implement a complex compute path")]
    ComplexUnsupported,

    /// A declared or extracted block disagrees with the pair's dense shape.
    #[error(
        "shape mismatch for ('{of}', '{wrt}'): expected {expected_rows}x{expected_cols}, \
         got {rows}x{cols}"
    )]
    ShapeMismatch {
        /// Output side of the pair.
        of: String,
        /// Input side of the pair.
        wrt: String,
        /// Expected row count (flattened output size).
        expected_rows: usize,
        /// Expected column count (flattened input size).
        expected_cols: usize,
        /// Actual row count.
        rows: usize,
        /// Actual column count.
        cols: usize,
    },

    /// A named array was not found in the state.
    #[error("unknown variable '{name}'")]
    UnknownVariable {
        /// The missing array name.
        name: String,
    },

    /// A named component was not found in the model.
    #[error("unknown component '{name}'")]
    UnknownComponent {
        /// The missing component name.
        name: String,
    },

    /// A matrix-free product was requested from a component that does not
    /// provide the operator for that mode.
    #[error("component does not provide a {mode} product operator")]
    MissingOperator {
        /// "forward" or "reverse".
        mode: &'static str,
    },

    /// Sparse index triples are inconsistent with the declared shape.
    #[error("invalid sparse layout: {reason}")]
    SparseLayout {
        /// What was wrong with the triples.
        reason: String,
    },

    /// An array in the state does not have its declared length.
    #[error("array '{name}' has length {actual}, expected {expected}")]
    ArrayLength {
        /// Array name.
        name: String,
        /// Declared length.
        expected: usize,
        /// Observed length.
        actual: usize,
    },

    /// A component evaluation failed.
    #[error("evaluation failed in component '{component}': {reason}")]
    Evaluation {
        /// Component that failed.
        component: String,
        /// Failure description.
        reason: String,
    },

    /// Check settings are unusable (e.g. no responses or design variables).
    #[error("invalid check settings: {reason}")]
    InvalidSettings {
        /// What was wrong with the settings.
        reason: String,
    },
}
