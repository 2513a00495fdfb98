//! Discrepancy measurement between analytic and approximate blocks.
//!
//! Comparison is norm-based: the absolute error of a mode is the entrywise
//! (Frobenius) norm of the difference between that mode's analytic block and
//! the approximate block, and the relative error divides by the approximate
//! block's norm. When the approximate norm is (numerically) zero the relative
//! error is undefined and reported as absent rather than as infinity.

use deriv_core::types::{CheckError, DenseBlock, PairKey};

use crate::extract::AnalyticPair;

/// Below this approximate-block norm, relative errors are undefined.
pub const REL_ERROR_FLOOR: f64 = 1e-15;

/// Per-mode discrepancy norms for one pair.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorStats {
    /// Forward analytic vs approximate.
    pub forward: Option<f64>,
    /// Reverse analytic vs approximate.
    pub reverse: Option<f64>,
    /// Forward analytic vs reverse analytic.
    pub forward_reverse: Option<f64>,
}

impl ErrorStats {
    /// The largest defined discrepancy, if any mode was measured.
    pub fn max(&self) -> Option<f64> {
        [self.forward, self.reverse, self.forward_reverse]
            .into_iter()
            .flatten()
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }
}

/// Block norms for one pair, by source.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Magnitudes {
    /// Norm of the forward analytic block.
    pub fwd: Option<f64>,
    /// Norm of the reverse analytic block.
    pub rev: Option<f64>,
    /// Norm of the approximate block.
    pub approx: f64,
}

/// The full comparison record for one checked pair.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PairCheck {
    /// Forward-mode analytic block, when the component provides one.
    pub j_fwd: Option<DenseBlock>,
    /// Reverse-mode analytic block, when the component provides one.
    pub j_rev: Option<DenseBlock>,
    /// The approximate (finite-difference or complex-step) block.
    pub j_approx: DenseBlock,
    /// Absolute discrepancy norms.
    pub abs_error: ErrorStats,
    /// Relative discrepancy norms (absolute over approximate norm).
    pub rel_error: ErrorStats,
    /// Block norms.
    pub magnitude: Magnitudes,
    /// Whether the pair was declared dependent (undeclared pairs count as
    /// dependent; declared-non-dependent pairs as not).
    pub declared_dependent: bool,
}

impl PairCheck {
    /// The largest defined absolute discrepancy.
    pub fn worst_abs(&self) -> Option<f64> {
        self.abs_error.max()
    }

    /// The largest defined relative discrepancy.
    pub fn worst_rel(&self) -> Option<f64> {
        self.rel_error.max()
    }
}

/// Builds the comparison record for one pair.
///
/// # Errors
/// [`CheckError::ShapeMismatch`] when an analytic block's shape disagrees
/// with the approximate block's.
pub fn build_entry(
    pair: &PairKey,
    analytic: Option<&AnalyticPair>,
    j_approx: DenseBlock,
    declared_dependent: bool,
) -> Result<PairCheck, CheckError> {
    let j_fwd = analytic.and_then(|a| a.fwd.clone());
    let j_rev = analytic.and_then(|a| a.rev.clone());

    for block in [&j_fwd, &j_rev].into_iter().flatten() {
        if block.shape() != j_approx.shape() {
            return Err(CheckError::ShapeMismatch {
                of: pair.of.clone(),
                wrt: pair.wrt.clone(),
                expected_rows: j_approx.rows(),
                expected_cols: j_approx.cols(),
                rows: block.rows(),
                cols: block.cols(),
            });
        }
    }

    let approx_norm = j_approx.norm();
    let diff_norm = |a: &Option<DenseBlock>, b: &DenseBlock| -> Option<f64> {
        a.as_ref().and_then(|a| a.sub(b)).map(|d| d.norm())
    };

    let abs_error = ErrorStats {
        forward: diff_norm(&j_fwd, &j_approx),
        reverse: diff_norm(&j_rev, &j_approx),
        forward_reverse: match (&j_fwd, &j_rev) {
            (Some(f), Some(r)) => f.sub(r).map(|d| d.norm()),
            _ => None,
        },
    };

    let relative = |abs: Option<f64>| -> Option<f64> {
        match abs {
            Some(a) if approx_norm >= REL_ERROR_FLOOR => Some(a / approx_norm),
            _ => None,
        }
    };
    let rel_error = ErrorStats {
        forward: relative(abs_error.forward),
        reverse: relative(abs_error.reverse),
        forward_reverse: relative(abs_error.forward_reverse),
    };

    let magnitude = Magnitudes {
        fwd: j_fwd.as_ref().map(DenseBlock::norm),
        rev: j_rev.as_ref().map(DenseBlock::norm),
        approx: approx_norm,
    };

    Ok(PairCheck {
        j_fwd,
        j_rev,
        j_approx,
        abs_error,
        rel_error,
        magnitude,
        declared_dependent,
    })
}
