//! # deriv_check
//!
//! Derivative verification engine: checks analytic Jacobians against
//! independent numerical approximations.
//!
//! Partial-derivative checks ([`engine::check_partials`]) re-derive every
//! declared component Jacobian block by finite difference or complex step
//! and report per-pair discrepancy norms, broken out by forward and reverse
//! analytic mode. Total-derivative checks ([`engine::check_totals`]) do the
//! same for model-level derivatives of responses with respect to design
//! variables.
//!
//! Approximation settings resolve per pair from global defaults, wildcard
//! override rules, and a call-time patch ([`options`]); reports are plain
//! data ([`report`]) with no tolerance baked in.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod approx;
pub mod compare;
pub mod engine;
pub mod extract;
pub mod options;
pub mod report;

/// Convenience re-exports for typical checking sessions.
pub mod prelude {
    pub use crate::compare::{ErrorStats, Magnitudes, PairCheck};
    pub use crate::engine::{
        check_component_partials, check_partials, check_totals, check_totals_of_wrt,
        CheckSettings,
    };
    pub use crate::options::{
        ApproxConfig, ApproxMethod, ConfigPatch, FdForm, OverrideRule, StepCalc,
    };
    pub use crate::report::{PartialsReport, TotalsReport};
    pub use deriv_core::component::{Capabilities, Component, PartialBlocks, PartialDecl};
    pub use deriv_core::model::{Group, VarSubset};
    pub use deriv_core::state::{ModelState, Values};
    pub use deriv_core::types::{CheckError, DenseBlock, JacobianBlock, PairKey, Variable};
}
