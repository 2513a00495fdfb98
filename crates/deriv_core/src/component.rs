//! The component interface consumed by the verification engine.
//!
//! A [`Component`] is a leaf modeling unit exposing inputs, outputs, and some
//! combination of analytic derivative capabilities:
//!
//! - a direct Jacobian store ([`Component::partials`]),
//! - a forward Jacobian-vector product operator ([`Component::jacvec_fwd`]),
//! - a reverse vector-Jacobian product operator ([`Component::jacvec_rev`]),
//! - or none of these, in which case every pair is approximate-only.
//!
//! The engine dispatches on [`Capabilities`], never on type identity, and a
//! pair's completeness is an explicit enumerated state rather than an
//! attribute-presence check.

use num_complex::Complex64;
use std::collections::BTreeMap;

use crate::state::Values;
use crate::types::{CheckError, JacobianBlock, PairKey, Variable};

/// The analytic derivative capabilities a component exposes.
///
/// Introspected by the extractor to choose the extraction protocol; never
/// set from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// The component stores literal Jacobian blocks.
    pub direct: bool,
    /// The component provides a forward Jacobian-vector product operator.
    pub fwd_product: bool,
    /// The component provides a reverse vector-Jacobian product operator.
    pub rev_product: bool,
}

impl Capabilities {
    /// No analytic capability; every pair is approximate-only.
    pub fn none() -> Self {
        Self::default()
    }

    /// Direct Jacobian storage only.
    pub fn direct() -> Self {
        Self {
            direct: true,
            ..Self::default()
        }
    }

    /// Matrix-free, forward product only.
    pub fn forward_product() -> Self {
        Self {
            fwd_product: true,
            ..Self::default()
        }
    }

    /// Matrix-free, reverse product only.
    pub fn reverse_product() -> Self {
        Self {
            rev_product: true,
            ..Self::default()
        }
    }

    /// Matrix-free with both product operators.
    pub fn both_products() -> Self {
        Self {
            fwd_product: true,
            rev_product: true,
            ..Self::default()
        }
    }

    /// Whether any analytic protocol exists.
    pub fn any(&self) -> bool {
        self.direct || self.fwd_product || self.rev_product
    }

    /// Whether a forward-mode linearization can be formed.
    pub fn supports_forward(&self) -> bool {
        self.direct || self.fwd_product
    }

    /// Whether a reverse-mode linearization can be formed.
    pub fn supports_reverse(&self) -> bool {
        self.direct || self.rev_product
    }
}

/// Declared existence and sparsity of one partial.
///
/// A pair may be marked non-dependent; such pairs are excluded from reports
/// unless their approximation turns out to be non-negligible.
#[derive(Clone, Debug, PartialEq)]
pub struct PartialDecl {
    /// Output name.
    pub of: String,
    /// Input name.
    pub wrt: String,
    /// Whether the output is declared to depend on the input.
    pub dependent: bool,
    /// Sparse row indices, when declared with explicit sparsity.
    pub rows: Option<Vec<usize>>,
    /// Sparse column indices, paired with `rows`.
    pub cols: Option<Vec<usize>>,
}

impl PartialDecl {
    /// Declares a dependent partial.
    pub fn new(of: impl Into<String>, wrt: impl Into<String>) -> Self {
        Self {
            of: of.into(),
            wrt: wrt.into(),
            dependent: true,
            rows: None,
            cols: None,
        }
    }

    /// Declares a pair as structurally non-dependent.
    pub fn non_dependent(of: impl Into<String>, wrt: impl Into<String>) -> Self {
        Self {
            dependent: false,
            ..Self::new(of, wrt)
        }
    }

    /// Attaches explicit sparsity indices.
    pub fn with_sparsity(mut self, rows: Vec<usize>, cols: Vec<usize>) -> Self {
        self.rows = Some(rows);
        self.cols = Some(cols);
        self
    }
}

/// Direct Jacobian blocks produced by one linearization call.
#[derive(Clone, Debug, Default)]
pub struct PartialBlocks {
    blocks: BTreeMap<PairKey, JacobianBlock>,
}

impl PartialBlocks {
    /// Creates an empty block set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the block for one pair.
    pub fn set(&mut self, of: impl Into<String>, wrt: impl Into<String>, block: JacobianBlock) {
        self.blocks.insert(PairKey::new(of, wrt), block);
    }

    /// The block for a pair, if populated.
    pub fn get(&self, pair: &PairKey) -> Option<&JacobianBlock> {
        self.blocks.get(pair)
    }

    /// Iterates populated pairs in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &JacobianBlock)> {
        self.blocks.iter()
    }

    /// Number of populated pairs.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no pair was populated.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// A leaf modeling unit with declared inputs, outputs, and partials.
///
/// `compute` must be deterministic in its inputs; the engine relies on that
/// to share one reference evaluation across a perturbation sweep and to make
/// repeated checks bit-identical. Components that support complex-step
/// override [`Component::compute_complex`] with the same function evaluated
/// in complex arithmetic.
pub trait Component {
    /// Declared input variables.
    fn inputs(&self) -> &[Variable];

    /// Declared output variables.
    fn outputs(&self) -> &[Variable];

    /// Declared partials. Pairs absent from this list are undeclared:
    /// approximate-only, but still checked.
    fn declarations(&self) -> &[PartialDecl] {
        &[]
    }

    /// Which analytic protocols this component exposes.
    fn capabilities(&self) -> Capabilities {
        Capabilities::direct()
    }

    /// Evaluates outputs from inputs. Keys are local variable names.
    fn compute(&self, inputs: &Values, outputs: &mut Values) -> Result<(), CheckError>;

    /// Evaluates outputs in complex arithmetic, for complex-step checking.
    fn compute_complex(
        &self,
        _inputs: &Values<Complex64>,
        _outputs: &mut Values<Complex64>,
    ) -> Result<(), CheckError> {
        Err(CheckError::ComplexUnsupported)
    }

    /// Returns the direct Jacobian blocks at the given inputs.
    ///
    /// Only consulted when [`Capabilities::direct`] is set. Declared pairs
    /// left unpopulated densify to zero blocks on extraction.
    fn partials(&self, _inputs: &Values) -> Result<PartialBlocks, CheckError> {
        Ok(PartialBlocks::new())
    }

    /// Forward Jacobian-vector product: accumulates `J * d_inputs` into
    /// `d_outputs`. Only consulted when [`Capabilities::fwd_product`] is set.
    fn jacvec_fwd(
        &self,
        _inputs: &Values,
        _d_inputs: &Values,
        _d_outputs: &mut Values,
    ) -> Result<(), CheckError> {
        Err(CheckError::MissingOperator { mode: "forward" })
    }

    /// Reverse vector-Jacobian product: accumulates `J^T * d_outputs` into
    /// `d_inputs`. Only consulted when [`Capabilities::rev_product`] is set.
    fn jacvec_rev(
        &self,
        _inputs: &Values,
        _d_outputs: &Values,
        _d_inputs: &mut Values,
    ) -> Result<(), CheckError> {
        Err(CheckError::MissingOperator { mode: "reverse" })
    }
}

/// Extension helpers over [`Component`] trait objects.
impl<'a> dyn Component + 'a {
    /// Looks up an input variable by name.
    pub fn input_named(&self, name: &str) -> Option<&Variable> {
        self.inputs().iter().find(|v| v.name() == name)
    }

    /// Looks up an output variable by name.
    pub fn output_named(&self, name: &str) -> Option<&Variable> {
        self.outputs().iter().find(|v| v.name() == name)
    }

    /// The declaration covering a concrete pair, if any.
    pub fn declaration_for(&self, of: &str, wrt: &str) -> Option<&PartialDecl> {
        self.declarations()
            .iter()
            .find(|d| d.of == of && d.wrt == wrt)
    }
}
