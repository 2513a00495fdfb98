//! Analytic Jacobian extraction.
//!
//! The extractor turns whatever analytic capability a component exposes into
//! dense per-pair blocks, one for each mode the capability can serve:
//!
//! - direct storage densifies the declared blocks, with declared-but-
//!   unpopulated pairs densifying to zeros, and serves both modes with the
//!   same matrix; a block whose nonzeros escape a declared sparsity pattern
//!   is rejected;
//! - a forward product operator is probed with one unit seed per input
//!   element, building columns;
//! - a reverse product operator is probed with one unit seed per output
//!   element, building rows.
//!
//! Forward and reverse blocks are kept separate so a disagreement between a
//! component's two operators is itself a reportable discrepancy.

use std::collections::{BTreeMap, BTreeSet};

use deriv_core::component::{Component, PartialDecl};
use deriv_core::state::Values;
use deriv_core::types::{CheckError, DenseBlock, PairKey};

/// The analytic blocks recovered for one pair, by mode.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalyticPair {
    /// Forward-mode block (direct storage or forward product columns).
    pub fwd: Option<DenseBlock>,
    /// Reverse-mode block (direct storage or reverse product rows).
    pub rev: Option<DenseBlock>,
}

/// The dense shape a pair's block must have.
pub fn pair_shape(comp: &dyn Component, pair: &PairKey) -> Result<(usize, usize), CheckError> {
    let of = comp
        .output_named(&pair.of)
        .ok_or_else(|| CheckError::UnknownVariable {
            name: pair.of.clone(),
        })?;
    let wrt = comp
        .input_named(&pair.wrt)
        .ok_or_else(|| CheckError::UnknownVariable {
            name: pair.wrt.clone(),
        })?;
    Ok((of.size(), wrt.size()))
}

/// Extracts every analytic block a component can produce at the baseline.
///
/// Components with no analytic capability yield an empty map; their pairs
/// are approximate-only.
pub fn extract_component(
    comp: &dyn Component,
    baseline: &Values<f64>,
) -> Result<BTreeMap<PairKey, AnalyticPair>, CheckError> {
    let caps = comp.capabilities();
    let mut map: BTreeMap<PairKey, AnalyticPair> = BTreeMap::new();

    if caps.direct {
        let blocks = comp.partials(baseline)?;
        for (pair, block) in blocks.iter() {
            let (rows, cols) = pair_shape(comp, pair)?;
            let dense = block.densify();
            if dense.shape() != (rows, cols) {
                return Err(CheckError::ShapeMismatch {
                    of: pair.of.clone(),
                    wrt: pair.wrt.clone(),
                    expected_rows: rows,
                    expected_cols: cols,
                    rows: dense.rows(),
                    cols: dense.cols(),
                });
            }
            if let Some(decl) = comp.declaration_for(&pair.of, &pair.wrt) {
                check_declared_pattern(decl, &dense)?;
            }
            map.insert(
                pair.clone(),
                AnalyticPair {
                    fwd: Some(dense.clone()),
                    rev: Some(dense),
                },
            );
        }
        // declared pairs left unpopulated densify to zeros
        for decl in comp.declarations() {
            let key = PairKey::new(&decl.of, &decl.wrt);
            if !map.contains_key(&key) {
                let (rows, cols) = pair_shape(comp, &key)?;
                let zeros = DenseBlock::zeros(rows, cols);
                map.insert(
                    key,
                    AnalyticPair {
                        fwd: Some(zeros.clone()),
                        rev: Some(zeros),
                    },
                );
            }
        }
    }

    if caps.fwd_product {
        for wrt in comp.inputs() {
            let n = wrt.size();
            let mut per_of: BTreeMap<String, DenseBlock> = comp
                .outputs()
                .iter()
                .map(|v| (v.name().to_string(), DenseBlock::zeros(v.size(), n)))
                .collect();

            for j in 0..n {
                let mut d_in = zeros_for(comp.inputs());
                d_in.get_mut(wrt.name())?[j] = 1.0;
                let mut d_out = zeros_for(comp.outputs());
                comp.jacvec_fwd(baseline, &d_in, &mut d_out)?;
                for (name, block) in per_of.iter_mut() {
                    block.set_column(j, d_out.get(name)?);
                }
            }
            for (of_name, block) in per_of {
                map.entry(PairKey::new(of_name, wrt.name()))
                    .or_default()
                    .fwd = Some(block);
            }
        }
    }

    if caps.rev_product {
        for of in comp.outputs() {
            let m = of.size();
            let mut per_wrt: BTreeMap<String, DenseBlock> = comp
                .inputs()
                .iter()
                .map(|v| (v.name().to_string(), DenseBlock::zeros(m, v.size())))
                .collect();

            for i in 0..m {
                let mut d_out = zeros_for(comp.outputs());
                d_out.get_mut(of.name())?[i] = 1.0;
                let mut d_in = zeros_for(comp.inputs());
                comp.jacvec_rev(baseline, &d_out, &mut d_in)?;
                for (name, block) in per_wrt.iter_mut() {
                    block.set_row(i, d_in.get(name)?);
                }
            }
            for (wrt_name, block) in per_wrt {
                map.entry(PairKey::new(of.name(), wrt_name))
                    .or_default()
                    .rev = Some(block);
            }
        }
    }

    Ok(map)
}

/// A direct block must keep its nonzeros inside the declared sparsity
/// pattern, when the declaration carries one.
fn check_declared_pattern(decl: &PartialDecl, dense: &DenseBlock) -> Result<(), CheckError> {
    let (rows, cols) = match (&decl.rows, &decl.cols) {
        (Some(rows), Some(cols)) => (rows, cols),
        _ => return Ok(()),
    };
    let declared: BTreeSet<(usize, usize)> =
        rows.iter().copied().zip(cols.iter().copied()).collect();
    for i in 0..dense.rows() {
        for j in 0..dense.cols() {
            if dense.get(i, j) != 0.0 && !declared.contains(&(i, j)) {
                return Err(CheckError::SparseLayout {
                    reason: format!(
                        "block {} has a nonzero at ({i}, {j}) outside its declared pattern",
                        PairKey::new(&decl.of, &decl.wrt)
                    ),
                });
            }
        }
    }
    Ok(())
}

fn zeros_for(vars: &[deriv_core::types::Variable]) -> Values<f64> {
    let mut values = Values::new();
    for var in vars {
        values.insert(var.name(), vec![0.0; var.size()]);
    }
    values
}
