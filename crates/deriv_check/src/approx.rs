//! Numerical approximation sweeps.
//!
//! Partial-derivative sweeps perturb one local input element at a time and
//! re-evaluate a single component; total-derivative sweeps perturb a source
//! array element and re-run the whole model. Forward and backward stencils
//! share one reference evaluation across the entire sweep, so checking an
//! n-element input costs exactly one reference plus n perturbed evaluations.
//!
//! Complex-step sweeps run the complex compute path with an imaginary
//! perturbation and read the derivative from the imaginary part, which is
//! subtraction-free and accurate to machine precision even at tiny steps.

use std::collections::BTreeMap;

use num_complex::Complex64;

use deriv_core::component::Component;
use deriv_core::model::{evaluate_component, evaluate_component_complex, Group};
use deriv_core::state::{StateGuard, Values};
use deriv_core::types::{CheckError, DenseBlock};

use crate::options::{ApproxConfig, FdForm, StepCalc};

/// The perturbation magnitude for one element.
///
/// Relative scaling multiplies the step by the element's magnitude, falling
/// back to the unscaled step when the element is zero.
pub fn fd_delta(step: f64, step_calc: StepCalc, x: f64) -> f64 {
    match step_calc {
        StepCalc::Absolute => step,
        StepCalc::Relative => {
            if x == 0.0 {
                step
            } else {
                step * x.abs()
            }
        }
    }
}

/// Finite-difference sweep over one component input.
///
/// Returns one approximate Jacobian block per output, keyed by output name,
/// with one column per element of `wrt`.
pub fn fd_component_sweep(
    comp: &dyn Component,
    baseline: &Values<f64>,
    wrt: &str,
    config: &ApproxConfig,
) -> Result<BTreeMap<String, DenseBlock>, CheckError> {
    let n = baseline.get(wrt)?.len();
    let reference = match config.form {
        FdForm::Forward | FdForm::Backward => Some(evaluate_component(comp, baseline)?),
        FdForm::Central => None,
    };

    let mut work = baseline.clone();
    let touched = [wrt.to_string()];
    let mut guard = StateGuard::capture(&mut work, &touched)?;
    let mut blocks: BTreeMap<String, DenseBlock> = comp
        .outputs()
        .iter()
        .map(|v| (v.name().to_string(), DenseBlock::zeros(v.size(), n)))
        .collect();

    for j in 0..n {
        let x = baseline.get(wrt)?[j];
        let delta = fd_delta(config.step, config.step_calc, x);

        let columns: BTreeMap<String, Vec<f64>> = match config.form {
            FdForm::Forward => {
                guard.values_mut().get_mut(wrt)?[j] = x + delta;
                let plus = evaluate_component(comp, guard.values())?;
                let reference = reference.as_ref().ok_or_else(stencil_invariant)?;
                diff_columns(&plus, reference, delta)?
            }
            FdForm::Backward => {
                guard.values_mut().get_mut(wrt)?[j] = x - delta;
                let minus = evaluate_component(comp, guard.values())?;
                let reference = reference.as_ref().ok_or_else(stencil_invariant)?;
                diff_columns(reference, &minus, delta)?
            }
            FdForm::Central => {
                guard.values_mut().get_mut(wrt)?[j] = x + delta;
                let plus = evaluate_component(comp, guard.values())?;
                guard.values_mut().get_mut(wrt)?[j] = x - delta;
                let minus = evaluate_component(comp, guard.values())?;
                diff_columns(&plus, &minus, 2.0 * delta)?
            }
        };
        guard.restore();

        for (name, column) in &columns {
            if let Some(block) = blocks.get_mut(name) {
                block.set_column(j, column);
            }
        }
    }
    Ok(blocks)
}

/// Complex-step sweep over one component input.
pub fn cs_component_sweep(
    comp: &dyn Component,
    baseline: &Values<f64>,
    wrt: &str,
    step: f64,
) -> Result<BTreeMap<String, DenseBlock>, CheckError> {
    let n = baseline.get(wrt)?.len();
    let mut work = baseline.to_complex();
    let touched = [wrt.to_string()];
    let mut guard = StateGuard::capture(&mut work, &touched)?;
    let mut blocks: BTreeMap<String, DenseBlock> = comp
        .outputs()
        .iter()
        .map(|v| (v.name().to_string(), DenseBlock::zeros(v.size(), n)))
        .collect();

    for j in 0..n {
        let base = guard.values().get(wrt)?[j];
        guard.values_mut().get_mut(wrt)?[j] = base + Complex64::new(0.0, step);
        let out = evaluate_component_complex(comp, guard.values())?;
        guard.restore();

        for (name, data) in out.iter() {
            if let Some(block) = blocks.get_mut(name) {
                let column: Vec<f64> = data.iter().map(|z| z.im / step).collect();
                block.set_column(j, &column);
            }
        }
    }
    Ok(blocks)
}

/// One finite-difference total-derivative column.
///
/// `values` must hold a converged model evaluation; the perturbed runs happen
/// under a guard, so the store is restored bit-exactly before returning. The
/// result maps every array to its derivative with respect to element `elem`
/// of `wrt_abs` (the seeded element itself differentiates to 1).
pub fn fd_total_column(
    group: &Group,
    values: &mut Values<f64>,
    wrt_abs: &str,
    elem: usize,
    config: &ApproxConfig,
) -> Result<Values<f64>, CheckError> {
    let x = values.get(wrt_abs)?[elem];
    let delta = fd_delta(config.step, config.step_calc, x);
    let reference = values.clone();

    let mut guard = StateGuard::capture_all(values);
    let column = match config.form {
        FdForm::Forward => {
            guard.values_mut().get_mut(wrt_abs)?[elem] = x + delta;
            group.run_values(guard.values_mut())?;
            diff_values(guard.values(), &reference, delta)?
        }
        FdForm::Backward => {
            guard.values_mut().get_mut(wrt_abs)?[elem] = x - delta;
            group.run_values(guard.values_mut())?;
            diff_values(&reference, guard.values(), delta)?
        }
        FdForm::Central => {
            guard.values_mut().get_mut(wrt_abs)?[elem] = x + delta;
            group.run_values(guard.values_mut())?;
            let plus = guard.values().clone();
            guard.restore();
            guard.values_mut().get_mut(wrt_abs)?[elem] = x - delta;
            group.run_values(guard.values_mut())?;
            let minus = guard.values().clone();
            diff_values(&plus, &minus, 2.0 * delta)?
        }
    };
    drop(guard);
    Ok(column)
}

/// One complex-step total-derivative column.
pub fn cs_total_column(
    group: &Group,
    values: &Values<f64>,
    wrt_abs: &str,
    elem: usize,
    step: f64,
) -> Result<Values<f64>, CheckError> {
    let mut mirror = values.to_complex();
    let base = mirror.get(wrt_abs)?[elem];
    mirror.get_mut(wrt_abs)?[elem] = base + Complex64::new(0.0, step);
    group.run_complex(&mut mirror)?;

    let mut column = Values::new();
    for (name, data) in mirror.iter() {
        column.insert(name, data.iter().map(|z| z.im / step).collect());
    }
    Ok(column)
}

fn stencil_invariant() -> CheckError {
    CheckError::Evaluation {
        component: String::new(),
        reason: "one-sided stencil lost its reference evaluation".to_string(),
    }
}

fn diff_columns(
    hi: &Values<f64>,
    lo: &Values<f64>,
    denom: f64,
) -> Result<BTreeMap<String, Vec<f64>>, CheckError> {
    let mut out = BTreeMap::new();
    for (name, hi_data) in hi.iter() {
        let lo_data = lo.get(name)?;
        let column = hi_data
            .iter()
            .zip(lo_data)
            .map(|(a, b)| (a - b) / denom)
            .collect();
        out.insert(name.to_string(), column);
    }
    Ok(out)
}

fn diff_values(hi: &Values<f64>, lo: &Values<f64>, denom: f64) -> Result<Values<f64>, CheckError> {
    let mut out = Values::new();
    for (name, hi_data) in hi.iter() {
        let lo_data = lo.get(name)?;
        out.insert(
            name,
            hi_data
                .iter()
                .zip(lo_data)
                .map(|(a, b)| (a - b) / denom)
                .collect(),
        );
    }
    Ok(out)
}
