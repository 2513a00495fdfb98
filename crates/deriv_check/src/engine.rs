//! Check drivers: partial and total derivative verification.
//!
//! `check_partials` re-derives every component-level Jacobian block two ways
//! at the current operating point: analytically, through whatever capability
//! the component exposes, and numerically, by perturbation sweeps. Every
//! sweep runs under restore-on-exit guards, so a check never moves the model
//! off its operating point; running the same check twice yields identical
//! reports.
//!
//! `check_totals` does the same for model-level derivatives of responses
//! with respect to design variables, seeding unit perturbations through the
//! component chain for the analytic side and re-running the model for the
//! numerical side.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use deriv_core::model::Group;
use deriv_core::state::{ModelState, StateGuard, Values};
use deriv_core::types::{CheckError, DenseBlock, PairKey};

use crate::approx::{cs_component_sweep, cs_total_column, fd_component_sweep, fd_total_column};
use crate::compare::build_entry;
use crate::extract::extract_component;
use crate::options::{resolve, ApproxConfig, ApproxMethod, ConfigPatch, OverrideRule};
use crate::report::{PartialsReport, TotalsReport};

/// Default threshold below which an approximate block counts as negligible.
pub const DEFAULT_NEGLIGIBLE_TOL: f64 = 1e-8;

/// Settings for a verification run.
///
/// # Examples
/// ```
/// use deriv_check::engine::CheckSettings;
/// use deriv_check::options::{ApproxMethod, ConfigPatch};
///
/// let settings = CheckSettings::new()
///     .with_patch(ConfigPatch::new().method(ApproxMethod::ComplexStep))
///     .quiet();
/// assert!(settings.suppress_output);
/// ```
#[derive(Clone, Debug)]
pub struct CheckSettings {
    /// Global approximation defaults, as a patch over the built-in base.
    /// Only fields actually set here count as explicit during resolution.
    pub defaults: ConfigPatch,
    /// Call-time patch, applied after every override rule.
    pub patch: Option<ConfigPatch>,
    /// Per-component override rules, folded in declaration order.
    pub component_overrides: BTreeMap<String, Vec<OverrideRule>>,
    /// Approximate-block norm below which omitted pairs stay omitted.
    pub negligible_tol: f64,
    /// Suppresses the report log line and the per-pair log events.
    pub suppress_output: bool,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckSettings {
    /// Default settings: forward FD, default step, report logged.
    pub fn new() -> Self {
        Self {
            defaults: ConfigPatch::new(),
            patch: None,
            component_overrides: BTreeMap::new(),
            negligible_tol: DEFAULT_NEGLIGIBLE_TOL,
            suppress_output: false,
        }
    }

    /// Replaces the global defaults.
    pub fn with_defaults(mut self, defaults: ConfigPatch) -> Self {
        self.defaults = defaults;
        self
    }

    /// Sets the call-time patch.
    pub fn with_patch(mut self, patch: ConfigPatch) -> Self {
        self.patch = Some(patch);
        self
    }

    /// Appends an override rule for one component.
    pub fn override_component(mut self, component: impl Into<String>, rule: OverrideRule) -> Self {
        self.component_overrides
            .entry(component.into())
            .or_default()
            .push(rule);
        self
    }

    /// Replaces the negligibility threshold.
    pub fn with_negligible_tol(mut self, tol: f64) -> Self {
        self.negligible_tol = tol;
        self
    }

    /// Suppresses the report log line and the per-pair log events.
    pub fn quiet(mut self) -> Self {
        self.suppress_output = true;
        self
    }

    fn resolve_pair(&self, component: &str, pair: &PairKey) -> ApproxConfig {
        let rules = self
            .component_overrides
            .get(component)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        resolve(pair, &self.defaults, rules, self.patch.as_ref())
    }

    fn resolve_global(&self) -> ApproxConfig {
        resolve(
            &PairKey::new("", ""),
            &self.defaults,
            &[],
            self.patch.as_ref(),
        )
    }
}

/// Checks every component-level partial derivative against a fresh
/// numerical approximation.
///
/// Runs the model once to establish the operating point, then sweeps each
/// component in isolation. State is restored bit-exactly afterwards.
///
/// # Errors
/// Fatal configuration problems only: complex-step without complex storage,
/// shape mismatches, failed evaluations. Large discrepancies are data, not
/// errors.
pub fn check_partials(
    group: &Group,
    state: &mut ModelState,
    settings: &CheckSettings,
) -> Result<PartialsReport, CheckError> {
    group.run(state)?;
    let alloc_complex = state.alloc_complex();

    let mut report = PartialsReport::new();
    for (comp_name, comp) in group.components() {
        if !settings.suppress_output {
            debug!(component = comp_name, "checking partials");
        }
        let baseline = group.component_inputs(state.values(), comp_name)?;
        check_component_into(&mut report, comp_name, comp, &baseline, settings, alloc_complex)?;
    }

    if !settings.suppress_output {
        info!("derivative check results:\n{report}");
    }
    Ok(report)
}

/// Checks one free-standing component at the given local input arrays.
///
/// The component is not part of a group; its records key under the empty
/// component name. Override rules registered under the empty name apply.
pub fn check_component_partials(
    comp: &dyn deriv_core::component::Component,
    inputs: &Values<f64>,
    alloc_complex: bool,
    settings: &CheckSettings,
) -> Result<PartialsReport, CheckError> {
    let mut report = PartialsReport::new();
    check_component_into(&mut report, "", comp, inputs, settings, alloc_complex)?;
    if !settings.suppress_output {
        info!("derivative check results:\n{report}");
    }
    Ok(report)
}

fn check_component_into(
    report: &mut PartialsReport,
    comp_name: &str,
    comp: &dyn deriv_core::component::Component,
    baseline: &Values<f64>,
    settings: &CheckSettings,
    alloc_complex: bool,
) -> Result<(), CheckError> {
    let analytic = extract_component(comp, baseline)?;

    for wrt in comp.inputs() {
        // one sweep per distinct resolved configuration for this input
        let mut configs: Vec<ApproxConfig> = Vec::new();
        let mut pair_config: BTreeMap<PairKey, usize> = BTreeMap::new();
        for of in comp.outputs() {
            let pair = PairKey::new(of.name(), wrt.name());
            let config = settings.resolve_pair(comp_name, &pair);
            let slot = match configs.iter().position(|c| *c == config) {
                Some(i) => i,
                None => {
                    configs.push(config);
                    configs.len() - 1
                }
            };
            pair_config.insert(pair, slot);
        }

        let mut swept: Vec<BTreeMap<String, DenseBlock>> = Vec::with_capacity(configs.len());
        for config in &configs {
            let blocks = match config.method {
                ApproxMethod::Fd => fd_component_sweep(comp, baseline, wrt.name(), config)?,
                ApproxMethod::ComplexStep => {
                    if !alloc_complex {
                        return Err(CheckError::ComplexNotAllocated {
                            component: comp_name.to_string(),
                        });
                    }
                    cs_component_sweep(comp, baseline, wrt.name(), config.step)?
                }
            };
            swept.push(blocks);
        }

        for of in comp.outputs() {
            let pair = PairKey::new(of.name(), wrt.name());
            let slot = pair_config[&pair];
            let j_approx = swept[slot][of.name()].clone();

            let declared = comp.declaration_for(&pair.of, &pair.wrt);
            let declared_dependent = declared.map(|d| d.dependent).unwrap_or(true);
            let analytic_pair = analytic.get(&pair);
            let negligible = j_approx.norm() <= settings.negligible_tol;

            if declared.is_some() && !declared_dependent && negligible {
                continue;
            }
            if declared.is_none() && analytic_pair.is_none() {
                if negligible {
                    continue;
                }
                if !settings.suppress_output {
                    warn!(
                        component = comp_name,
                        pair = %pair,
                        "partial not declared but numerically nonzero"
                    );
                }
            }

            let entry = build_entry(&pair, analytic_pair, j_approx, declared_dependent)?;
            report.insert(comp_name, pair, entry);
        }
    }
    Ok(())
}

/// Checks model-level total derivatives of the group's declared responses
/// with respect to its declared design variables.
pub fn check_totals(
    group: &Group,
    state: &mut ModelState,
    settings: &CheckSettings,
) -> Result<TotalsReport, CheckError> {
    let of: Vec<_> = group.responses().to_vec();
    let wrt: Vec<_> = group.design_vars().to_vec();
    check_totals_of_wrt(group, state, settings, &of, &wrt)
}

/// Checks total derivatives for an explicit set of responses and design
/// variables, each optionally restricted to element indices.
pub fn check_totals_of_wrt(
    group: &Group,
    state: &mut ModelState,
    settings: &CheckSettings,
    of: &[deriv_core::model::VarSubset],
    wrt: &[deriv_core::model::VarSubset],
) -> Result<TotalsReport, CheckError> {
    if of.is_empty() || wrt.is_empty() {
        return Err(CheckError::InvalidSettings {
            reason: "total-derivative check needs at least one response and one design variable"
                .to_string(),
        });
    }
    group.run(state)?;
    let alloc_complex = state.alloc_complex();
    let config = settings.resolve_global();

    let responses = resolve_subsets(group, state.values(), of)?;
    let design_vars = resolve_subsets(group, state.values(), wrt)?;

    // numerical side: one model sweep per design-variable element
    let mut approx: BTreeMap<PairKey, DenseBlock> = BTreeMap::new();
    for resp in &responses {
        for dv in &design_vars {
            approx.insert(
                PairKey::new(&resp.abs, &dv.abs),
                DenseBlock::zeros(resp.elems.len(), dv.elems.len()),
            );
        }
    }
    {
        let mut guard = StateGuard::capture_all(state.values_mut());
        for dv in &design_vars {
            for (col, &elem) in dv.elems.iter().enumerate() {
                if !settings.suppress_output {
                    debug!(wrt = %dv.abs, elem, "total-derivative sweep");
                }
                let column = match config.method {
                    ApproxMethod::Fd => {
                        fd_total_column(group, guard.values_mut(), &dv.abs, elem, &config)?
                    }
                    ApproxMethod::ComplexStep => {
                        if !alloc_complex {
                            return Err(CheckError::ComplexNotAllocated {
                                component: dv.abs.clone(),
                            });
                        }
                        cs_total_column(group, guard.values(), &dv.abs, elem, config.step)?
                    }
                };
                for resp in &responses {
                    let data = column.get(&resp.abs)?.to_vec();
                    if let Some(block) = approx.get_mut(&PairKey::new(&resp.abs, &dv.abs)) {
                        for (row, &e) in resp.elems.iter().enumerate() {
                            block.set(row, col, data[e]);
                        }
                    }
                }
                guard.restore();
            }
        }
    }

    // analytic side: seed sweeps, when the whole chain can be linearized
    let fwd = if group.forward_linearizable() {
        let mut blocks: BTreeMap<PairKey, DenseBlock> = BTreeMap::new();
        for dv in &design_vars {
            for (col, &elem) in dv.elems.iter().enumerate() {
                let seeds = group.seed_forward(state.values(), &dv.abs, elem)?;
                for resp in &responses {
                    let data = seeds.get(&resp.abs)?;
                    let block = blocks
                        .entry(PairKey::new(&resp.abs, &dv.abs))
                        .or_insert_with(|| {
                            DenseBlock::zeros(resp.elems.len(), dv.elems.len())
                        });
                    for (row, &e) in resp.elems.iter().enumerate() {
                        block.set(row, col, data[e]);
                    }
                }
            }
        }
        Some(blocks)
    } else {
        None
    };

    let rev = if group.reverse_linearizable() {
        let mut blocks: BTreeMap<PairKey, DenseBlock> = BTreeMap::new();
        for resp in &responses {
            for (row, &elem) in resp.elems.iter().enumerate() {
                let seeds = group.seed_reverse(state.values(), &resp.abs, elem)?;
                for dv in &design_vars {
                    let data = seeds.get(&dv.abs)?;
                    let block = blocks
                        .entry(PairKey::new(&resp.abs, &dv.abs))
                        .or_insert_with(|| {
                            DenseBlock::zeros(resp.elems.len(), dv.elems.len())
                        });
                    for (col, &e) in dv.elems.iter().enumerate() {
                        block.set(row, col, data[e]);
                    }
                }
            }
        }
        Some(blocks)
    } else {
        None
    };

    let mut report = TotalsReport::new();
    for (pair, j_approx) in approx {
        let analytic = crate::extract::AnalyticPair {
            fwd: fwd.as_ref().and_then(|m| m.get(&pair).cloned()),
            rev: rev.as_ref().and_then(|m| m.get(&pair).cloned()),
        };
        let have_analytic = analytic.fwd.is_some() || analytic.rev.is_some();
        let entry = build_entry(
            &pair,
            have_analytic.then_some(&analytic),
            j_approx,
            true,
        )?;
        report.insert(pair, entry);
    }

    if !settings.suppress_output {
        info!("total-derivative check results:\n{report}");
    }
    Ok(report)
}

struct ActiveVar {
    abs: String,
    elems: Vec<usize>,
}

fn resolve_subsets(
    group: &Group,
    values: &Values<f64>,
    subsets: &[deriv_core::model::VarSubset],
) -> Result<Vec<ActiveVar>, CheckError> {
    let mut out = Vec::with_capacity(subsets.len());
    for subset in subsets {
        let abs = group.resolve_name(&subset.name);
        let len = values.get(&abs)?.len();
        let elems = match &subset.indices {
            Some(indices) => {
                for &i in indices {
                    if i >= len {
                        return Err(CheckError::InvalidSettings {
                            reason: format!(
                                "index {i} out of range for '{abs}' (length {len})"
                            ),
                        });
                    }
                }
                indices.clone()
            }
            None => (0..len).collect(),
        };
        out.push(ActiveVar { abs, elems });
    }
    Ok(out)
}
