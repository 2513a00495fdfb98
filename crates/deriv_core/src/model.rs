//! Model assembly: components wired into an executable group.
//!
//! A [`Group`] owns an ordered list of named components, independent source
//! arrays, and the connections between them. Execution order is insertion
//! order and data flow must follow it, so one pass through the list converges
//! the model. The group also carries the declared design variables and
//! responses consumed by total-derivative checks, and the forward/reverse
//! seed sweeps that build analytic total derivatives column by column.

use std::collections::BTreeMap;

use num_complex::Complex64;

use crate::component::Component;
use crate::state::{ModelState, Values};
use crate::types::CheckError;

/// Joins a component name and a local variable name into an absolute name.
///
/// An empty component name yields the bare variable name, which is how
/// model-level independent arrays are addressed.
pub fn abs_name(comp: &str, var: &str) -> String {
    if comp.is_empty() {
        var.to_string()
    } else {
        format!("{comp}.{var}")
    }
}

/// A named variable, optionally restricted to a subset of its elements.
///
/// Used for design variables and responses; `indices = None` means every
/// element participates.
#[derive(Clone, Debug, PartialEq)]
pub struct VarSubset {
    /// Promoted or absolute variable name.
    pub name: String,
    /// Flattened element indices, when restricted.
    pub indices: Option<Vec<usize>>,
}

impl VarSubset {
    /// The full variable.
    pub fn full(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indices: None,
        }
    }

    /// A slice of the variable.
    pub fn with_indices(name: impl Into<String>, indices: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            indices: Some(indices),
        }
    }
}

/// An executable collection of components with explicit data flow.
#[derive(Default)]
pub struct Group {
    components: Vec<(String, Box<dyn Component>)>,
    indeps: Vec<(String, Vec<f64>)>,
    /// input absolute name -> source absolute name
    connections: BTreeMap<String, String>,
    /// promoted name -> absolute name
    promotions: BTreeMap<String, String>,
    design_vars: Vec<VarSubset>,
    responses: Vec<VarSubset>,
}

impl Group {
    /// Creates an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a component. Insertion order is execution order.
    pub fn add_component(&mut self, name: impl Into<String>, component: Box<dyn Component>) {
        self.components.push((name.into(), component));
    }

    /// Adds an independent source array addressed by its bare name.
    pub fn add_indep(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.indeps.push((name.into(), values));
    }

    /// Connects a source array to a component input, both by absolute name.
    pub fn connect(&mut self, source_abs: impl Into<String>, input_abs: impl Into<String>) {
        self.connections.insert(input_abs.into(), source_abs.into());
    }

    /// Registers a promoted alias for an absolute name.
    pub fn promote(&mut self, promoted: impl Into<String>, absolute: impl Into<String>) {
        self.promotions.insert(promoted.into(), absolute.into());
    }

    /// Declares a design variable.
    pub fn add_design_var(&mut self, name: impl Into<String>) {
        self.design_vars.push(VarSubset::full(name));
    }

    /// Declares a design variable restricted to the given element indices.
    pub fn add_design_var_indices(&mut self, name: impl Into<String>, indices: Vec<usize>) {
        self.design_vars.push(VarSubset::with_indices(name, indices));
    }

    /// Declares a response (objective or constraint).
    pub fn add_response(&mut self, name: impl Into<String>) {
        self.responses.push(VarSubset::full(name));
    }

    /// Declares a response restricted to the given element indices.
    pub fn add_response_indices(&mut self, name: impl Into<String>, indices: Vec<usize>) {
        self.responses.push(VarSubset::with_indices(name, indices));
    }

    /// The declared design variables, in declaration order.
    pub fn design_vars(&self) -> &[VarSubset] {
        &self.design_vars
    }

    /// The declared responses, in declaration order.
    pub fn responses(&self) -> &[VarSubset] {
        &self.responses
    }

    /// Iterates `(name, component)` in execution order.
    pub fn components(&self) -> impl Iterator<Item = (&str, &dyn Component)> {
        self.components
            .iter()
            .map(|(name, comp)| (name.as_str(), comp.as_ref()))
    }

    /// Looks up a component by name.
    pub fn component(&self, name: &str) -> Result<&dyn Component, CheckError> {
        self.components
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_ref())
            .ok_or_else(|| CheckError::UnknownComponent {
                name: name.to_string(),
            })
    }

    /// Resolves a promoted alias to an absolute name; names without an alias
    /// pass through unchanged.
    pub fn resolve_name(&self, name: &str) -> String {
        self.promotions
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// The absolute name a component input reads from: its connection source,
    /// or the input array itself when unconnected.
    pub fn source_of(&self, comp_name: &str, var_name: &str) -> String {
        let abs = abs_name(comp_name, var_name);
        self.connections.get(&abs).cloned().unwrap_or(abs)
    }

    /// Allocates the model state: independent arrays at their declared
    /// values, every component array zero-filled.
    pub fn init_state(&self, alloc_complex: bool) -> ModelState {
        let mut values = Values::new();
        for (name, data) in &self.indeps {
            values.insert(name.clone(), data.clone());
        }
        for (name, comp) in &self.components {
            for var in comp.inputs().iter().chain(comp.outputs()) {
                values.insert(abs_name(name, var.name()), vec![0.0; var.size()]);
            }
        }
        ModelState::new(values, alloc_complex)
    }

    /// Gathers a component's local input arrays from their sources.
    pub fn component_inputs<T: Clone>(
        &self,
        values: &Values<T>,
        comp_name: &str,
    ) -> Result<Values<T>, CheckError> {
        let comp = self.component(comp_name)?;
        let mut local = Values::new();
        for var in comp.inputs() {
            let src = self.source_of(comp_name, var.name());
            local.insert(var.name(), values.get(&src)?.to_vec());
        }
        Ok(local)
    }

    /// Runs the model once, in execution order.
    pub fn run(&self, state: &mut ModelState) -> Result<(), CheckError> {
        self.run_values(state.values_mut())
    }

    /// Runs the model against a bare array store.
    pub fn run_values(&self, values: &mut Values<f64>) -> Result<(), CheckError> {
        for (name, comp) in &self.components {
            for var in comp.inputs() {
                let abs = abs_name(name, var.name());
                if let Some(src) = self.connections.get(&abs) {
                    let data = values.get(src)?.to_vec();
                    *values.get_mut(&abs)? = data;
                }
            }
            let local_in = self.component_inputs(values, name)?;
            let local_out = evaluate_component(comp.as_ref(), &local_in)?;
            for var in comp.outputs() {
                let abs = abs_name(name, var.name());
                *values.get_mut(&abs)? = local_out.get(var.name())?.to_vec();
            }
        }
        Ok(())
    }

    /// Runs the model in complex arithmetic.
    ///
    /// # Errors
    /// [`CheckError::ComplexUnsupported`] when any component lacks a complex
    /// compute path.
    pub fn run_complex(&self, values: &mut Values<Complex64>) -> Result<(), CheckError> {
        for (name, comp) in &self.components {
            for var in comp.inputs() {
                let abs = abs_name(name, var.name());
                if let Some(src) = self.connections.get(&abs) {
                    let data = values.get(src)?.to_vec();
                    *values.get_mut(&abs)? = data;
                }
            }
            let local_in = self.component_inputs(values, name)?;
            let local_out = evaluate_component_complex(comp.as_ref(), &local_in)?;
            for var in comp.outputs() {
                let abs = abs_name(name, var.name());
                *values.get_mut(&abs)? = local_out.get(var.name())?.to_vec();
            }
        }
        Ok(())
    }

    /// Whether every component can be linearized in forward mode.
    pub fn forward_linearizable(&self) -> bool {
        self.components
            .iter()
            .all(|(_, c)| c.capabilities().supports_forward())
    }

    /// Whether every component can be linearized in reverse mode.
    pub fn reverse_linearizable(&self) -> bool {
        self.components
            .iter()
            .all(|(_, c)| c.capabilities().supports_reverse())
    }

    /// One forward total-derivative sweep: seeds element `col` of `wrt_abs`
    /// with a unit perturbation and propagates it through the chain.
    ///
    /// The returned store holds `d(array)/d(wrt_abs[col])` for every array;
    /// the seeded element itself carries the identity 1.
    pub fn seed_forward(
        &self,
        values: &Values<f64>,
        wrt_abs: &str,
        col: usize,
    ) -> Result<Values<f64>, CheckError> {
        let mut seeds = values.zeros_like();
        seeds.get_mut(wrt_abs)?[col] = 1.0;

        for (name, comp) in &self.components {
            let local_in = self.component_inputs(values, name)?;
            let mut d_in = Values::new();
            for var in comp.inputs() {
                let src = self.source_of(name, var.name());
                d_in.insert(var.name(), seeds.get(&src)?.to_vec());
            }
            let mut d_out = Values::new();
            for var in comp.outputs() {
                d_out.insert(var.name(), vec![0.0; var.size()]);
            }

            let caps = comp.capabilities();
            if caps.fwd_product {
                comp.jacvec_fwd(&local_in, &d_in, &mut d_out)?;
            } else if caps.direct {
                let blocks = comp.partials(&local_in)?;
                for (pair, block) in blocks.iter() {
                    let din = d_in.get(&pair.wrt)?;
                    let contrib = block.densify().matvec(din);
                    let slot = d_out.get_mut(&pair.of)?;
                    for (s, c) in slot.iter_mut().zip(contrib) {
                        *s += c;
                    }
                }
            } else {
                return Err(CheckError::MissingOperator { mode: "forward" });
            }

            for var in comp.outputs() {
                let abs = abs_name(name, var.name());
                *seeds.get_mut(&abs)? = d_out.get(var.name())?.to_vec();
            }
        }
        Ok(seeds)
    }

    /// One reverse total-derivative sweep: seeds element `row` of `of_abs`
    /// and propagates it back through the chain in reverse execution order.
    ///
    /// The returned store holds `d(of_abs[row])/d(array)` for every array.
    pub fn seed_reverse(
        &self,
        values: &Values<f64>,
        of_abs: &str,
        row: usize,
    ) -> Result<Values<f64>, CheckError> {
        let mut seeds = values.zeros_like();
        seeds.get_mut(of_abs)?[row] = 1.0;

        for (name, comp) in self.components.iter().rev() {
            let local_in = self.component_inputs(values, name)?;
            let mut d_out = Values::new();
            for var in comp.outputs() {
                let abs = abs_name(name, var.name());
                d_out.insert(var.name(), seeds.get(&abs)?.to_vec());
            }
            let mut d_in = Values::new();
            for var in comp.inputs() {
                d_in.insert(var.name(), vec![0.0; var.size()]);
            }

            let caps = comp.capabilities();
            if caps.rev_product {
                comp.jacvec_rev(&local_in, &d_out, &mut d_in)?;
            } else if caps.direct {
                let blocks = comp.partials(&local_in)?;
                for (pair, block) in blocks.iter() {
                    let dout = d_out.get(&pair.of)?;
                    let contrib = block.densify().matvec_transposed(dout);
                    let slot = d_in.get_mut(&pair.wrt)?;
                    for (s, c) in slot.iter_mut().zip(contrib) {
                        *s += c;
                    }
                }
            } else {
                return Err(CheckError::MissingOperator { mode: "reverse" });
            }

            for var in comp.inputs() {
                let src = self.source_of(name, var.name());
                let contrib = d_in.get(var.name())?.to_vec();
                let slot = seeds.get_mut(&src)?;
                for (s, c) in slot.iter_mut().zip(contrib) {
                    *s += c;
                }
            }
        }
        Ok(seeds)
    }
}

/// Evaluates a component on local input arrays, returning fresh outputs.
pub fn evaluate_component(
    comp: &dyn Component,
    inputs: &Values<f64>,
) -> Result<Values<f64>, CheckError> {
    let mut outputs = Values::new();
    for var in comp.outputs() {
        outputs.insert(var.name(), vec![0.0; var.size()]);
    }
    comp.compute(inputs, &mut outputs)?;
    Ok(outputs)
}

/// Evaluates a component in complex arithmetic.
pub fn evaluate_component_complex(
    comp: &dyn Component,
    inputs: &Values<Complex64>,
) -> Result<Values<Complex64>, CheckError> {
    let mut outputs = Values::new();
    for var in comp.outputs() {
        outputs.insert(var.name(), vec![Complex64::new(0.0, 0.0); var.size()]);
    }
    comp.compute_complex(inputs, &mut outputs)?;
    Ok(outputs)
}
