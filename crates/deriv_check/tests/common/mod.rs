//! Shared model fixtures for the checking integration tests.
#![allow(dead_code)]

use num_complex::Complex64;

use deriv_check::prelude::*;

/// f = (x - 3)^2 + x*y + (y + 4)^2 - 3, with correct analytic partials and a
/// complex compute path.
pub struct Paraboloid {
    inputs: Vec<Variable>,
    outputs: Vec<Variable>,
    decls: Vec<PartialDecl>,
}

impl Paraboloid {
    pub fn new() -> Self {
        Self {
            inputs: vec![Variable::scalar_input("x"), Variable::scalar_input("y")],
            outputs: vec![Variable::scalar_output("f_xy")],
            decls: vec![PartialDecl::new("f_xy", "x"), PartialDecl::new("f_xy", "y")],
        }
    }
}

impl Component for Paraboloid {
    fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    fn outputs(&self) -> &[Variable] {
        &self.outputs
    }

    fn declarations(&self) -> &[PartialDecl] {
        &self.decls
    }

    fn compute(&self, inputs: &Values, outputs: &mut Values) -> Result<(), CheckError> {
        let x = inputs.get("x")?[0];
        let y = inputs.get("y")?[0];
        outputs.get_mut("f_xy")?[0] = (x - 3.0).powi(2) + x * y + (y + 4.0).powi(2) - 3.0;
        Ok(())
    }

    fn compute_complex(
        &self,
        inputs: &Values<Complex64>,
        outputs: &mut Values<Complex64>,
    ) -> Result<(), CheckError> {
        let x = inputs.get("x")?[0];
        let y = inputs.get("y")?[0];
        let three = Complex64::new(3.0, 0.0);
        let four = Complex64::new(4.0, 0.0);
        outputs.get_mut("f_xy")?[0] = (x - three).powi(2) + x * y + (y + four).powi(2) - three;
        Ok(())
    }

    fn partials(&self, inputs: &Values) -> Result<PartialBlocks, CheckError> {
        let x = inputs.get("x")?[0];
        let y = inputs.get("y")?[0];
        let mut blocks = PartialBlocks::new();
        blocks.set(
            "f_xy",
            "x",
            JacobianBlock::dense(DenseBlock::scalar(2.0 * (x - 3.0) + y)),
        );
        blocks.set(
            "f_xy",
            "y",
            JacobianBlock::dense(DenseBlock::scalar(x + 2.0 * (y + 4.0))),
        );
        Ok(blocks)
    }
}

/// A paraboloid wired to two independent sources at (x, y).
pub fn paraboloid_group(x: f64, y: f64) -> Group {
    let mut group = Group::new();
    group.add_indep("x", vec![x]);
    group.add_indep("y", vec![y]);
    group.add_component("comp", Box::new(Paraboloid::new()));
    group.connect("x", "comp.x");
    group.connect("y", "comp.y");
    group
}

/// v = factor * u, direct storage plus a complex compute path.
pub struct Scale {
    factor: f64,
    inputs: Vec<Variable>,
    outputs: Vec<Variable>,
    decls: Vec<PartialDecl>,
}

impl Scale {
    pub fn new(factor: f64) -> Self {
        Self {
            factor,
            inputs: vec![Variable::scalar_input("u")],
            outputs: vec![Variable::scalar_output("v")],
            decls: vec![PartialDecl::new("v", "u")],
        }
    }
}

impl Component for Scale {
    fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    fn outputs(&self) -> &[Variable] {
        &self.outputs
    }

    fn declarations(&self) -> &[PartialDecl] {
        &self.decls
    }

    fn compute(&self, inputs: &Values, outputs: &mut Values) -> Result<(), CheckError> {
        outputs.get_mut("v")?[0] = self.factor * inputs.get("u")?[0];
        Ok(())
    }

    fn compute_complex(
        &self,
        inputs: &Values<Complex64>,
        outputs: &mut Values<Complex64>,
    ) -> Result<(), CheckError> {
        outputs.get_mut("v")?[0] = Complex64::new(self.factor, 0.0) * inputs.get("u")?[0];
        Ok(())
    }

    fn partials(&self, _inputs: &Values) -> Result<PartialBlocks, CheckError> {
        let mut blocks = PartialBlocks::new();
        blocks.set(
            "v",
            "u",
            JacobianBlock::dense(DenseBlock::scalar(self.factor)),
        );
        Ok(blocks)
    }
}

/// f = sum(weights_i * z_i) over a vector input, with exact partials.
pub struct WeightedSum {
    weights: Vec<f64>,
    inputs: Vec<Variable>,
    outputs: Vec<Variable>,
    decls: Vec<PartialDecl>,
}

impl WeightedSum {
    pub fn new(weights: Vec<f64>) -> Self {
        let n = weights.len();
        Self {
            weights,
            inputs: vec![Variable::input("z", &[n])],
            outputs: vec![Variable::scalar_output("f")],
            decls: vec![PartialDecl::new("f", "z")],
        }
    }
}

impl Component for WeightedSum {
    fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    fn outputs(&self) -> &[Variable] {
        &self.outputs
    }

    fn declarations(&self) -> &[PartialDecl] {
        &self.decls
    }

    fn compute(&self, inputs: &Values, outputs: &mut Values) -> Result<(), CheckError> {
        let z = inputs.get("z")?;
        outputs.get_mut("f")?[0] = z.iter().zip(&self.weights).map(|(a, w)| a * w).sum();
        Ok(())
    }

    fn compute_complex(
        &self,
        inputs: &Values<Complex64>,
        outputs: &mut Values<Complex64>,
    ) -> Result<(), CheckError> {
        let z = inputs.get("z")?;
        outputs.get_mut("f")?[0] = z
            .iter()
            .zip(&self.weights)
            .map(|(a, w)| a * Complex64::new(*w, 0.0))
            .sum();
        Ok(())
    }

    fn partials(&self, _inputs: &Values) -> Result<PartialBlocks, CheckError> {
        let mut blocks = PartialBlocks::new();
        let row = DenseBlock::from_row_major(1, self.weights.len(), self.weights.clone())?;
        blocks.set("f", "z", JacobianBlock::dense(row));
        Ok(blocks)
    }
}

/// f = 2a; input b genuinely unused and declared non-dependent.
pub struct HonestIndependence {
    inputs: Vec<Variable>,
    outputs: Vec<Variable>,
    decls: Vec<PartialDecl>,
}

impl HonestIndependence {
    pub fn new() -> Self {
        Self {
            inputs: vec![Variable::scalar_input("a"), Variable::scalar_input("b")],
            outputs: vec![Variable::scalar_output("f")],
            decls: vec![
                PartialDecl::new("f", "a"),
                PartialDecl::non_dependent("f", "b"),
            ],
        }
    }
}

impl Component for HonestIndependence {
    fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    fn outputs(&self) -> &[Variable] {
        &self.outputs
    }

    fn declarations(&self) -> &[PartialDecl] {
        &self.decls
    }

    fn compute(&self, inputs: &Values, outputs: &mut Values) -> Result<(), CheckError> {
        outputs.get_mut("f")?[0] = 2.0 * inputs.get("a")?[0];
        Ok(())
    }

    fn partials(&self, _inputs: &Values) -> Result<PartialBlocks, CheckError> {
        let mut blocks = PartialBlocks::new();
        blocks.set("f", "a", JacobianBlock::dense(DenseBlock::scalar(2.0)));
        Ok(blocks)
    }
}

/// f = 2a + 3b, but (f, b) is wrongly declared non-dependent.
pub struct FalseIndependence {
    inputs: Vec<Variable>,
    outputs: Vec<Variable>,
    decls: Vec<PartialDecl>,
}

impl FalseIndependence {
    pub fn new() -> Self {
        Self {
            inputs: vec![Variable::scalar_input("a"), Variable::scalar_input("b")],
            outputs: vec![Variable::scalar_output("f")],
            decls: vec![
                PartialDecl::new("f", "a"),
                PartialDecl::non_dependent("f", "b"),
            ],
        }
    }
}

impl Component for FalseIndependence {
    fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    fn outputs(&self) -> &[Variable] {
        &self.outputs
    }

    fn declarations(&self) -> &[PartialDecl] {
        &self.decls
    }

    fn compute(&self, inputs: &Values, outputs: &mut Values) -> Result<(), CheckError> {
        outputs.get_mut("f")?[0] = 2.0 * inputs.get("a")?[0] + 3.0 * inputs.get("b")?[0];
        Ok(())
    }

    fn partials(&self, _inputs: &Values) -> Result<PartialBlocks, CheckError> {
        let mut blocks = PartialBlocks::new();
        blocks.set("f", "a", JacobianBlock::dense(DenseBlock::scalar(2.0)));
        Ok(blocks)
    }
}

/// y = A x with A = [[2, 3], [4, 5]], forward matrix-free only.
pub struct ForwardOnly {
    inputs: Vec<Variable>,
    outputs: Vec<Variable>,
}

impl ForwardOnly {
    pub const J: [[f64; 2]; 2] = [[2.0, 3.0], [4.0, 5.0]];

    pub fn new() -> Self {
        Self {
            inputs: vec![Variable::input("x", &[2])],
            outputs: vec![Variable::output("y", &[2])],
        }
    }
}

impl Component for ForwardOnly {
    fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    fn outputs(&self) -> &[Variable] {
        &self.outputs
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::forward_product()
    }

    fn compute(&self, inputs: &Values, outputs: &mut Values) -> Result<(), CheckError> {
        let x = inputs.get("x")?.to_vec();
        let y = outputs.get_mut("y")?;
        for i in 0..2 {
            y[i] = Self::J[i][0] * x[0] + Self::J[i][1] * x[1];
        }
        Ok(())
    }

    fn jacvec_fwd(
        &self,
        _inputs: &Values,
        d_inputs: &Values,
        d_outputs: &mut Values,
    ) -> Result<(), CheckError> {
        let dx = d_inputs.get("x")?.to_vec();
        let dy = d_outputs.get_mut("y")?;
        for i in 0..2 {
            dy[i] += Self::J[i][0] * dx[0] + Self::J[i][1] * dx[1];
        }
        Ok(())
    }
}

/// y = A x with A = [[2, 3], [4, 5]], reverse matrix-free only.
pub struct ReverseOnly {
    inputs: Vec<Variable>,
    outputs: Vec<Variable>,
}

impl ReverseOnly {
    pub const J: [[f64; 2]; 2] = [[2.0, 3.0], [4.0, 5.0]];

    pub fn new() -> Self {
        Self {
            inputs: vec![Variable::input("x", &[2])],
            outputs: vec![Variable::output("y", &[2])],
        }
    }
}

impl Component for ReverseOnly {
    fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    fn outputs(&self) -> &[Variable] {
        &self.outputs
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::reverse_product()
    }

    fn compute(&self, inputs: &Values, outputs: &mut Values) -> Result<(), CheckError> {
        let x = inputs.get("x")?.to_vec();
        let y = outputs.get_mut("y")?;
        for i in 0..2 {
            y[i] = Self::J[i][0] * x[0] + Self::J[i][1] * x[1];
        }
        Ok(())
    }

    fn jacvec_rev(
        &self,
        _inputs: &Values,
        d_outputs: &Values,
        d_inputs: &mut Values,
    ) -> Result<(), CheckError> {
        let dy = d_outputs.get("y")?.to_vec();
        let dx = d_inputs.get_mut("x")?;
        for j in 0..2 {
            dx[j] += Self::J[0][j] * dy[0] + Self::J[1][j] * dy[1];
        }
        Ok(())
    }
}

/// Wraps a single component with one independent source per scalar input.
pub fn single(component: Box<dyn Component>, values: &[(&str, Vec<f64>)]) -> Group {
    let mut group = Group::new();
    for (name, data) in values {
        group.add_indep(*name, data.clone());
    }
    group.add_component("comp", component);
    for (name, _) in values {
        group.connect(*name, format!("comp.{name}"));
    }
    group
}
