//! Variable metadata.
//!
//! A [`Variable`] describes one array-valued quantity owned by a component:
//! its name, optional physical unit, shape, and role. The engine never
//! converts units; it only consumes the boolean commensurability check, with
//! conversion arithmetic guaranteed upstream by the modeling framework's
//! connection validation.

/// Role of a variable within its owning component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VarRole {
    /// An input consumed by the component.
    Input,
    /// An output produced by the component.
    Output,
    /// A residual of an implicit relation; checked through the same
    /// compute surface as outputs.
    Residual,
}

/// An array-valued quantity with a name, optional unit, shape, and role.
///
/// # Examples
/// ```
/// use deriv_core::types::Variable;
///
/// let x = Variable::input("x", &[2, 2]).with_units("m");
/// assert_eq!(x.size(), 4);
/// assert_eq!(x.units(), Some("m"));
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Variable {
    name: String,
    units: Option<String>,
    shape: Vec<usize>,
    role: VarRole,
}

impl Variable {
    /// Creates an input variable with the given shape.
    pub fn input(name: impl Into<String>, shape: &[usize]) -> Self {
        Self::new(name, shape, VarRole::Input)
    }

    /// Creates an output variable with the given shape.
    pub fn output(name: impl Into<String>, shape: &[usize]) -> Self {
        Self::new(name, shape, VarRole::Output)
    }

    /// Creates a scalar input.
    pub fn scalar_input(name: impl Into<String>) -> Self {
        Self::input(name, &[1])
    }

    /// Creates a scalar output.
    pub fn scalar_output(name: impl Into<String>) -> Self {
        Self::output(name, &[1])
    }

    /// Creates a variable with an explicit role.
    pub fn new(name: impl Into<String>, shape: &[usize], role: VarRole) -> Self {
        Self {
            name: name.into(),
            units: None,
            shape: shape.to_vec(),
            role,
        }
    }

    /// Attaches a physical unit label.
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// The variable's local name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unit label, if any.
    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    /// The declared shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The variable's role.
    pub fn role(&self) -> VarRole {
        self.role
    }

    /// Flattened element count.
    pub fn size(&self) -> usize {
        self.shape.iter().product::<usize>().max(1)
    }

    /// Whether two variables carry commensurable units.
    ///
    /// Unit conversion itself is out of scope; a shared label (or no label
    /// on either side) is taken as commensurable, anything else is not.
    pub fn commensurable_with(&self, other: &Variable) -> bool {
        match (&self.units, &other.units) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}
