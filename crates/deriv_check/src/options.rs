//! Approximation settings and their layered resolution.
//!
//! Every checked pair resolves its approximation configuration from three
//! layers over the built-in base, later layers winning per field:
//!
//! 1. global defaults,
//! 2. component-level override rules with wildcard pair patterns, folded in
//!    declaration order,
//! 3. an optional call-time patch.
//!
//! Each layer is a patch: a field a layer leaves unset never erases a value
//! an earlier layer chose, and only a field actually set counts as explicit.
//! When the resolved method is complex-step and no layer set a step size
//! explicitly, the step falls back to the complex-step default rather than
//! inheriting the finite-difference default.

use deriv_core::types::PairKey;

/// Default finite-difference step size.
pub const DEFAULT_FD_STEP: f64 = 1e-6;

/// Default complex-step step size.
pub const DEFAULT_CS_STEP: f64 = 1e-40;

/// Numerical approximation scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ApproxMethod {
    /// Finite difference.
    Fd,
    /// Complex step.
    ComplexStep,
}

/// Finite-difference stencil form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FdForm {
    /// One extra evaluation at `x + h`, first-order accurate.
    Forward,
    /// One extra evaluation at `x - h`, first-order accurate.
    Backward,
    /// Two extra evaluations at `x ± h`, second-order accurate.
    Central,
}

/// How the perturbation magnitude is derived from the step setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StepCalc {
    /// The step is used as-is.
    Absolute,
    /// The step is scaled by the magnitude of the perturbed element,
    /// falling back to the unscaled step at zero.
    Relative,
}

/// Resolved approximation configuration for one checked pair.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApproxConfig {
    /// Approximation scheme.
    pub method: ApproxMethod,
    /// Step size.
    pub step: f64,
    /// Stencil form (finite difference only).
    pub form: FdForm,
    /// Step scaling rule (finite difference only).
    pub step_calc: StepCalc,
}

impl Default for ApproxConfig {
    fn default() -> Self {
        Self {
            method: ApproxMethod::Fd,
            step: DEFAULT_FD_STEP,
            form: FdForm::Forward,
            step_calc: StepCalc::Absolute,
        }
    }
}

/// A sparse overlay over [`ApproxConfig`]: only the `Some` fields apply.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfigPatch {
    /// Overrides the method.
    pub method: Option<ApproxMethod>,
    /// Overrides the step size.
    pub step: Option<f64>,
    /// Overrides the stencil form.
    pub form: Option<FdForm>,
    /// Overrides the step scaling rule.
    pub step_calc: Option<StepCalc>,
}

impl ConfigPatch {
    /// An empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the method.
    pub fn method(mut self, method: ApproxMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the step size.
    pub fn step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    /// Sets the stencil form.
    pub fn form(mut self, form: FdForm) -> Self {
        self.form = Some(form);
        self
    }

    /// Sets the step scaling rule.
    pub fn step_calc(mut self, step_calc: StepCalc) -> Self {
        self.step_calc = Some(step_calc);
        self
    }

    /// Applies the set fields onto a config, reporting whether the step
    /// was touched.
    fn apply(&self, config: &mut ApproxConfig) -> bool {
        if let Some(method) = self.method {
            config.method = method;
        }
        if let Some(step) = self.step {
            config.step = step;
        }
        if let Some(form) = self.form {
            config.form = form;
        }
        if let Some(step_calc) = self.step_calc {
            config.step_calc = step_calc;
        }
        self.step.is_some()
    }
}

/// A component-level override: a pair pattern plus the fields to apply.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OverrideRule {
    /// Wildcard pattern matched against the output name.
    pub of_pattern: String,
    /// Wildcard pattern matched against the input name.
    pub wrt_pattern: String,
    /// The fields this rule sets.
    pub patch: ConfigPatch,
}

impl OverrideRule {
    /// A rule matching both sides of the pair.
    pub fn new(
        of_pattern: impl Into<String>,
        wrt_pattern: impl Into<String>,
        patch: ConfigPatch,
    ) -> Self {
        Self {
            of_pattern: of_pattern.into(),
            wrt_pattern: wrt_pattern.into(),
            patch,
        }
    }

    /// A rule keyed on the input name only, matching every output.
    pub fn wrt(wrt_pattern: impl Into<String>, patch: ConfigPatch) -> Self {
        Self::new("*", wrt_pattern, patch)
    }

    /// Whether this rule covers the given pair.
    pub fn matches(&self, pair: &PairKey) -> bool {
        wildcard_match(&self.of_pattern, &pair.of) && wildcard_match(&self.wrt_pattern, &pair.wrt)
    }
}

/// Glob-style match: `*` spans any run of characters, `?` exactly one.
///
/// Iterative with single-star backtracking, so pathological patterns stay
/// linear in the text length.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < txt.len() {
        if p < pat.len() && (pat[p] == '?' || pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}

/// Resolves the configuration for one pair from the three layers.
///
/// `defaults` applies first over the built-in base; `rules` fold in order
/// with later rules winning per field; `call_patch` applies last. The
/// complex-step default step applies only when no layer set a step
/// explicitly, which is why every layer is a patch rather than a full
/// config: a default step equal to [`DEFAULT_FD_STEP`] is still explicit
/// when the caller set it.
pub fn resolve(
    pair: &PairKey,
    defaults: &ConfigPatch,
    rules: &[OverrideRule],
    call_patch: Option<&ConfigPatch>,
) -> ApproxConfig {
    let mut config = ApproxConfig::default();
    let mut step_set = defaults.apply(&mut config);

    for rule in rules.iter().filter(|r| r.matches(pair)) {
        step_set |= rule.patch.apply(&mut config);
    }
    if let Some(patch) = call_patch {
        step_set |= patch.apply(&mut config);
    }
    if config.method == ApproxMethod::ComplexStep && !step_set {
        config.step = DEFAULT_CS_STEP;
    }
    config
}
