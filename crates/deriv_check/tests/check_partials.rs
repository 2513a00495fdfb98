//! Partial-derivative checking scenarios.

mod common;

use approx::assert_relative_eq;
use deriv_check::prelude::*;

use common::{
    paraboloid_group, single, FalseIndependence, ForwardOnly, HonestIndependence, Paraboloid,
    ReverseOnly,
};

fn quiet() -> CheckSettings {
    CheckSettings::new().quiet()
}

#[test]
fn correct_partials_show_small_errors() {
    let group = paraboloid_group(3.0, 5.0);
    let mut state = group.init_state(false);
    let report = deriv_check::engine::check_partials(&group, &mut state, &quiet()).unwrap();

    for wrt in ["x", "y"] {
        let entry = report.pair("comp", "f_xy", wrt).unwrap();
        assert!(entry.abs_error.forward.unwrap() < 1e-4);
        assert!(entry.rel_error.forward.unwrap() < 1e-5);
        // direct storage serves both modes, so they agree exactly
        assert_relative_eq!(entry.abs_error.forward_reverse.unwrap(), 0.0);
    }
}

#[test]
fn complex_step_matches_to_machine_precision() {
    let group = paraboloid_group(3.0, 5.0);
    let mut state = group.init_state(true);
    let settings = quiet().with_patch(ConfigPatch::new().method(ApproxMethod::ComplexStep));
    let report = deriv_check::engine::check_partials(&group, &mut state, &settings).unwrap();

    for wrt in ["x", "y"] {
        let entry = report.pair("comp", "f_xy", wrt).unwrap();
        assert!(entry.abs_error.forward.unwrap() < 1e-10);
    }
}

#[test]
fn complex_step_without_storage_fails_fast() {
    let group = paraboloid_group(3.0, 5.0);
    let mut state = group.init_state(false);
    let settings = quiet().with_patch(ConfigPatch::new().method(ApproxMethod::ComplexStep));
    let err = deriv_check::engine::check_partials(&group, &mut state, &settings).unwrap_err();
    assert!(matches!(err, CheckError::ComplexNotAllocated { ref component } if component == "comp"));
}

#[test]
fn honestly_independent_pair_is_omitted() {
    let group = single(
        Box::new(HonestIndependence::new()),
        &[("a", vec![1.0]), ("b", vec![1.0])],
    );
    let mut state = group.init_state(false);
    let report = deriv_check::engine::check_partials(&group, &mut state, &quiet()).unwrap();

    assert!(report.pair("comp", "f", "a").is_some());
    assert!(report.pair("comp", "f", "b").is_none());
}

#[test]
fn falsely_independent_pair_is_surfaced() {
    let group = single(
        Box::new(FalseIndependence::new()),
        &[("a", vec![1.0]), ("b", vec![1.0])],
    );
    let mut state = group.init_state(false);
    let report = deriv_check::engine::check_partials(&group, &mut state, &quiet()).unwrap();

    // the numerical derivative is 3, far above the negligibility threshold,
    // so the non-dependent declaration is overruled and the zero analytic
    // block is compared against it
    let entry = report.pair("comp", "f", "b").unwrap();
    assert!(!entry.declared_dependent);
    assert_relative_eq!(entry.abs_error.forward.unwrap(), 3.0, max_relative = 1e-4);
    assert_relative_eq!(entry.rel_error.forward.unwrap(), 1.0, max_relative = 1e-4);
}

#[test]
fn negligible_tolerance_is_configurable() {
    let group = single(
        Box::new(FalseIndependence::new()),
        &[("a", vec![1.0]), ("b", vec![1.0])],
    );
    let mut state = group.init_state(false);
    // with the threshold raised above the actual derivative, the pair hides
    let settings = quiet().with_negligible_tol(10.0);
    let report = deriv_check::engine::check_partials(&group, &mut state, &settings).unwrap();
    assert!(report.pair("comp", "f", "b").is_none());
}

#[test]
fn forward_only_component_reports_forward_mode_only() {
    let group = single(Box::new(ForwardOnly::new()), &[]);
    let mut state = group.init_state(false);
    state.values_mut().get_mut("comp.x").unwrap()[0] = 1.0;
    state.values_mut().get_mut("comp.x").unwrap()[1] = 2.0;
    let report = deriv_check::engine::check_partials(&group, &mut state, &quiet()).unwrap();

    let entry = report.pair("comp", "y", "x").unwrap();
    assert!(entry.abs_error.forward.unwrap() < 1e-4);
    assert!(entry.abs_error.reverse.is_none());
    assert!(entry.abs_error.forward_reverse.is_none());
    assert!(entry.j_rev.is_none());
}

#[test]
fn reverse_only_component_reports_reverse_mode_only() {
    let group = single(Box::new(ReverseOnly::new()), &[]);
    let mut state = group.init_state(false);
    state.values_mut().get_mut("comp.x").unwrap()[0] = 1.0;
    state.values_mut().get_mut("comp.x").unwrap()[1] = 2.0;
    let report = deriv_check::engine::check_partials(&group, &mut state, &quiet()).unwrap();

    let entry = report.pair("comp", "y", "x").unwrap();
    assert!(entry.abs_error.reverse.unwrap() < 1e-4);
    assert!(entry.abs_error.forward.is_none());
    assert!(entry.abs_error.forward_reverse.is_none());
    assert!(entry.j_fwd.is_none());
    let rev = entry.j_rev.as_ref().unwrap();
    for i in 0..2 {
        for j in 0..2 {
            assert_relative_eq!(rev.get(i, j), ReverseOnly::J[i][j]);
        }
    }
}

#[test]
fn override_rules_pick_central_difference() {
    let group = paraboloid_group(3.0, 5.0);
    let mut state = group.init_state(false);

    // central difference of a quadratic is exact up to roundoff
    let settings = quiet().override_component(
        "comp",
        OverrideRule::wrt("*", ConfigPatch::new().form(FdForm::Central)),
    );
    let report = deriv_check::engine::check_partials(&group, &mut state, &settings).unwrap();
    let entry = report.pair("comp", "f_xy", "x").unwrap();
    assert!(entry.abs_error.forward.unwrap() < 1e-8);
}

#[test]
fn later_override_rule_wins_for_overlapping_patterns() {
    let group = paraboloid_group(3.0, 5.0);
    let mut state = group.init_state(false);

    // both rules match "x"; the later, coarser step must win and visibly
    // degrade the forward-difference accuracy
    let settings = quiet()
        .override_component(
            "comp",
            OverrideRule::wrt("x*", ConfigPatch::new().step(1e-7)),
        )
        .override_component(
            "comp",
            OverrideRule::wrt("*x", ConfigPatch::new().step(1e-1)),
        );
    let report = deriv_check::engine::check_partials(&group, &mut state, &settings).unwrap();

    // d2f/dx2 = 2, so a forward difference with h = 0.1 is off by about h
    let entry = report.pair("comp", "f_xy", "x").unwrap();
    let err = entry.abs_error.forward.unwrap();
    assert!(err > 0.05 && err < 0.2, "abs error {err}");
}

#[test]
fn undeclared_but_real_pair_is_reported() {
    struct Undeclared {
        inputs: Vec<Variable>,
        outputs: Vec<Variable>,
    }
    impl Component for Undeclared {
        fn inputs(&self) -> &[Variable] {
            &self.inputs
        }
        fn outputs(&self) -> &[Variable] {
            &self.outputs
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities::none()
        }
        fn compute(&self, inputs: &Values, outputs: &mut Values) -> Result<(), CheckError> {
            outputs.get_mut("y")?[0] = 5.0 * inputs.get("x")?[0];
            Ok(())
        }
    }
    let comp = Undeclared {
        inputs: vec![Variable::scalar_input("x")],
        outputs: vec![Variable::scalar_output("y")],
    };
    let group = single(Box::new(comp), &[("x", vec![2.0])]);
    let mut state = group.init_state(false);
    let report = deriv_check::engine::check_partials(&group, &mut state, &quiet()).unwrap();

    let entry = report.pair("comp", "y", "x").unwrap();
    // approximate-only: no analytic block, but the magnitude is recorded
    assert!(entry.worst_abs().is_none());
    assert_relative_eq!(entry.magnitude.approx, 5.0, max_relative = 1e-4);
}

#[test]
fn free_standing_component_keys_under_empty_name() {
    let comp = Paraboloid::new();
    let mut inputs = Values::new();
    inputs.insert("x", vec![3.0]);
    inputs.insert("y", vec![5.0]);
    let report =
        deriv_check::engine::check_component_partials(&comp, &inputs, false, &quiet()).unwrap();

    let entry = report.pair("", "f_xy", "x").unwrap();
    assert!(entry.abs_error.forward.unwrap() < 1e-4);
    assert_eq!(report.len(), 2);
}

#[test]
fn check_is_idempotent_and_state_preserving() {
    let group = paraboloid_group(3.0, 5.0);
    let mut state = group.init_state(false);
    group.run(&mut state).unwrap();
    let before = state.values().clone();

    let first = deriv_check::engine::check_partials(&group, &mut state, &quiet()).unwrap();
    let second = deriv_check::engine::check_partials(&group, &mut state, &quiet()).unwrap();
    assert_eq!(first, second);

    for (name, data) in before.iter() {
        let after = state.get(name).unwrap();
        for (a, b) in data.iter().zip(after) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}

#[test]
fn relative_step_scales_with_operating_point() {
    // far from the origin an absolute step underflows the function scale;
    // relative stepping keeps the estimate usable
    let group = paraboloid_group(3.0e8, 5.0e8);
    let mut state = group.init_state(false);

    let absolute = quiet();
    let relative = quiet().with_patch(ConfigPatch::new().step_calc(StepCalc::Relative));
    let abs_report =
        deriv_check::engine::check_partials(&group, &mut state, &absolute).unwrap();
    let rel_report =
        deriv_check::engine::check_partials(&group, &mut state, &relative).unwrap();

    let abs_err = abs_report
        .pair("comp", "f_xy", "x")
        .unwrap()
        .rel_error
        .forward
        .unwrap();
    let rel_err = rel_report
        .pair("comp", "f_xy", "x")
        .unwrap()
        .rel_error
        .forward
        .unwrap();
    assert!(rel_err <= abs_err);
}

#[test]
fn report_display_lists_components() {
    let group = paraboloid_group(3.0, 5.0);
    let mut state = group.init_state(false);
    let report = deriv_check::engine::check_partials(&group, &mut state, &quiet()).unwrap();
    let text = format!("{report}");
    assert!(text.contains("Component: comp"));
    assert!(text.contains("('f_xy', 'x')"));
}

#[test]
fn multiple_components_each_get_sections() {
    let mut group = paraboloid_group(3.0, 5.0);
    group.add_component("second", Box::new(Paraboloid::new()));
    group.connect("x", "second.x");
    group.connect("y", "second.y");
    let mut state = group.init_state(false);
    let report = deriv_check::engine::check_partials(&group, &mut state, &quiet()).unwrap();

    assert!(report.pair("comp", "f_xy", "x").is_some());
    assert!(report.pair("second", "f_xy", "x").is_some());
    assert_eq!(report.len(), 4);
}
