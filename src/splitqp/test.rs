use super::*;

// min ½xᵀHx + gᵀx with
// H = [4 1]   g = [1]
//     [1 2]       [1]
fn demo_H() -> Vec<f64> {
    vec![4., 1., 1., 2.]
}
fn demo_g() -> Vec<f64> {
    vec![1., 1.]
}

fn assert_close(a: &[f64], b: &[f64], tol: f64) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert!((x - y).abs() < tol, "{:?} !~ {:?}", a, b);
    }
}

#[test]
fn test_bounded_qp() {
    // over x ∈ [0,1]² the solution sits at the lower bounds
    let mut qp = BoundedQp::new(2, Options::default());
    let code = qp.init(&demo_H(), &demo_g(), &[0., 0.], &[1., 1.], &SolveLimits::default());
    assert_eq!(code, ReturnCode::Success);

    let mut x = [0.0; 2];
    qp.primal_into(&mut x);
    assert_close(&x, &[0., 0.], 1e-6);
    assert!((qp.objective() - 0.0).abs() < 1e-6);

    // both lower bounds active, multipliers positive
    let mut lam = [0.0; 2];
    qp.dual_into(&mut lam);
    assert_close(&lam, &[1., 1.], 1e-6);
}

#[test]
fn test_general_qp_equality() {
    // add the coupling row x₁ + x₂ = 1; the optimum is x = (¼, ¾)
    let mut qp = GeneralQp::new(2, 1, Options::default());
    let code = qp.init(
        &demo_H(),
        &demo_g(),
        &[1., 1.],
        &[0., 0.],
        &[1., 1.],
        &[1.],
        &[1.],
        &SolveLimits::default(),
    );
    assert_eq!(code, ReturnCode::Success);

    let mut x = [0.0; 2];
    qp.primal_into(&mut x);
    assert_close(&x, &[0.25, 0.75], 1e-8);
    assert!((qp.objective() - 1.875).abs() < 1e-8);

    // variable bounds inactive, row multiplier positive (lower side binds)
    let mut lam = [0.0; 3];
    qp.dual_into(&mut lam);
    assert_close(&lam, &[0., 0., 2.75], 1e-6);
}

#[test]
fn test_hot_start_unchanged() {
    let mut qp = GeneralQp::new(2, 1, Options::default());
    let limits = SolveLimits::default();
    let code = qp.init(
        &demo_H(),
        &demo_g(),
        &[1., 1.],
        &[0., 0.],
        &[1., 1.],
        &[1.],
        &[1.],
        &limits,
    );
    assert_eq!(code, ReturnCode::Success);
    let mut cold = [0.0; 2];
    qp.primal_into(&mut cold);

    // identical data again: the previous iterates are already a fixed
    // point, so no working-set work is needed
    let code = qp.hot_start(
        &demo_H(),
        &demo_g(),
        &[1., 1.],
        &[0., 0.],
        &[1., 1.],
        &[1.],
        &[1.],
        &limits,
    );
    assert_eq!(code, ReturnCode::Success);
    assert_eq!(qp.working_set_recalcs(), 0);

    let mut warm = [0.0; 2];
    qp.primal_into(&mut warm);
    assert_close(&warm, &cold, 1e-9);
}

#[test]
fn test_hot_start_new_gradient() {
    let mut qp = GeneralQp::new(2, 1, Options::default());
    let limits = SolveLimits::default();
    qp.init(
        &demo_H(),
        &demo_g(),
        &[1., 1.],
        &[0., 0.],
        &[1., 1.],
        &[1.],
        &[1.],
        &limits,
    );

    // shifting the gradient to (0,1) moves the optimum to (½, ½)
    let code = qp.hot_start(
        &demo_H(),
        &[0., 1.],
        &[1., 1.],
        &[0., 0.],
        &[1., 1.],
        &[1.],
        &[1.],
        &limits,
    );
    assert_eq!(code, ReturnCode::Success);

    let mut x = [0.0; 2];
    qp.primal_into(&mut x);
    assert_close(&x, &[0.5, 0.5], 1e-8);
    assert!((qp.objective() - 1.5).abs() < 1e-8);

    let mut lam = [0.0; 3];
    qp.dual_into(&mut lam);
    assert_close(&lam, &[0., 0., 2.5], 1e-6);
}

#[test]
fn test_infeasible_bounds() {
    let mut qp = BoundedQp::new(2, Options::default());
    let code = qp.init(&demo_H(), &demo_g(), &[1., 1.], &[0., 0.], &SolveLimits::default());
    assert_eq!(code, ReturnCode::Infeasible);
}

#[test]
fn test_infeasible_conflict() {
    // x ≤ 0 from the variable bound but x ≥ 1 from the row
    let mut qp = GeneralQp::new(1, 1, Options::default());
    let code = qp.init(
        &[0.],
        &[0.],
        &[1.],
        &[f64::NEG_INFINITY],
        &[0.],
        &[1.],
        &[f64::INFINITY],
        &SolveLimits::default(),
    );
    assert_eq!(code, ReturnCode::Infeasible);
}

#[test]
fn test_unbounded() {
    // free variable with a linear objective
    let mut qp = BoundedQp::new(1, Options::default());
    let code = qp.init(
        &[0.],
        &[1.],
        &[f64::NEG_INFINITY],
        &[f64::INFINITY],
        &SolveLimits::default(),
    );
    assert_eq!(code, ReturnCode::Unbounded);
}

#[test]
fn test_iteration_limit_sweeps() {
    let opts = OptionsBuilder::<f64>::default()
        .max_sweeps(10u32)
        .build()
        .unwrap();
    let mut qp = BoundedQp::new(2, opts);
    let code = qp.init(&demo_H(), &demo_g(), &[0., 0.], &[1., 1.], &SolveLimits::default());
    assert_eq!(code, ReturnCode::IterationLimit);
}

#[test]
fn test_recalc_budget() {
    // the solution activates the upper bounds, so the working set must
    // change from its initial inactive state at least once
    let limits = SolveLimits {
        max_recalcs: 0,
        cpu_time: None,
    };
    let mut qp = BoundedQp::new(2, Options::default());
    let code = qp.init(&demo_H(), &[-10., -10.], &[-1., -1.], &[1., 1.], &limits);
    assert_eq!(code, ReturnCode::IterationLimit);
    assert!(qp.working_set_recalcs() > 0);
}

#[test]
fn test_time_limit() {
    let limits = SolveLimits {
        max_recalcs: u32::MAX,
        cpu_time: Some(0.0),
    };
    let mut qp = BoundedQp::new(2, Options::default());
    let code = qp.init(&demo_H(), &demo_g(), &[0., 0.], &[1., 1.], &limits);
    assert_eq!(code, ReturnCode::TimeLimit);
}

#[test]
fn test_not_initialized() {
    let mut qp = BoundedQp::new(2, Options::default());
    let code = qp.hot_start(&demo_H(), &demo_g(), &[0., 0.], &[1., 1.], &SolveLimits::default());
    assert_eq!(code, ReturnCode::NotInitialized);
    assert_eq!(qp.status(), ReturnCode::NotInitialized);
}

#[test]
fn test_invalid_arguments() {
    let mut qp = BoundedQp::new(2, Options::default());
    let limits = SolveLimits::default();

    // wrong gradient length
    let code = qp.init(&demo_H(), &[1.], &[0., 0.], &[1., 1.], &limits);
    assert_eq!(code, ReturnCode::InvalidArguments);

    // non-finite matrix entry
    let code = qp.init(&[4., f64::NAN, 1., 2.], &demo_g(), &[0., 0.], &[1., 1.], &limits);
    assert_eq!(code, ReturnCode::InvalidArguments);
}

#[test]
fn test_indefinite_hessian() {
    let mut qp = BoundedQp::new(1, Options::default());
    let code = qp.init(&[-1.], &[0.], &[-1.], &[1.], &SolveLimits::default());
    assert_eq!(code, ReturnCode::NumericalIssue);
}

#[test]
fn test_return_codes_distinct() {
    let all = [
        ReturnCode::Success,
        ReturnCode::IterationLimit,
        ReturnCode::TimeLimit,
        ReturnCode::Infeasible,
        ReturnCode::Unbounded,
        ReturnCode::NumericalIssue,
        ReturnCode::InvalidArguments,
        ReturnCode::NotInitialized,
    ];
    for (i, a) in all.iter().enumerate() {
        assert_eq!(a.code(), i as i32);
    }
    assert!(ReturnCode::Success.is_acceptable());
    assert!(ReturnCode::IterationLimit.is_acceptable());
    assert!(!ReturnCode::TimeLimit.is_acceptable());
}

#[test]
fn test_options_validate() {
    assert!(OptionsBuilder::<f64>::default().alpha(2.0).build().is_err());
    assert!(OptionsBuilder::<f64>::default().rho(0.0).build().is_err());
    assert!(OptionsBuilder::<f64>::default()
        .check_interval(0u32)
        .build()
        .is_err());
    assert!(OptionsBuilder::<f64>::default().build().is_ok());
}

#[test]
fn test_print_level_tokens() {
    assert_eq!("medium".parse::<PrintLevel>().unwrap(), PrintLevel::Medium);
    assert!("extreme".parse::<PrintLevel>().is_err());
    assert!(PrintLevel::High > PrintLevel::Low);
}
