use portico::algebra::*;
use portico::error::SolverError;
use portico::options::OptionMap;
use portico::qpsol::*;

fn assert_close(a: f64, b: f64, tol: f64) {
    assert!(f64::abs(a - b) <= tol, "{a} vs {b}");
}

// minimize ½x'Hx + g'x with H = [4 1; 1 2], g = [1, 1]
fn demo_h() -> (SparsityPattern, Vec<f64>) {
    (SparsityPattern::dense(2, 2), vec![4., 1., 1., 2.])
}

#[test]
fn equality_constrained_demo() {
    let (h_sp, h) = demo_h();
    let structure = QpStructure::new(h_sp, SparsityPattern::dense(1, 2));
    let mut solver = Qpsol::new("eq", "splitqp", structure, &OptionMap::new()).unwrap();
    assert_eq!(solver.plugin_name(), "splitqp");
    assert_eq!((solver.nv(), solver.nc()), (2, 1));

    // x0 + x1 = 1
    let sol = solver
        .eval(&QpInputs {
            h: &h,
            g: &[1., 1.],
            a: &[1., 1.],
            lbx: None,
            ubx: None,
            lba: Some(&[1.]),
            uba: Some(&[1.]),
        })
        .unwrap();

    assert_close(sol.x[0], 0.25, 1e-4);
    assert_close(sol.x[1], 0.75, 1e-4);
    assert_close(sol.cost, 1.875, 1e-5);
    assert_close(sol.lam_a[0], -2.75, 1e-4);
    assert_close(sol.lam_x[0], 0.0, 1e-4);
    assert_close(sol.lam_x[1], 0.0, 1e-4);
}

#[test]
fn bound_constrained_demo() {
    let (h_sp, h) = demo_h();
    let structure = QpStructure::bound_only(h_sp);
    let mut solver = Qpsol::new("box", "splitqp", structure, &OptionMap::new()).unwrap();

    let sol = solver
        .eval(&QpInputs {
            h: &h,
            g: &[1., 1.],
            a: &[],
            lbx: Some(&[0., 0.]),
            ubx: Some(&[1., 1.]),
            lba: None,
            uba: None,
        })
        .unwrap();

    assert_close(sol.x[0], 0.0, 1e-6);
    assert_close(sol.x[1], 0.0, 1e-6);
    assert_close(sol.cost, 0.0, 1e-8);
    // both lower bounds active
    assert_close(sol.lam_x[0], -1.0, 1e-4);
    assert_close(sol.lam_x[1], -1.0, 1e-4);
}

#[test]
fn sparse_diagonal_hessian() {
    // only the diagonal is structurally present
    let structure = QpStructure::bound_only(SparsityPattern::identity(2));
    let mut solver = Qpsol::new("diag", "splitqp", structure, &OptionMap::new()).unwrap();

    let sol = solver
        .eval(&QpInputs {
            h: &[1., 1.],
            g: &[-0.5, -2.],
            a: &[],
            lbx: Some(&[0., 0.]),
            ubx: Some(&[1., 1.]),
            lba: None,
            uba: None,
        })
        .unwrap();

    assert_close(sol.x[0], 0.5, 1e-5);
    assert_close(sol.x[1], 1.0, 1e-5);
    assert_close(sol.cost, -1.625, 1e-6);
    // upper bound active on the second variable only
    assert_close(sol.lam_x[0], 0.0, 1e-4);
    assert_close(sol.lam_x[1], 1.0, 1e-4);
}

#[test]
fn reported_cost_matches_the_returned_point() {
    let (h_sp, h) = demo_h();
    let structure = QpStructure::new(h_sp, SparsityPattern::dense(1, 2));
    let mut solver = Qpsol::new("cost", "splitqp", structure, &OptionMap::new()).unwrap();

    let g = [1., 1.];
    let sol = solver
        .eval(&QpInputs {
            h: &h,
            g: &g,
            a: &[1., 1.],
            lbx: None,
            ubx: None,
            lba: Some(&[1.]),
            uba: Some(&[1.]),
        })
        .unwrap();

    let (x0, x1) = (sol.x[0], sol.x[1]);
    let quad = 0.5 * (x0 * (4. * x0 + x1) + x1 * (x0 + 2. * x1));
    let lin = g[0] * x0 + g[1] * x1;
    assert_close(sol.cost, quad + lin, 1e-8);
}

#[test]
fn infeasible_conflict_raises_solver_failure() {
    // x ≤ 0 from the variable bound but x ≥ 1 from the row
    let structure = QpStructure::new(SparsityPattern::dense(1, 1), SparsityPattern::dense(1, 1));
    let mut solver = Qpsol::new("inf", "splitqp", structure, &OptionMap::new()).unwrap();

    let err = solver
        .eval(&QpInputs {
            h: &[0.],
            g: &[0.],
            a: &[1.],
            lbx: None,
            ubx: Some(&[0.]),
            lba: Some(&[1.]),
            uba: None,
        })
        .err()
        .unwrap();

    let text = err.to_string();
    match err {
        SolverError::SolverFailure {
            backend,
            code,
            message,
        } => {
            assert_eq!(backend, "splitqp");
            assert_eq!(code, 3);
            assert!(message.contains("infeasible"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(text.contains("splitqp"));
    assert!(text.contains("code 3"));
}

#[test]
fn crossing_bounds_are_rejected_before_the_engine() {
    let (h_sp, h) = demo_h();
    let structure = QpStructure::bound_only(h_sp);
    let mut solver = Qpsol::new("cross", "splitqp", structure, &OptionMap::new()).unwrap();

    let err = solver
        .eval(&QpInputs {
            h: &h,
            g: &[1., 1.],
            a: &[],
            lbx: Some(&[1., 0.]),
            ubx: Some(&[0., 1.]),
            lba: None,
            uba: None,
        })
        .err()
        .unwrap();
    match err {
        SolverError::Numeric(msg) => assert!(msg.contains("index 0"), "{msg}"),
        other => panic!("unexpected error {other:?}"),
    }

    // the same data passes once inputs_check is disabled, coming back as
    // an engine failure instead
    let structure = QpStructure::bound_only(SparsityPattern::dense(2, 2));
    let opts = OptionMap::new().with("inputs_check", false);
    let mut solver = Qpsol::new("cross2", "splitqp", structure, &opts).unwrap();
    let err = solver
        .eval(&QpInputs {
            h: &h,
            g: &[1., 1.],
            a: &[],
            lbx: Some(&[1., 0.]),
            ubx: Some(&[0., 1.]),
            lba: None,
            uba: None,
        })
        .err()
        .unwrap();
    assert!(matches!(err, SolverError::SolverFailure { .. }));
}
