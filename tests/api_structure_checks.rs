// structural and configuration mistakes must come back as typed errors
// from the facades, never as panics

use portico::algebra::*;
use portico::error::SolverError;
use portico::linsol::Linsol;
use portico::options::OptionMap;
use portico::qpsol::{QpInputs, QpStructure, Qpsol};

fn config_message(err: SolverError) -> String {
    match err {
        SolverError::Configuration(msg) => msg,
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[test]
fn empty_column_is_rejected_at_construction() {
    // second column holds no entries
    let sp = SparsityPattern::new(2, 2, vec![0, 1, 1], vec![0]).unwrap();
    for plugin in ["denselu", "sldl"] {
        let msg = config_message(
            Linsol::new("bad", plugin, sp.clone(), &OptionMap::new())
                .err()
                .unwrap(),
        );
        assert!(msg.contains("structurally singular"), "{msg}");
    }
}

#[test]
fn empty_row_is_rejected_at_construction() {
    // both entries sit in row 0, leaving row 1 empty
    let sp = SparsityPattern::new(2, 2, vec![0, 1, 2], vec![0, 0]).unwrap();
    let msg = config_message(
        Linsol::new("bad", "denselu", sp, &OptionMap::new())
            .err()
            .unwrap(),
    );
    assert!(msg.contains("structurally singular"), "{msg}");
}

#[test]
fn rectangular_pattern_is_rejected() {
    let sp = SparsityPattern::dense(2, 3);
    let err = Linsol::new("rect", "denselu", sp, &OptionMap::new())
        .err()
        .unwrap();
    assert!(matches!(err, SolverError::Configuration(_)));
}

#[test]
fn unknown_plugin_is_reported_by_name() {
    let sp = SparsityPattern::identity(2);
    let err = Linsol::new("x", "nonexistent-backend", sp, &OptionMap::new())
        .err()
        .unwrap();
    match &err {
        SolverError::PluginNotFound(name) => assert_eq!(name, "nonexistent-backend"),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("nonexistent-backend"));
}

#[test]
fn factorize_checks_the_value_count() {
    let sp = SparsityPattern::identity(3);
    let mut solver = Linsol::new("count", "denselu", sp, &OptionMap::new()).unwrap();
    let err = solver.factorize(&[1., 1.]).err().unwrap();
    assert!(matches!(err, SolverError::Configuration(_)));
}

#[test]
fn solve_before_factorize_is_a_state_error() {
    let sp = SparsityPattern::identity(2);
    let mut solver = Linsol::new("state", "sldl", sp, &OptionMap::new()).unwrap();
    let mut x = vec![1., 2.];
    let err = solver.solve_in_place(&mut x, 1, false).err().unwrap();
    assert!(matches!(err, SolverError::State(_)));
}

#[test]
fn rhs_length_must_match_column_count() {
    let sp = SparsityPattern::identity(2);
    let mut solver = Linsol::new("rhs", "denselu", sp, &OptionMap::new()).unwrap();
    solver.factorize(&[1., 1.]).unwrap();
    let mut x = vec![1., 2., 3.];
    let err = solver.solve_in_place(&mut x, 1, false).err().unwrap();
    assert!(matches!(err, SolverError::Configuration(_)));

    // the combined path rejects fractional column counts too
    let err = solver.eval(&[1., 1.], &[1., 2., 3.], false).err().unwrap();
    assert!(matches!(err, SolverError::Configuration(_)));
}

#[test]
fn unknown_option_lists_the_recognized_keys() {
    let sp = SparsityPattern::identity(2);
    let msg = config_message(
        Linsol::new("opt", "sldl", sp, &OptionMap::new().with("verbosity", 3))
            .err()
            .unwrap(),
    );
    assert!(msg.contains("unknown option 'verbosity'"), "{msg}");
    assert!(msg.contains("ordering"), "{msg}");
}

#[test]
fn enum_option_rejects_unlisted_tokens() {
    let structure = QpStructure::bound_only(SparsityPattern::identity(2));
    let opts = OptionMap::new().with("print_level", "extreme");
    let msg = config_message(
        Qpsol::new("enum", "splitqp", structure, &opts).err().unwrap(),
    );
    assert!(msg.contains("extreme"), "{msg}");
    assert!(msg.contains("none|low|medium|high"), "{msg}");
}

#[test]
fn option_type_mismatch_names_both_types() {
    let structure = QpStructure::bound_only(SparsityPattern::identity(2));
    let opts = OptionMap::new().with("polish", 3);
    let msg = config_message(
        Qpsol::new("type", "splitqp", structure, &opts).err().unwrap(),
    );
    assert!(msg.contains("bool"), "{msg}");
    assert!(msg.contains("int"), "{msg}");
}

#[test]
fn integer_widens_where_a_real_is_declared() {
    let structure = QpStructure::bound_only(SparsityPattern::identity(2));
    let opts = OptionMap::new().with("rho", 1);
    assert!(Qpsol::new("widen", "splitqp", structure, &opts).is_ok());
}

#[test]
fn qp_eval_checks_every_slot_length() {
    let structure = QpStructure::bound_only(SparsityPattern::identity(2));
    let mut solver = Qpsol::new("len", "splitqp", structure, &OptionMap::new()).unwrap();

    // gradient too short
    let err = solver
        .eval(&QpInputs {
            h: &[1., 1.],
            g: &[1.],
            a: &[],
            lbx: None,
            ubx: None,
            lba: None,
            uba: None,
        })
        .err()
        .unwrap();
    assert!(matches!(err, SolverError::Configuration(_)));

    // bound slice of the wrong length
    let err = solver
        .eval(&QpInputs {
            h: &[1., 1.],
            g: &[1., 1.],
            a: &[],
            lbx: Some(&[0.]),
            ubx: None,
            lba: None,
            uba: None,
        })
        .err()
        .unwrap();
    assert!(matches!(err, SolverError::Configuration(_)));
}

#[test]
fn qp_structure_shape_mismatches_are_rejected() {
    // constraint pattern over the wrong variable count
    let structure = QpStructure::new(SparsityPattern::identity(3), SparsityPattern::dense(1, 2));
    let err = Qpsol::new("mismatch", "splitqp", structure, &OptionMap::new())
        .err()
        .unwrap();
    assert!(matches!(err, SolverError::Configuration(_)));

    let structure = QpStructure::new(SparsityPattern::dense(2, 3), SparsityPattern::dense(1, 3));
    let err = Qpsol::new("rect-h", "splitqp", structure, &OptionMap::new())
        .err()
        .unwrap();
    assert!(matches!(err, SolverError::Configuration(_)));
}
