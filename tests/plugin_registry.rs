// registration, lookup fallback, shadowing and version checks, observed
// through the linear-solver facade with a mock backend

use portico::algebra::*;
use portico::error::SolverError;
use portico::linsol::*;
use portico::options::{OptionMap, OptionSchema, ResolvedOptions};
use portico::plugin::{PluginRecord, PLUGIN_API_VERSION};

// pretends to factorize anything and writes a marker value on solve
struct MarkerBackend;

impl LinsolBackend<f64> for MarkerBackend {
    fn factorize(&mut self, _values: &[f64]) -> Result<(), SolverError> {
        Ok(())
    }

    fn solve(&mut self, x: &mut [f64], _nrhs: usize, _transpose: bool) -> Result<(), SolverError> {
        for v in x.iter_mut() {
            *v = 7.0;
        }
        Ok(())
    }
}

fn marker_factory(
    _sp: &SparsityPattern,
    _opts: &ResolvedOptions,
) -> Result<BoxedLinsolBackend<f64>, SolverError> {
    Ok(Box::new(MarkerBackend))
}

fn marker_record(name: &'static str, doc: &'static str) -> PluginRecord<LinsolFactory<f64>> {
    PluginRecord {
        name,
        doc,
        api_version: PLUGIN_API_VERSION,
        caps: &[],
        schema: OptionSchema::new(name),
        factory: marker_factory,
    }
}

#[test]
fn registered_backend_is_created_through_the_facade() {
    let reg = registry::<f64>();
    reg.register(marker_record("marker", "writes sevens")).unwrap();
    assert!(reg.has_plugin("marker"));
    assert_eq!(reg.doc("marker").unwrap(), "writes sevens");

    let mut solver = Linsol::with_registry(
        &reg,
        "mock",
        "marker",
        SparsityPattern::identity(2),
        &OptionMap::new(),
    )
    .unwrap();
    let x = solver.eval(&[1., 1.], &[0., 0.], false).unwrap();
    assert_eq!(x, vec![7., 7.]);
}

#[test]
fn transpose_requires_the_capability() {
    let reg = registry::<f64>();
    reg.register(marker_record("marker", "writes sevens")).unwrap();

    let mut solver = Linsol::with_registry(
        &reg,
        "mock",
        "marker",
        SparsityPattern::identity(2),
        &OptionMap::new(),
    )
    .unwrap();
    solver.factorize(&[1., 1.]).unwrap();
    let mut x = vec![0., 0.];
    let err = solver.solve_in_place(&mut x, 1, true).err().unwrap();
    match err {
        SolverError::UnsupportedOperation(msg) => assert!(msg.contains("marker"), "{msg}"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn duplicate_registration_replaces_and_returns_the_prior() {
    let reg = registry::<f64>();
    let first = reg.register(marker_record("marker", "first")).unwrap();
    assert!(first.is_none());

    let prior = reg
        .register(marker_record("marker", "second"))
        .unwrap()
        .expect("prior record");
    assert_eq!(prior.doc, "first");
    assert_eq!(reg.doc("marker").unwrap(), "second");
}

#[test]
fn shadowing_a_builtin_wins_the_lookup() {
    let reg = registry::<f64>();
    reg.register(marker_record("denselu", "impostor")).unwrap();

    let mut solver = Linsol::with_registry(
        &reg,
        "shadowed",
        "denselu",
        SparsityPattern::identity(2),
        &OptionMap::new(),
    )
    .unwrap();
    let x = solver.eval(&[1., 1.], &[3., 4.], false).unwrap();
    // the impostor answered, not the real dense LU
    assert_eq!(x, vec![7., 7.]);
}

#[test]
fn version_mismatch_is_rejected() {
    let reg = registry::<f64>();
    let mut record = marker_record("stale", "built long ago");
    record.api_version = PLUGIN_API_VERSION + 1;
    let err = reg.register(record).err().unwrap();
    match err {
        SolverError::Configuration(msg) => assert!(msg.contains("API version"), "{msg}"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn builtin_manifest_backs_the_lookup() {
    let reg = registry::<f64>();
    // nothing registered explicitly, yet the builtins resolve
    assert!(reg.has_plugin("denselu"));
    assert!(reg.has_plugin("sldl"));
    assert!(!reg.has_plugin("ipopt"));

    reg.load("sldl").unwrap();
    // loading twice is idempotent
    reg.load("sldl").unwrap();
    assert!(reg.record("sldl").is_ok());

    let err = reg.load("ipopt").err().unwrap();
    assert!(matches!(err, SolverError::PluginNotFound(_)));
}

#[test]
fn registry_reports_its_class_and_names() {
    let reg = registry::<f64>();
    assert_eq!(reg.class(), "linsol");
    let names = reg.names();
    assert!(names.contains(&"denselu"));
    assert!(names.contains(&"sldl"));
}
