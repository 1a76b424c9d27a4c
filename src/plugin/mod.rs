//! Plugin registries: named factories for interchangeable solver backends.
//!
//! Each solver class (linear solvers, QP solvers, NLP solvers) owns one
//! [`PluginRegistry`] parameterized over that class's factory signature.
//! Builtin backends are listed in a manifest and instantiated on first
//! use; callers may also register additional backends at runtime.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use crate::error::SolverError;
use crate::options::OptionSchema;

/// Version of the registration protocol.  Records carrying a different
/// value are refused, so a stale plugin fails loudly at registration
/// rather than obscurely at solve time.
pub const PLUGIN_API_VERSION: u32 = 1;

/// One registered backend: identity, documentation and the factory that
/// constructs instances of it.
#[derive(Debug, Clone)]
pub struct PluginRecord<F> {
    /// Name the backend is requested by, e.g. `"splitqp"`.
    pub name: &'static str,
    /// Short human-readable description.
    pub doc: &'static str,
    /// Must equal [`PLUGIN_API_VERSION`].
    pub api_version: u32,
    /// Capability tags, e.g. `"cholesky"` or `"warm_start"`.
    pub caps: &'static [&'static str],
    /// Options this backend recognizes.
    pub schema: OptionSchema,
    pub factory: F,
}

impl<F> PluginRecord<F> {
    pub fn has_cap(&self, cap: &str) -> bool {
        self.caps.contains(&cap)
    }
}

/// Registry for one solver class.
///
/// The manifest maps builtin names to record constructors; the table holds
/// records actually registered or loaded.  Lookups consult the table first
/// and fall back to loading from the manifest, so builtins cost nothing
/// until requested and a runtime registration under a builtin name shadows
/// the builtin.
pub struct PluginRegistry<F: Clone> {
    class: &'static str,
    manifest: BTreeMap<&'static str, fn() -> PluginRecord<F>>,
    table: RwLock<BTreeMap<&'static str, PluginRecord<F>>>,
}

impl<F: Clone> PluginRegistry<F> {
    pub fn new(class: &'static str) -> Self {
        Self::with_manifest(class, [])
    }

    pub fn with_manifest(
        class: &'static str,
        builtins: impl IntoIterator<Item = (&'static str, fn() -> PluginRecord<F>)>,
    ) -> Self {
        Self {
            class,
            manifest: builtins.into_iter().collect(),
            table: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn class(&self) -> &'static str {
        self.class
    }

    /// Register a backend, replacing any record already present under the
    /// same name.  Returns the replaced record so callers can detect
    /// shadowing.
    pub fn register(
        &self,
        record: PluginRecord<F>,
    ) -> Result<Option<PluginRecord<F>>, SolverError> {
        if record.api_version != PLUGIN_API_VERSION {
            return Err(SolverError::Configuration(format!(
                "plugin \"{}\" was built against {} API version {}, expected {}",
                record.name, self.class, record.api_version, PLUGIN_API_VERSION
            )));
        }
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        Ok(table.insert(record.name, record))
    }

    /// Force-load a builtin from the manifest.  Idempotent; a backend
    /// already in the table (builtin or user-registered) is left alone.
    pub fn load(&self, name: &str) -> Result<(), SolverError> {
        {
            let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
            if table.contains_key(name) {
                return Ok(());
            }
        }
        let Some(make) = self.manifest.get(name) else {
            return Err(self.not_found(name));
        };
        let record = make();
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        table.entry(record.name).or_insert(record);
        Ok(())
    }

    /// Look up a backend by name, loading it from the manifest if needed.
    pub fn record(&self, name: &str) -> Result<PluginRecord<F>, SolverError> {
        {
            let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(rec) = table.get(name) {
                return Ok(rec.clone());
            }
        }
        self.load(name)?;
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .get(name)
            .cloned()
            .ok_or_else(|| self.not_found(name))
    }

    /// Whether `name` is registered or available as a builtin.
    pub fn has_plugin(&self, name: &str) -> bool {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.contains_key(name) || self.manifest.contains_key(name)
    }

    /// Documentation for a backend: its description, followed by the option
    /// listing from its schema when it declares any.
    pub fn doc(&self, name: &str) -> Result<String, SolverError> {
        let rec = self.record(name)?;
        if rec.schema.is_empty() {
            return Ok(rec.doc.to_string());
        }
        Ok(format!("{}\n\n{}", rec.doc, rec.schema.doc()))
    }

    /// Names of every backend visible to this registry, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<&'static str> = table.keys().copied().collect();
        names.extend(self.manifest.keys().copied());
        names.sort_unstable();
        names.dedup();
        names
    }

    fn not_found(&self, name: &str) -> SolverError {
        SolverError::PluginNotFound(name.to_string())
    }
}
