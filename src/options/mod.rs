//! Per-solver-class option schemas: declaration, validation and resolution
//! of user configuration before a backend instance exists.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::error::SolverError;

/// A single configuration value supplied by a caller or declared as a
/// default.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
}

impl OptionValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "bool",
            OptionValue::Int(_) => "int",
            OptionValue::Real(_) => "real",
            OptionValue::Str(_) => "str",
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}
impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}
impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(v as i64)
    }
}
impl From<usize> for OptionValue {
    fn from(v: usize) -> Self {
        OptionValue::Int(v as i64)
    }
}
impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Real(v)
    }
}
impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}
impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Str(v)
    }
}

/// Declared type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    Bool,
    Int,
    Real,
    Str,
}

impl OptionType {
    fn name(self) -> &'static str {
        match self {
            OptionType::Bool => "bool",
            OptionType::Int => "int",
            OptionType::Real => "real",
            OptionType::Str => "str",
        }
    }

    // integers widen to reals, nothing else converts
    fn accepts(self, value: &OptionValue) -> bool {
        matches!(
            (self, value),
            (OptionType::Bool, OptionValue::Bool(_))
                | (OptionType::Int, OptionValue::Int(_))
                | (OptionType::Real, OptionValue::Real(_))
                | (OptionType::Real, OptionValue::Int(_))
                | (OptionType::Str, OptionValue::Str(_))
        )
    }
}

/// Declaration of one option: name, type, optional default, documentation
/// and, for enumerated string options, the closed set of accepted tokens.
///
/// Options without a declared default are resolved only when the user sets
/// them; backends compute their own fallback in that case (for example an
/// iteration budget derived from the problem dimensions).
#[derive(Debug, Clone)]
pub struct OptionSpec {
    pub name: &'static str,
    pub otype: OptionType,
    pub default: Option<OptionValue>,
    pub doc: &'static str,
    pub allowed: Option<&'static [&'static str]>,
}

/// User-supplied option overrides keyed by option name.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptionMap(BTreeMap<String, OptionValue>);

impl OptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    ///
    /// # Example
    /// ```
    /// use portico::options::OptionMap;
    /// let opts = OptionMap::new().with("print_level", "low").with("rho", 0.2);
    /// assert_eq!(opts.len(), 2);
    /// ```
    pub fn with(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<OptionValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// The recognized option set for one solver class.
///
/// Built once when a plugin record is created and read-many thereafter.
/// Validation rejects unknown keys, type mismatches and enumeration
/// violations with messages naming what was expected.
#[derive(Debug, Clone)]
pub struct OptionSchema {
    class: &'static str,
    specs: BTreeMap<&'static str, OptionSpec>,
}

impl OptionSchema {
    pub fn new(class: &'static str) -> Self {
        Self {
            class,
            specs: BTreeMap::new(),
        }
    }

    /// Declare an option.  Redeclaring a name is a programming error.
    pub fn declare(
        mut self,
        name: &'static str,
        otype: OptionType,
        default: Option<OptionValue>,
        doc: &'static str,
    ) -> Self {
        self.insert(OptionSpec {
            name,
            otype,
            default,
            doc,
            allowed: None,
        });
        self
    }

    /// Declare an enumerated string option with a closed token set.
    pub fn declare_enum(
        mut self,
        name: &'static str,
        default: Option<&'static str>,
        doc: &'static str,
        allowed: &'static [&'static str],
    ) -> Self {
        assert!(!allowed.is_empty());
        self.insert(OptionSpec {
            name,
            otype: OptionType::Str,
            default: default.map(OptionValue::from),
            doc,
            allowed: Some(allowed),
        });
        self
    }

    fn insert(&mut self, spec: OptionSpec) {
        if let Some(default) = &spec.default {
            assert!(
                spec.otype.accepts(default),
                "default for option '{}' does not match its declared type",
                spec.name
            );
        }
        let prior = self.specs.insert(spec.name, spec);
        assert!(prior.is_none(), "option declared twice");
    }

    pub fn class(&self) -> &'static str {
        self.class
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn spec(&self, name: &str) -> Option<&OptionSpec> {
        self.specs.get(name)
    }

    /// Check user overrides against the declarations.
    pub fn validate(&self, user: &OptionMap) -> Result<(), SolverError> {
        for (name, value) in user.iter() {
            let Some(spec) = self.specs.get(name) else {
                return Err(SolverError::Configuration(format!(
                    "unknown option '{}' for {}; recognized options are: {}",
                    name,
                    self.class,
                    self.names().join(", ")
                )));
            };
            if !spec.otype.accepts(value) {
                return Err(SolverError::Configuration(format!(
                    "option '{}' for {} expects type {}, got {}",
                    name,
                    self.class,
                    spec.otype.name(),
                    value.type_name()
                )));
            }
            if let (Some(allowed), OptionValue::Str(tok)) = (spec.allowed, value) {
                if !allowed.contains(&tok.as_str()) {
                    return Err(SolverError::Configuration(format!(
                        "option '{}' for {} got invalid value \"{}\"; allowed values are: {}",
                        name,
                        self.class,
                        tok,
                        allowed.join("|")
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validate and merge user overrides with declared defaults.
    ///
    /// Options without a declared default appear in the result only when
    /// the user set them.
    pub fn resolve(&self, user: &OptionMap) -> Result<ResolvedOptions, SolverError> {
        self.validate(user)?;
        let mut map = BTreeMap::new();
        for (name, spec) in &self.specs {
            let value = match user.get(name) {
                Some(v) => Some(v.clone()),
                None => spec.default.clone(),
            };
            if let Some(v) = value {
                map.insert(*name, v);
            }
        }
        Ok(ResolvedOptions { map })
    }

    /// Formatted listing of every declared option with type, default and,
    /// for enumerations, the exact accepted tokens.
    pub fn doc(&self) -> String {
        let mut out = format!("Options recognized by {}:\n", self.class);
        for spec in self.specs.values() {
            let default = match &spec.default {
                Some(OptionValue::Str(s)) => format!("\"{}\"", s),
                Some(OptionValue::Bool(b)) => b.to_string(),
                Some(OptionValue::Int(i)) => i.to_string(),
                Some(OptionValue::Real(r)) => r.to_string(),
                None => "(unset)".to_string(),
            };
            let _ = write!(
                out,
                "  {:<16} {:<5} default {:<10} {}",
                spec.name,
                spec.otype.name(),
                default,
                spec.doc
            );
            if let Some(allowed) = spec.allowed {
                let _ = write!(out, " [{}]", allowed.join("|"));
            }
            out.push('\n');
        }
        out
    }

    fn names(&self) -> Vec<&'static str> {
        self.specs.keys().copied().collect()
    }
}

/// Effective configuration produced by [`OptionSchema::resolve`]: the user
/// override where one was given, the declared default otherwise.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    map: BTreeMap<&'static str, OptionValue>,
}

impl ResolvedOptions {
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.map.get(name)
    }

    /// # Panics
    /// Panics if the option is unset or was not declared as bool.
    pub fn bool(&self, name: &str) -> bool {
        match self.map.get(name) {
            Some(OptionValue::Bool(v)) => *v,
            _ => panic!("option '{}' is not a resolved bool", name),
        }
    }

    /// # Panics
    /// Panics if the option is unset or was not declared as int.
    pub fn int(&self, name: &str) -> i64 {
        match self.map.get(name) {
            Some(OptionValue::Int(v)) => *v,
            _ => panic!("option '{}' is not a resolved int", name),
        }
    }

    /// Integer values widen to real here, matching validation.
    ///
    /// # Panics
    /// Panics if the option is unset or was not declared as real.
    pub fn real(&self, name: &str) -> f64 {
        match self.map.get(name) {
            Some(OptionValue::Real(v)) => *v,
            Some(OptionValue::Int(v)) => *v as f64,
            _ => panic!("option '{}' is not a resolved real", name),
        }
    }

    /// # Panics
    /// Panics if the option is unset or was not declared as str.
    pub fn str(&self, name: &str) -> &str {
        match self.map.get(name) {
            Some(OptionValue::Str(v)) => v,
            _ => panic!("option '{}' is not a resolved str", name),
        }
    }

    pub fn opt_int(&self, name: &str) -> Option<i64> {
        match self.map.get(name) {
            Some(OptionValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn opt_real(&self, name: &str) -> Option<f64> {
        match self.map.get(name) {
            Some(OptionValue::Real(v)) => Some(*v),
            Some(OptionValue::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn schema() -> OptionSchema {
        OptionSchema::new("testclass")
            .declare(
                "verbose",
                OptionType::Bool,
                Some(false.into()),
                "enable progress output",
            )
            .declare("tol", OptionType::Real, Some(1e-8.into()), "tolerance")
            .declare(
                "budget",
                OptionType::Int,
                None,
                "iteration budget; backend-derived when unset",
            )
            .declare_enum(
                "print_level",
                Some("none"),
                "verbosity",
                &["none", "low", "medium", "high"],
            )
    }

    #[test]
    fn test_resolve_defaults_and_overrides() {
        let s = schema();
        let user = OptionMap::new().with("tol", 1e-3).with("budget", 10);
        let r = s.resolve(&user).unwrap();

        assert!(!r.bool("verbose"));
        assert_eq!(r.real("tol"), 1e-3);
        assert_eq!(r.opt_int("budget"), Some(10));
        assert_eq!(r.str("print_level"), "none");

        // unset option with no declared default stays absent
        let r = s.resolve(&OptionMap::new()).unwrap();
        assert_eq!(r.opt_int("budget"), None);
    }

    #[test]
    fn test_unknown_option_rejected() {
        let err = schema().resolve(&OptionMap::new().with("bogus", 1)).err();
        let Some(SolverError::Configuration(msg)) = err else {
            panic!("expected configuration error");
        };
        assert!(msg.contains("bogus"));
        assert!(msg.contains("testclass"));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let err = schema().validate(&OptionMap::new().with("verbose", 1)).err();
        let Some(SolverError::Configuration(msg)) = err else {
            panic!("expected configuration error");
        };
        assert!(msg.contains("verbose"));
        assert!(msg.contains("bool"));
    }

    #[test]
    fn test_int_widens_to_real() {
        let r = schema().resolve(&OptionMap::new().with("tol", 2)).unwrap();
        assert_eq!(r.real("tol"), 2.0);
    }

    #[test]
    fn test_enum_round_trip() {
        let s = schema();
        assert!(s.validate(&OptionMap::new().with("print_level", "low")).is_ok());

        let err = s
            .validate(&OptionMap::new().with("print_level", "extreme"))
            .err();
        let Some(SolverError::Configuration(msg)) = err else {
            panic!("expected configuration error");
        };
        assert!(msg.contains("extreme"));
        assert!(msg.contains("none|low|medium|high"));
    }

    #[test]
    fn test_doc_lists_tokens() {
        let doc = schema().doc();
        assert!(doc.contains("print_level"));
        assert!(doc.contains("none|low|medium|high"));
        assert!(doc.contains("(unset)"));
    }
}
