//! Declarative parameter metadata for elements.
//!
//! Every element variant carries a `static` [`ParameterRegistry`] describing
//! which of its parameters may change after construction and what a change
//! costs: nothing ([`ParamClass::Free`]), a re-run of `init()`
//! ([`ParamClass::InitRequired`]), or a re-run of `init()` plus re-validation
//! on every step ([`ParamClass::InitStepRequired`]).
//! The registry backs the by-name parameter surface
//! ([`Element::set_parameter`](crate::element::Element::set_parameter));
//! the values themselves live in strongly typed fields on each element.

use crate::element::FloatValue;
use crate::errors::{NFieldError, NFieldResult};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// Mutability class of a single element parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamClass {
    /// Set only at construction; any later change is an error.
    Fixed,
    /// May be set at any time, but `init()` must run again before the next
    /// `step()` is valid.
    InitRequired,
    /// As [`ParamClass::InitRequired`], and the element re-validates its
    /// configuration on every step.
    InitStepRequired,
    /// May change freely between steps.
    Free,
}

impl ParamClass {
    /// Whether changing a parameter of this class invalidates the last `init()`.
    pub fn requires_init(self) -> bool {
        matches!(self, ParamClass::InitRequired | ParamClass::InitStepRequired)
    }
}

/// Per-element table of parameter names and their mutability classes.
///
/// Constructed as a `static` per element variant, so the metadata exists
/// independently of any instance. A name not present in the registry is
/// treated as non-existent.
#[derive(Debug, Clone, Copy)]
pub struct ParameterRegistry {
    entries: &'static [(&'static str, ParamClass)],
}

impl ParameterRegistry {
    pub const fn new(entries: &'static [(&'static str, ParamClass)]) -> Self {
        Self { entries }
    }

    /// The mutability class of `name`, or `None` for an undeclared parameter.
    pub fn class(&self, name: &str) -> Option<ParamClass> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, class)| *class)
    }

    /// Whether changing `name` requires `init()` to run before the next step.
    pub fn requires_init(&self, name: &str) -> bool {
        self.class(name).is_some_and(ParamClass::requires_init)
    }

    /// Whether `name` may be set after construction at all.
    pub fn settable(&self, name: &str) -> bool {
        self.class(name)
            .is_some_and(|class| class != ParamClass::Fixed)
    }

    /// Whether any parameter forces configuration checks on every step.
    pub fn validates_every_step(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, class)| *class == ParamClass::InitStepRequired)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, ParamClass)> + '_ {
        self.entries.iter().copied()
    }
}

/// A dynamically supplied parameter value.
///
/// Used by the by-name setter surface; each element coerces the value into
/// its typed field and rejects mismatched kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Scalar(FloatValue),
    Flag(bool),
    Count(usize),
    Shape(Vec<usize>),
    /// Inclusive `[start, end]` activation intervals.
    Intervals(Vec<[FloatValue; 2]>),
    Array(ArrayD<FloatValue>),
}

impl ParamValue {
    fn kind(&self) -> &'static str {
        match self {
            ParamValue::Scalar(_) => "scalar",
            ParamValue::Flag(_) => "flag",
            ParamValue::Count(_) => "count",
            ParamValue::Shape(_) => "shape",
            ParamValue::Intervals(_) => "intervals",
            ParamValue::Array(_) => "array",
        }
    }

    fn mismatch(&self, element: &str, name: &str, expected: &'static str) -> NFieldError {
        NFieldError::UnsupportedConfiguration {
            element: element.to_string(),
            reason: format!(
                "parameter {} expects a {} value, got a {} value",
                name,
                expected,
                self.kind()
            ),
        }
    }

    pub fn into_scalar(self, element: &str, name: &str) -> NFieldResult<FloatValue> {
        match self {
            ParamValue::Scalar(v) => Ok(v),
            other => Err(other.mismatch(element, name, "scalar")),
        }
    }

    pub fn into_flag(self, element: &str, name: &str) -> NFieldResult<bool> {
        match self {
            ParamValue::Flag(v) => Ok(v),
            other => Err(other.mismatch(element, name, "flag")),
        }
    }

    pub fn into_count(self, element: &str, name: &str) -> NFieldResult<usize> {
        match self {
            ParamValue::Count(v) => Ok(v),
            other => Err(other.mismatch(element, name, "count")),
        }
    }

    pub fn into_intervals(self, element: &str, name: &str) -> NFieldResult<Vec<[FloatValue; 2]>> {
        match self {
            ParamValue::Intervals(v) => Ok(v),
            other => Err(other.mismatch(element, name, "intervals")),
        }
    }

    pub fn into_array(self, element: &str, name: &str) -> NFieldResult<ArrayD<FloatValue>> {
        match self {
            ParamValue::Array(v) => Ok(v),
            other => Err(other.mismatch(element, name, "array")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static REGISTRY: ParameterRegistry = ParameterRegistry::new(&[
        ("size", ParamClass::Fixed),
        ("sigma", ParamClass::InitRequired),
        ("circular", ParamClass::InitStepRequired),
        ("amplitude", ParamClass::Free),
    ]);

    #[test]
    fn class_lookup() {
        assert_eq!(REGISTRY.class("size"), Some(ParamClass::Fixed));
        assert_eq!(REGISTRY.class("amplitude"), Some(ParamClass::Free));
        assert_eq!(REGISTRY.class("missing"), None);
    }

    #[test]
    fn init_requirements() {
        assert!(REGISTRY.requires_init("sigma"));
        assert!(REGISTRY.requires_init("circular"));
        assert!(!REGISTRY.requires_init("amplitude"));
        assert!(!REGISTRY.requires_init("missing"));
    }

    #[test]
    fn settability() {
        assert!(!REGISTRY.settable("size"));
        assert!(REGISTRY.settable("sigma"));
        assert!(!REGISTRY.settable("missing"));
    }

    #[test]
    fn step_validation_flag() {
        assert!(REGISTRY.validates_every_step());

        static PLAIN: ParameterRegistry =
            ParameterRegistry::new(&[("amplitude", ParamClass::Free)]);
        assert!(!PLAIN.validates_every_step());
    }

    #[test]
    fn value_coercion() {
        assert_eq!(
            ParamValue::Scalar(2.5).into_scalar("stim", "sigma").unwrap(),
            2.5
        );
        let err = ParamValue::Flag(true)
            .into_scalar("stim", "sigma")
            .unwrap_err();
        assert!(err.to_string().contains("expects a scalar"));
    }
}
