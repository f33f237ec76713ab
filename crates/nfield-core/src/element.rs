//! The element abstraction: lifecycle, ports, and the step contract.
//!
//! An element is a self-contained computational unit with typed parameters,
//! named output buffers, and a two-phase lifecycle: `init()` allocates the
//! output buffers and any cached derived quantities from the current
//! parameters, then `step(time, delta_t, inputs)` repeatedly updates the
//! buffers in place. Inputs are passed explicitly as an ordered sequence of
//! read-only views, so the wiring contract is visible at the call site and an
//! element can be driven in isolation from any simulator.
//!
//! Variants implement the `*_element` hooks plus the declarative metadata
//! accessors; the provided methods on [`Element`] enforce the lifecycle
//! state machine, the parameter registry, and the component table uniformly.

use crate::errors::{NFieldError, NFieldResult};
use crate::parameters::{ParamValue, ParameterRegistry};
use crate::ports::ComponentTable;
use ndarray::ArrayViewD;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Simulation time, advanced externally in fixed increments.
pub type Time = f64;

/// Scalar type of all signal buffers.
pub type FloatValue = f64;

/// Lifecycle phase of an element.
///
/// `init()` moves an element from any phase to `Initialized`; stepping keeps
/// it in `Stepped`; mutating a parameter that invalidates the last `init()`
/// moves it to `Dirty`, in which stepping is illegal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Constructed,
    Initialized,
    Stepped,
    Dirty,
}

/// Lifecycle state owned by every element.
///
/// Tracks the current [`Phase`] and the names of parameters changed since the
/// last `init()`, so that the error raised on a premature step can say which
/// changes invalidated the element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lifecycle {
    phase: Phase,
    dirty: Vec<String>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: Phase::Constructed,
            dirty: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether `init()` must run before the next `step()` is valid.
    pub fn needs_init(&self) -> bool {
        matches!(self.phase, Phase::Constructed | Phase::Dirty)
    }

    /// Names of init-requiring parameters changed since the last `init()`.
    pub fn dirty_parameters(&self) -> &[String] {
        &self.dirty
    }

    pub fn mark_initialized(&mut self) {
        self.dirty.clear();
        self.phase = Phase::Initialized;
    }

    pub fn mark_stepped(&mut self) {
        self.phase = Phase::Stepped;
    }

    /// Record a change to an init-requiring parameter.
    ///
    /// Before the first `init()` the element simply stays `Constructed`;
    /// afterwards it becomes `Dirty` until `init()` runs again.
    pub fn mark_dirty(&mut self, name: &str) {
        if !self.dirty.iter().any(|entry| entry == name) {
            self.dirty.push(name.to_string());
        }
        if self.phase != Phase::Constructed {
            self.phase = Phase::Dirty;
        }
    }

    fn ensure_steppable(&self, label: &str) -> NFieldResult<()> {
        match self.phase {
            Phase::Initialized | Phase::Stepped => Ok(()),
            Phase::Constructed => Err(NFieldError::StaleState {
                element: label.to_string(),
                reason: "init() has never been called".to_string(),
            }),
            Phase::Dirty => Err(NFieldError::StaleState {
                element: label.to_string(),
                reason: format!(
                    "parameters changed since the last init(): {}",
                    self.dirty.join(", ")
                ),
            }),
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of input slots an element accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputArity {
    Exactly(usize),
    AtLeast(usize),
    Any,
}

impl InputArity {
    pub fn accepts(&self, actual: usize) -> bool {
        match self {
            InputArity::Exactly(n) => actual == *n,
            InputArity::AtLeast(n) => actual >= *n,
            InputArity::Any => true,
        }
    }
}

impl std::fmt::Display for InputArity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputArity::Exactly(n) => write!(f, "exactly {}", n),
            InputArity::AtLeast(n) => write!(f, "at least {}", n),
            InputArity::Any => write!(f, "any number of"),
        }
    }
}

/// Check an input buffer's shape against the shape an element expects.
///
/// Mismatched geometry is fatal: stepping against a stale or wrongly sized
/// buffer must never produce silently wrong output.
pub fn expect_shape(element: &str, expected: &[usize], actual: &[usize]) -> NFieldResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(NFieldError::ShapeMismatch {
            element: element.to_string(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        })
    }
}

/// Check the number of bound inputs against an element's declared arity.
pub fn expect_input_count(element: &str, arity: InputArity, actual: usize) -> NFieldResult<()> {
    if arity.accepts(actual) {
        Ok(())
    } else {
        Err(NFieldError::InputArityMismatch {
            element: element.to_string(),
            expected: arity.to_string(),
            actual,
        })
    }
}

/// A computational unit in a neural-field architecture.
///
/// Implementations provide the declarative metadata (label, parameter
/// registry, component table, input arity), the raw buffer lookup, and the
/// three hooks `apply_parameter` / `init_element` / `step_element`. The
/// provided methods wrap the hooks with the lifecycle and registry checks and
/// are what the simulator (and tests) call.
#[typetag::serde(tag = "type")]
pub trait Element: Debug {
    /// Unique label of this element, stable for its lifetime.
    fn label(&self) -> &str;

    /// Declarative parameter metadata for this variant.
    fn parameters(&self) -> &'static ParameterRegistry;

    /// Declared output components and the default component name.
    fn components(&self) -> &'static ComponentTable;

    /// Number of input slots this element expects to be wired with.
    fn input_arity(&self) -> InputArity;

    fn lifecycle(&self) -> &Lifecycle;

    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    /// Raw buffer lookup for a declared component name.
    ///
    /// Callers go through [`Element::output`], which applies the component
    /// table first; `name` is therefore always one of the declared names.
    fn component(&self, name: &str) -> Option<ArrayViewD<'_, FloatValue>>;

    /// Write a dynamically supplied value into the matching typed field.
    ///
    /// Registry and lifecycle checks have already happened in
    /// [`Element::set_parameter`]; implementations only coerce and store.
    fn apply_parameter(&mut self, name: &str, value: ParamValue) -> NFieldResult<()>;

    /// Allocate output buffers and recompute cached quantities from the
    /// current parameters. Must be idempotent.
    fn init_element(&mut self) -> NFieldResult<()>;

    /// Read the bound inputs and update the output buffers in place.
    fn step_element(
        &mut self,
        time: Time,
        delta_t: Time,
        inputs: &[ArrayViewD<FloatValue>],
    ) -> NFieldResult<()>;

    /// (Re)initialise the element. Legal in every phase; clears dirty state.
    fn init(&mut self) -> NFieldResult<()> {
        self.init_element()?;
        self.lifecycle_mut().mark_initialized();
        Ok(())
    }

    /// Advance the element one tick.
    ///
    /// Fails with `StaleState` unless the element is `Initialized` or
    /// `Stepped`. On success the element is left in `Stepped`, a safe
    /// resumption state; on error the output buffers retain their prior
    /// contents.
    fn step(
        &mut self,
        time: Time,
        delta_t: Time,
        inputs: &[ArrayViewD<FloatValue>],
    ) -> NFieldResult<()> {
        self.lifecycle().ensure_steppable(self.label())?;
        self.step_element(time, delta_t, inputs)?;
        self.lifecycle_mut().mark_stepped();
        Ok(())
    }

    /// Set a parameter by name, enforcing the registry contract.
    ///
    /// Unknown names fail with `UnknownParameter`, fixed parameters with
    /// `ImmutableParameter`. Changing an init-requiring parameter marks the
    /// element dirty so a premature `step()` fails with `StaleState`.
    fn set_parameter(&mut self, name: &str, value: ParamValue) -> NFieldResult<()> {
        let class = match self.parameters().class(name) {
            Some(class) => class,
            None => {
                return Err(NFieldError::UnknownParameter {
                    element: self.label().to_string(),
                    name: name.to_string(),
                })
            }
        };
        if !self.parameters().settable(name) {
            return Err(NFieldError::ImmutableParameter {
                element: self.label().to_string(),
                name: name.to_string(),
            });
        }
        self.apply_parameter(name, value)?;
        if class.requires_init() {
            self.lifecycle_mut().mark_dirty(name);
        }
        Ok(())
    }

    /// Read-only view of a named output component.
    ///
    /// `None` resolves to the declared default component. The view stays
    /// valid until the element next steps or re-initialises.
    fn output(&self, component: Option<&str>) -> NFieldResult<ArrayViewD<'_, FloatValue>> {
        let name = self.components().resolve(component).ok_or_else(|| {
            NFieldError::UnknownComponent {
                element: self.label().to_string(),
                name: component.unwrap_or("<default>").to_string(),
            }
        })?;
        self.component(name)
            .ok_or_else(|| NFieldError::UnknownComponent {
                element: self.label().to_string(),
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example_elements::{TestRelay, TestStimulus};

    #[test]
    fn step_before_init_fails() {
        let mut stim = TestStimulus::new("stim", 4, 1.0);
        let err = stim.step(1.0, 1.0, &[]).unwrap_err();
        assert!(matches!(err, NFieldError::StaleState { .. }));
        assert!(err.to_string().contains("never been called"));
    }

    #[test]
    fn init_is_idempotent() {
        let mut stim = TestStimulus::new("stim", 4, 2.0);
        stim.init().unwrap();
        let first = stim.output(None).unwrap().to_owned();
        stim.init().unwrap();
        let second = stim.output(None).unwrap().to_owned();
        assert_eq!(first, second);
        assert_eq!(stim.lifecycle().phase(), Phase::Initialized);
    }

    #[test]
    fn fixed_parameter_is_immutable() {
        let mut stim = TestStimulus::new("stim", 4, 1.0);
        let err = stim
            .set_parameter("size", ParamValue::Count(8))
            .unwrap_err();
        assert!(matches!(err, NFieldError::ImmutableParameter { .. }));
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let mut stim = TestStimulus::new("stim", 4, 1.0);
        let err = stim
            .set_parameter("gain", ParamValue::Scalar(3.0))
            .unwrap_err();
        assert!(matches!(err, NFieldError::UnknownParameter { .. }));
    }

    #[test]
    fn dirty_element_refuses_to_step() {
        let mut stim = TestStimulus::new("stim", 4, 1.0);
        stim.init().unwrap();
        stim.step(1.0, 1.0, &[]).unwrap();

        stim.set_parameter("value", ParamValue::Scalar(5.0)).unwrap();
        assert_eq!(stim.lifecycle().phase(), Phase::Dirty);
        assert_eq!(stim.lifecycle().dirty_parameters(), ["value"]);

        let err = stim.step(2.0, 1.0, &[]).unwrap_err();
        assert!(matches!(err, NFieldError::StaleState { .. }));
        assert!(err.to_string().contains("value"));

        stim.init().unwrap();
        stim.step(2.0, 1.0, &[]).unwrap();
        assert_eq!(stim.lifecycle().phase(), Phase::Stepped);
    }

    #[test]
    fn setting_before_first_init_is_legal() {
        let mut stim = TestStimulus::new("stim", 4, 1.0);
        stim.set_parameter("value", ParamValue::Scalar(3.0)).unwrap();
        assert_eq!(stim.lifecycle().phase(), Phase::Constructed);
        stim.init().unwrap();
        assert_eq!(stim.output(None).unwrap()[[0]], 3.0);
    }

    #[test]
    fn output_resolves_default_and_rejects_unknown() {
        let mut stim = TestStimulus::new("stim", 3, 1.5);
        stim.init().unwrap();

        assert_eq!(stim.output(None).unwrap().shape(), &[3]);
        assert_eq!(stim.output(Some("output")).unwrap()[[1]], 1.5);

        let err = stim.output(Some("activation")).unwrap_err();
        assert!(matches!(err, NFieldError::UnknownComponent { .. }));
    }

    #[test]
    fn relay_checks_input_shape() {
        let mut stim = TestStimulus::new("stim", 4, 1.0);
        let mut relay = TestRelay::new("relay", 3);
        stim.init().unwrap();
        relay.init().unwrap();

        let source = stim.output(None).unwrap();
        let err = relay.step(1.0, 1.0, &[source]).unwrap_err();
        assert!(matches!(err, NFieldError::ShapeMismatch { .. }));
    }

    #[test]
    fn arity_helpers() {
        assert!(InputArity::Exactly(2).accepts(2));
        assert!(!InputArity::Exactly(2).accepts(1));
        assert!(InputArity::AtLeast(1).accepts(3));
        assert!(InputArity::Any.accepts(0));

        let err = expect_input_count("sum", InputArity::Exactly(2), 1).unwrap_err();
        assert!(err.to_string().contains("exactly 2"));
    }
}
