#![allow(dead_code)]

//! Minimal elements used by the core test suite.

use crate::element::{
    expect_input_count, expect_shape, Element, FloatValue, InputArity, Lifecycle, Time,
};
use crate::errors::{NFieldError, NFieldResult};
use crate::parameters::{ParamClass, ParamValue, ParameterRegistry};
use crate::ports::ComponentTable;
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde::{Deserialize, Serialize};

static TEST_STIMULUS_PARAMETERS: ParameterRegistry = ParameterRegistry::new(&[
    ("size", ParamClass::Fixed),
    ("value", ParamClass::InitRequired),
]);

static TEST_STIMULUS_COMPONENTS: ComponentTable = ComponentTable::new(&["output"], "output");

/// Zero-input element that fills its output with a constant at `init()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TestStimulus {
    label: String,
    size: usize,
    value: FloatValue,
    lifecycle: Lifecycle,
    output: ArrayD<FloatValue>,
}

impl TestStimulus {
    pub(crate) fn new(label: impl Into<String>, size: usize, value: FloatValue) -> Self {
        Self {
            label: label.into(),
            size,
            value,
            lifecycle: Lifecycle::new(),
            output: ArrayD::zeros(IxDyn(&[0])),
        }
    }
}

#[typetag::serde]
impl Element for TestStimulus {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &TEST_STIMULUS_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &TEST_STIMULUS_COMPONENTS
    }

    fn input_arity(&self) -> InputArity {
        InputArity::Exactly(0)
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn component(&self, name: &str) -> Option<ArrayViewD<'_, FloatValue>> {
        (name == "output").then(|| self.output.view())
    }

    fn apply_parameter(&mut self, name: &str, value: ParamValue) -> NFieldResult<()> {
        match name {
            "value" => self.value = value.into_scalar(&self.label, name)?,
            _ => {
                return Err(NFieldError::UnknownParameter {
                    element: self.label.clone(),
                    name: name.to_string(),
                })
            }
        }
        Ok(())
    }

    fn init_element(&mut self) -> NFieldResult<()> {
        self.output = ArrayD::from_elem(IxDyn(&[self.size]), self.value);
        Ok(())
    }

    fn step_element(
        &mut self,
        _time: Time,
        _delta_t: Time,
        _inputs: &[ArrayViewD<FloatValue>],
    ) -> NFieldResult<()> {
        Ok(())
    }
}

static TEST_RELAY_PARAMETERS: ParameterRegistry =
    ParameterRegistry::new(&[("size", ParamClass::Fixed)]);

static TEST_RELAY_COMPONENTS: ComponentTable = ComponentTable::new(&["output"], "output");

/// One-input element that copies its input through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TestRelay {
    label: String,
    size: usize,
    lifecycle: Lifecycle,
    output: ArrayD<FloatValue>,
}

impl TestRelay {
    pub(crate) fn new(label: impl Into<String>, size: usize) -> Self {
        Self {
            label: label.into(),
            size,
            lifecycle: Lifecycle::new(),
            output: ArrayD::zeros(IxDyn(&[0])),
        }
    }
}

#[typetag::serde]
impl Element for TestRelay {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &TEST_RELAY_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &TEST_RELAY_COMPONENTS
    }

    fn input_arity(&self) -> InputArity {
        InputArity::Exactly(1)
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn component(&self, name: &str) -> Option<ArrayViewD<'_, FloatValue>> {
        (name == "output").then(|| self.output.view())
    }

    fn apply_parameter(&mut self, name: &str, _value: ParamValue) -> NFieldResult<()> {
        Err(NFieldError::UnknownParameter {
            element: self.label.clone(),
            name: name.to_string(),
        })
    }

    fn init_element(&mut self) -> NFieldResult<()> {
        self.output = ArrayD::zeros(IxDyn(&[self.size]));
        Ok(())
    }

    fn step_element(
        &mut self,
        _time: Time,
        _delta_t: Time,
        inputs: &[ArrayViewD<FloatValue>],
    ) -> NFieldResult<()> {
        expect_input_count(&self.label, self.input_arity(), inputs.len())?;
        expect_shape(&self.label, self.output.shape(), inputs[0].shape())?;
        self.output.assign(&inputs[0]);
        Ok(())
    }
}
