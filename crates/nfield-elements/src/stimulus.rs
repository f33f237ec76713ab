//! Stimulus elements: zero-input sources that write fixed or time-gated
//! patterns computed from their parameters alone.

use crate::math::{circular_gauss, gauss};
use ndarray::{Array1, ArrayD, ArrayViewD, IxDyn};
use nfield_core::element::{Element, FloatValue, InputArity, Lifecycle, Time};
use nfield_core::errors::{NFieldError, NFieldResult};
use nfield_core::parameters::{ParamClass, ParamValue, ParameterRegistry};
use nfield_core::ports::ComponentTable;
use serde::{Deserialize, Serialize};

fn ensure_positive_sigma(label: &str, name: &str, sigma: FloatValue) -> NFieldResult<()> {
    if sigma > 0.0 {
        Ok(())
    } else {
        Err(NFieldError::UnsupportedConfiguration {
            element: label.to_string(),
            reason: format!("{} must be positive, got {}", name, sigma),
        })
    }
}

// ---------------------------------------------------------------------------
// BoostStimulus
// ---------------------------------------------------------------------------

static BOOST_PARAMETERS: ParameterRegistry =
    ParameterRegistry::new(&[("amplitude", ParamClass::Free)]);

static BOOST_COMPONENTS: ComponentTable = ComponentTable::new(&["output"], "output");

/// Scalar boost written to a single-entry output on every step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostStimulus {
    label: String,
    amplitude: FloatValue,
    lifecycle: Lifecycle,
    output: ArrayD<FloatValue>,
}

impl BoostStimulus {
    pub fn new(label: impl Into<String>, amplitude: FloatValue) -> Self {
        Self {
            label: label.into(),
            amplitude,
            lifecycle: Lifecycle::new(),
            output: ArrayD::zeros(IxDyn(&[0])),
        }
    }
}

#[typetag::serde]
impl Element for BoostStimulus {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &BOOST_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &BOOST_COMPONENTS
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
            "amplitude" => self.amplitude = value.into_scalar(&self.label, name)?,
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
        self.output = ArrayD::zeros(IxDyn(&[1]));
        Ok(())
    }

    fn step_element(
        &mut self,
        _time: Time,
        _delta_t: Time,
        _inputs: &[ArrayViewD<FloatValue>],
    ) -> NFieldResult<()> {
        self.output[[0]] = self.amplitude;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GaussStimulus1D
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussStimulus1DParameters {
    /// Length of the sampled space.
    pub size: usize,
    pub sigma: FloatValue,
    pub amplitude: FloatValue,
    /// Centre of the Gaussian, as a 0-based position.
    pub position: FloatValue,
    /// Whether the Gaussian is defined over circular space.
    pub circular: bool,
    /// Whether the pattern is normalised to sum one before scaling.
    pub normalized: bool,
}

static GAUSS_STIMULUS_1D_PARAMETERS: ParameterRegistry = ParameterRegistry::new(&[
    ("size", ParamClass::Fixed),
    ("sigma", ParamClass::InitRequired),
    ("amplitude", ParamClass::InitRequired),
    ("position", ParamClass::InitRequired),
    ("circular", ParamClass::InitRequired),
    ("normalized", ParamClass::InitRequired),
]);

static GAUSS_STIMULUS_1D_COMPONENTS: ComponentTable = ComponentTable::new(&["output"], "output");

/// One-dimensional Gaussian stimulus.
///
/// The pattern is computed at `init()` from the current parameters and the
/// output does not change between steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussStimulus1D {
    label: String,
    parameters: GaussStimulus1DParameters,
    lifecycle: Lifecycle,
    output: ArrayD<FloatValue>,
}

impl GaussStimulus1D {
    pub fn new(label: impl Into<String>, parameters: GaussStimulus1DParameters) -> Self {
        Self {
            label: label.into(),
            parameters,
            lifecycle: Lifecycle::new(),
            output: ArrayD::zeros(IxDyn(&[0])),
        }
    }

    fn pattern(&self) -> Array1<FloatValue> {
        let p = &self.parameters;
        let base = if p.circular {
            circular_gauss(p.size, p.position, p.sigma, p.normalized)
        } else {
            gauss(p.size, p.position, p.sigma, p.normalized)
        };
        base * p.amplitude
    }
}

#[typetag::serde]
impl Element for GaussStimulus1D {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &GAUSS_STIMULUS_1D_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &GAUSS_STIMULUS_1D_COMPONENTS
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
        let p = &mut self.parameters;
        match name {
            "sigma" => p.sigma = value.into_scalar(&self.label, name)?,
            "amplitude" => p.amplitude = value.into_scalar(&self.label, name)?,
            "position" => p.position = value.into_scalar(&self.label, name)?,
            "circular" => p.circular = value.into_flag(&self.label, name)?,
            "normalized" => p.normalized = value.into_flag(&self.label, name)?,
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
        ensure_positive_sigma(&self.label, "sigma", self.parameters.sigma)?;
        self.output = self.pattern().into_dyn();
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

// ---------------------------------------------------------------------------
// GaussStimulus2D
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussStimulus2DParameters {
    /// Output shape as `[rows, columns]`.
    pub size: [usize; 2],
    pub sigma_y: FloatValue,
    pub sigma_x: FloatValue,
    pub amplitude: FloatValue,
    pub position_y: FloatValue,
    pub position_x: FloatValue,
    pub circular: bool,
    pub normalized: bool,
}

static GAUSS_STIMULUS_2D_PARAMETERS: ParameterRegistry = ParameterRegistry::new(&[
    ("size", ParamClass::Fixed),
    ("sigma_y", ParamClass::InitRequired),
    ("sigma_x", ParamClass::InitRequired),
    ("amplitude", ParamClass::InitRequired),
    ("position_y", ParamClass::InitRequired),
    ("position_x", ParamClass::InitRequired),
    ("circular", ParamClass::InitRequired),
    ("normalized", ParamClass::InitRequired),
]);

static GAUSS_STIMULUS_2D_COMPONENTS: ComponentTable = ComponentTable::new(&["output"], "output");

/// Separable two-dimensional Gaussian stimulus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussStimulus2D {
    label: String,
    parameters: GaussStimulus2DParameters,
    lifecycle: Lifecycle,
    output: ArrayD<FloatValue>,
}

impl GaussStimulus2D {
    pub fn new(label: impl Into<String>, parameters: GaussStimulus2DParameters) -> Self {
        Self {
            label: label.into(),
            parameters,
            lifecycle: Lifecycle::new(),
            output: ArrayD::zeros(IxDyn(&[0, 0])),
        }
    }
}

#[typetag::serde]
impl Element for GaussStimulus2D {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &GAUSS_STIMULUS_2D_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &GAUSS_STIMULUS_2D_COMPONENTS
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
        let p = &mut self.parameters;
        match name {
            "sigma_y" => p.sigma_y = value.into_scalar(&self.label, name)?,
            "sigma_x" => p.sigma_x = value.into_scalar(&self.label, name)?,
            "amplitude" => p.amplitude = value.into_scalar(&self.label, name)?,
            "position_y" => p.position_y = value.into_scalar(&self.label, name)?,
            "position_x" => p.position_x = value.into_scalar(&self.label, name)?,
            "circular" => p.circular = value.into_flag(&self.label, name)?,
            "normalized" => p.normalized = value.into_flag(&self.label, name)?,
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
        let p = &self.parameters;
        ensure_positive_sigma(&self.label, "sigma_y", p.sigma_y)?;
        ensure_positive_sigma(&self.label, "sigma_x", p.sigma_x)?;

        let [rows, cols] = p.size;
        let along_y = if p.circular {
            circular_gauss(rows, p.position_y, p.sigma_y, p.normalized)
        } else {
            gauss(rows, p.position_y, p.sigma_y, p.normalized)
        };
        let along_x = if p.circular {
            circular_gauss(cols, p.position_x, p.sigma_x, p.normalized)
        } else {
            gauss(cols, p.position_x, p.sigma_x, p.normalized)
        };

        let mut output = ArrayD::zeros(IxDyn(&[rows, cols]));
        for i in 0..rows {
            for j in 0..cols {
                output[[i, j]] = p.amplitude * along_y[i] * along_x[j];
            }
        }
        self.output = output;
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

// ---------------------------------------------------------------------------
// TimedGaussStimulus1D
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedGaussStimulus1DParameters {
    pub size: usize,
    pub sigma: FloatValue,
    pub amplitude: FloatValue,
    pub position: FloatValue,
    /// Inclusive `[start, end]` intervals during which the stimulus is active.
    pub on_times: Vec<[FloatValue; 2]>,
    pub circular: bool,
    pub normalized: bool,
}

static TIMED_GAUSS_STIMULUS_1D_PARAMETERS: ParameterRegistry = ParameterRegistry::new(&[
    ("size", ParamClass::Fixed),
    ("sigma", ParamClass::InitRequired),
    ("amplitude", ParamClass::InitRequired),
    ("position", ParamClass::InitRequired),
    ("on_times", ParamClass::InitRequired),
    ("circular", ParamClass::InitRequired),
    ("normalized", ParamClass::InitRequired),
]);

static TIMED_GAUSS_STIMULUS_1D_COMPONENTS: ComponentTable =
    ComponentTable::new(&["output"], "output");

/// One-dimensional Gaussian stimulus active during configured time intervals.
///
/// The Gaussian pattern is cached at `init()`. A boolean latch tracks whether
/// the stimulus is currently emitting: the pattern is written to the output
/// when the latch switches on and the output is zeroed when it switches off,
/// so the buffer is touched only on edge transitions, not on every active
/// tick. Interval bounds are inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedGaussStimulus1D {
    label: String,
    parameters: TimedGaussStimulus1DParameters,
    lifecycle: Lifecycle,
    on: bool,
    pattern: Array1<FloatValue>,
    output: ArrayD<FloatValue>,
}

impl TimedGaussStimulus1D {
    pub fn new(label: impl Into<String>, parameters: TimedGaussStimulus1DParameters) -> Self {
        Self {
            label: label.into(),
            parameters,
            lifecycle: Lifecycle::new(),
            on: false,
            pattern: Array1::zeros(0),
            output: ArrayD::zeros(IxDyn(&[0])),
        }
    }
}

#[typetag::serde]
impl Element for TimedGaussStimulus1D {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &TIMED_GAUSS_STIMULUS_1D_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &TIMED_GAUSS_STIMULUS_1D_COMPONENTS
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
        let p = &mut self.parameters;
        match name {
            "sigma" => p.sigma = value.into_scalar(&self.label, name)?,
            "amplitude" => p.amplitude = value.into_scalar(&self.label, name)?,
            "position" => p.position = value.into_scalar(&self.label, name)?,
            "on_times" => p.on_times = value.into_intervals(&self.label, name)?,
            "circular" => p.circular = value.into_flag(&self.label, name)?,
            "normalized" => p.normalized = value.into_flag(&self.label, name)?,
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
        let p = &self.parameters;
        ensure_positive_sigma(&self.label, "sigma", p.sigma)?;
        for interval in &p.on_times {
            if interval[0] > interval[1] {
                return Err(NFieldError::UnsupportedConfiguration {
                    element: self.label.clone(),
                    reason: format!(
                        "activation interval [{}, {}] ends before it starts",
                        interval[0], interval[1]
                    ),
                });
            }
        }

        let base = if p.circular {
            circular_gauss(p.size, p.position, p.sigma, p.normalized)
        } else {
            gauss(p.size, p.position, p.sigma, p.normalized)
        };
        self.pattern = base * p.amplitude;
        self.output = ArrayD::zeros(IxDyn(&[p.size]));
        self.on = false;
        Ok(())
    }

    fn step_element(
        &mut self,
        time: Time,
        _delta_t: Time,
        _inputs: &[ArrayViewD<FloatValue>],
    ) -> NFieldResult<()> {
        let should_be_on = self
            .parameters
            .on_times
            .iter()
            .any(|interval| time >= interval[0] && time <= interval[1]);

        if should_be_on && !self.on {
            self.output.assign(&self.pattern);
            self.on = true;
        } else if !should_be_on && self.on {
            self.output.fill(0.0);
            self.on = false;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CustomStimulus
// ---------------------------------------------------------------------------

static CUSTOM_STIMULUS_PARAMETERS: ParameterRegistry =
    ParameterRegistry::new(&[("pattern", ParamClass::InitRequired)]);

static CUSTOM_STIMULUS_COMPONENTS: ComponentTable = ComponentTable::new(&["output"], "output");

/// Stimulus that emits a caller-supplied pattern of arbitrary shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomStimulus {
    label: String,
    pattern: ArrayD<FloatValue>,
    lifecycle: Lifecycle,
    output: ArrayD<FloatValue>,
}

impl CustomStimulus {
    pub fn new(label: impl Into<String>, pattern: ArrayD<FloatValue>) -> Self {
        Self {
            label: label.into(),
            pattern,
            lifecycle: Lifecycle::new(),
            output: ArrayD::zeros(IxDyn(&[0])),
        }
    }
}

#[typetag::serde]
impl Element for CustomStimulus {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &CUSTOM_STIMULUS_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &CUSTOM_STIMULUS_COMPONENTS
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
            "pattern" => self.pattern = value.into_array(&self.label, name)?,
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
        self.output = self.pattern.clone();
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
