//! Lateral interaction kernels: one-input transforms that correlate their
//! input with a cached, truncated kernel pattern.
//!
//! Input slot 0 carries the signal to be transformed; it must be
//! one-dimensional and match the configured size. Each kernel exposes its
//! cached pattern as a second component named `kernel`, which is convenient
//! for inspecting the interaction profile of a tuned architecture.

use crate::math::{centered_gauss, correlate_same, kernel_half_width};
use ndarray::{Array1, ArrayD, ArrayViewD, Ix1, IxDyn};
use nfield_core::element::{
    expect_input_count, expect_shape, Element, FloatValue, InputArity, Lifecycle, Time,
};
use nfield_core::errors::{NFieldError, NFieldResult};
use nfield_core::parameters::{ParamClass, ParamValue, ParameterRegistry};
use nfield_core::ports::ComponentTable;
use serde::{Deserialize, Serialize};

static KERNEL_COMPONENTS: ComponentTable = ComponentTable::new(&["output", "kernel"], "output");

fn ensure_positive(label: &str, name: &str, value: FloatValue) -> NFieldResult<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(NFieldError::UnsupportedConfiguration {
            element: label.to_string(),
            reason: format!("{} must be positive, got {}", name, value),
        })
    }
}

/// Check the single input and correlate it with the cached kernel.
fn correlate_input(
    label: &str,
    size: usize,
    kernel: &Array1<FloatValue>,
    circular: bool,
    inputs: &[ArrayViewD<FloatValue>],
) -> NFieldResult<Array1<FloatValue>> {
    expect_input_count(label, InputArity::Exactly(1), inputs.len())?;
    expect_shape(label, &[size], inputs[0].shape())?;
    let input = inputs[0]
        .view()
        .into_dimensionality::<Ix1>()
        .map_err(|_| NFieldError::ShapeMismatch {
            element: label.to_string(),
            expected: vec![size],
            actual: inputs[0].shape().to_vec(),
        })?;
    Ok(correlate_same(input, kernel.view(), circular))
}

// ---------------------------------------------------------------------------
// GaussKernel1D
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussKernel1DParameters {
    pub size: usize,
    pub sigma: FloatValue,
    pub amplitude: FloatValue,
    pub circular: bool,
    pub normalized: bool,
    /// Multiple of `sigma` at which the kernel is truncated.
    pub cutoff_factor: FloatValue,
}

static GAUSS_KERNEL_1D_PARAMETERS: ParameterRegistry = ParameterRegistry::new(&[
    ("size", ParamClass::Fixed),
    ("sigma", ParamClass::InitRequired),
    ("amplitude", ParamClass::InitRequired),
    ("circular", ParamClass::InitRequired),
    ("normalized", ParamClass::InitRequired),
    ("cutoff_factor", ParamClass::InitRequired),
]);

/// Gaussian interaction kernel over one-dimensional space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussKernel1D {
    label: String,
    parameters: GaussKernel1DParameters,
    lifecycle: Lifecycle,
    kernel: Array1<FloatValue>,
    output: ArrayD<FloatValue>,
}

impl GaussKernel1D {
    pub fn new(label: impl Into<String>, parameters: GaussKernel1DParameters) -> Self {
        Self {
            label: label.into(),
            parameters,
            lifecycle: Lifecycle::new(),
            kernel: Array1::zeros(0),
            output: ArrayD::zeros(IxDyn(&[0])),
        }
    }
}

#[typetag::serde]
impl Element for GaussKernel1D {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &GAUSS_KERNEL_1D_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &KERNEL_COMPONENTS
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
        match name {
            "output" => Some(self.output.view()),
            "kernel" => Some(self.kernel.view().into_dyn()),
            _ => None,
        }
    }

    fn apply_parameter(&mut self, name: &str, value: ParamValue) -> NFieldResult<()> {
        let p = &mut self.parameters;
        match name {
            "sigma" => p.sigma = value.into_scalar(&self.label, name)?,
            "amplitude" => p.amplitude = value.into_scalar(&self.label, name)?,
            "circular" => p.circular = value.into_flag(&self.label, name)?,
            "normalized" => p.normalized = value.into_flag(&self.label, name)?,
            "cutoff_factor" => p.cutoff_factor = value.into_scalar(&self.label, name)?,
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
        ensure_positive(&self.label, "sigma", p.sigma)?;
        ensure_positive(&self.label, "cutoff_factor", p.cutoff_factor)?;

        let half = kernel_half_width(p.sigma, p.cutoff_factor, p.size, p.circular);
        self.kernel = centered_gauss(half, p.sigma, p.normalized) * p.amplitude;
        self.output = ArrayD::zeros(IxDyn(&[p.size]));
        Ok(())
    }

    fn step_element(
        &mut self,
        _time: Time,
        _delta_t: Time,
        inputs: &[ArrayViewD<FloatValue>],
    ) -> NFieldResult<()> {
        let result = correlate_input(
            &self.label,
            self.parameters.size,
            &self.kernel,
            self.parameters.circular,
            inputs,
        )?;
        self.output.assign(&result);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MexicanHatKernel1D
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MexicanHatKernel1DParameters {
    pub size: usize,
    pub sigma_exc: FloatValue,
    pub amplitude_exc: FloatValue,
    pub sigma_inh: FloatValue,
    pub amplitude_inh: FloatValue,
    pub circular: bool,
    pub normalized: bool,
    pub cutoff_factor: FloatValue,
}

static MEXICAN_HAT_KERNEL_1D_PARAMETERS: ParameterRegistry = ParameterRegistry::new(&[
    ("size", ParamClass::Fixed),
    ("sigma_exc", ParamClass::InitRequired),
    ("amplitude_exc", ParamClass::InitRequired),
    ("sigma_inh", ParamClass::InitRequired),
    ("amplitude_inh", ParamClass::InitRequired),
    ("circular", ParamClass::InitRequired),
    ("normalized", ParamClass::InitRequired),
    ("cutoff_factor", ParamClass::InitRequired),
]);

/// Difference-of-Gaussians kernel: short-range excitation, broader
/// inhibition. The truncation range follows the wider of the two Gaussians.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MexicanHatKernel1D {
    label: String,
    parameters: MexicanHatKernel1DParameters,
    lifecycle: Lifecycle,
    kernel: Array1<FloatValue>,
    output: ArrayD<FloatValue>,
}

impl MexicanHatKernel1D {
    pub fn new(label: impl Into<String>, parameters: MexicanHatKernel1DParameters) -> Self {
        Self {
            label: label.into(),
            parameters,
            lifecycle: Lifecycle::new(),
            kernel: Array1::zeros(0),
            output: ArrayD::zeros(IxDyn(&[0])),
        }
    }
}

#[typetag::serde]
impl Element for MexicanHatKernel1D {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &MEXICAN_HAT_KERNEL_1D_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &KERNEL_COMPONENTS
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
        match name {
            "output" => Some(self.output.view()),
            "kernel" => Some(self.kernel.view().into_dyn()),
            _ => None,
        }
    }

    fn apply_parameter(&mut self, name: &str, value: ParamValue) -> NFieldResult<()> {
        let p = &mut self.parameters;
        match name {
            "sigma_exc" => p.sigma_exc = value.into_scalar(&self.label, name)?,
            "amplitude_exc" => p.amplitude_exc = value.into_scalar(&self.label, name)?,
            "sigma_inh" => p.sigma_inh = value.into_scalar(&self.label, name)?,
            "amplitude_inh" => p.amplitude_inh = value.into_scalar(&self.label, name)?,
            "circular" => p.circular = value.into_flag(&self.label, name)?,
            "normalized" => p.normalized = value.into_flag(&self.label, name)?,
            "cutoff_factor" => p.cutoff_factor = value.into_scalar(&self.label, name)?,
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
        ensure_positive(&self.label, "sigma_exc", p.sigma_exc)?;
        ensure_positive(&self.label, "sigma_inh", p.sigma_inh)?;
        ensure_positive(&self.label, "cutoff_factor", p.cutoff_factor)?;

        let widest = p.sigma_exc.max(p.sigma_inh);
        let half = kernel_half_width(widest, p.cutoff_factor, p.size, p.circular);
        self.kernel = centered_gauss(half, p.sigma_exc, p.normalized) * p.amplitude_exc
            - centered_gauss(half, p.sigma_inh, p.normalized) * p.amplitude_inh;
        self.output = ArrayD::zeros(IxDyn(&[p.size]));
        Ok(())
    }

    fn step_element(
        &mut self,
        _time: Time,
        _delta_t: Time,
        inputs: &[ArrayViewD<FloatValue>],
    ) -> NFieldResult<()> {
        let result = correlate_input(
            &self.label,
            self.parameters.size,
            &self.kernel,
            self.parameters.circular,
            inputs,
        )?;
        self.output.assign(&result);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LateralInteractions1D
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LateralInteractions1DParameters {
    pub size: usize,
    pub sigma_exc: FloatValue,
    pub amplitude_exc: FloatValue,
    pub sigma_inh: FloatValue,
    pub amplitude_inh: FloatValue,
    /// Uniform coupling applied to the sum of the whole input.
    pub amplitude_global: FloatValue,
    pub circular: bool,
    pub normalized: bool,
    pub cutoff_factor: FloatValue,
}

static LATERAL_INTERACTIONS_1D_PARAMETERS: ParameterRegistry = ParameterRegistry::new(&[
    ("size", ParamClass::Fixed),
    ("sigma_exc", ParamClass::InitRequired),
    ("amplitude_exc", ParamClass::InitRequired),
    ("sigma_inh", ParamClass::InitRequired),
    ("amplitude_inh", ParamClass::InitRequired),
    ("amplitude_global", ParamClass::Free),
    ("circular", ParamClass::InitRequired),
    ("normalized", ParamClass::InitRequired),
    ("cutoff_factor", ParamClass::InitRequired),
]);

/// Difference-of-Gaussians kernel plus a global coupling term, the standard
/// lateral interaction pattern of one-layer field architectures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LateralInteractions1D {
    label: String,
    parameters: LateralInteractions1DParameters,
    lifecycle: Lifecycle,
    kernel: Array1<FloatValue>,
    output: ArrayD<FloatValue>,
}

impl LateralInteractions1D {
    pub fn new(label: impl Into<String>, parameters: LateralInteractions1DParameters) -> Self {
        Self {
            label: label.into(),
            parameters,
            lifecycle: Lifecycle::new(),
            kernel: Array1::zeros(0),
            output: ArrayD::zeros(IxDyn(&[0])),
        }
    }
}

#[typetag::serde]
impl Element for LateralInteractions1D {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &LATERAL_INTERACTIONS_1D_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &KERNEL_COMPONENTS
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
        match name {
            "output" => Some(self.output.view()),
            "kernel" => Some(self.kernel.view().into_dyn()),
            _ => None,
        }
    }

    fn apply_parameter(&mut self, name: &str, value: ParamValue) -> NFieldResult<()> {
        let p = &mut self.parameters;
        match name {
            "sigma_exc" => p.sigma_exc = value.into_scalar(&self.label, name)?,
            "amplitude_exc" => p.amplitude_exc = value.into_scalar(&self.label, name)?,
            "sigma_inh" => p.sigma_inh = value.into_scalar(&self.label, name)?,
            "amplitude_inh" => p.amplitude_inh = value.into_scalar(&self.label, name)?,
            "amplitude_global" => p.amplitude_global = value.into_scalar(&self.label, name)?,
            "circular" => p.circular = value.into_flag(&self.label, name)?,
            "normalized" => p.normalized = value.into_flag(&self.label, name)?,
            "cutoff_factor" => p.cutoff_factor = value.into_scalar(&self.label, name)?,
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
        ensure_positive(&self.label, "sigma_exc", p.sigma_exc)?;
        ensure_positive(&self.label, "sigma_inh", p.sigma_inh)?;
        ensure_positive(&self.label, "cutoff_factor", p.cutoff_factor)?;

        let widest = p.sigma_exc.max(p.sigma_inh);
        let half = kernel_half_width(widest, p.cutoff_factor, p.size, p.circular);
        self.kernel = centered_gauss(half, p.sigma_exc, p.normalized) * p.amplitude_exc
            - centered_gauss(half, p.sigma_inh, p.normalized) * p.amplitude_inh;
        self.output = ArrayD::zeros(IxDyn(&[p.size]));
        Ok(())
    }

    fn step_element(
        &mut self,
        _time: Time,
        _delta_t: Time,
        inputs: &[ArrayViewD<FloatValue>],
    ) -> NFieldResult<()> {
        let mut result = correlate_input(
            &self.label,
            self.parameters.size,
            &self.kernel,
            self.parameters.circular,
            inputs,
        )?;
        let global = self.parameters.amplitude_global * inputs[0].sum();
        result += global;
        self.output.assign(&result);
        Ok(())
    }
}
