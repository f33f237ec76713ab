//! Structural and pointwise transforms: gains, sums, products, axis
//! reductions, and the convolution-based coordinate transformation.

use crate::math::convolve_same;
use ndarray::{ArrayD, ArrayViewD, Axis, Ix1, IxDyn};
use nfield_core::element::{
    expect_input_count, expect_shape, Element, FloatValue, InputArity, Lifecycle, Time,
};
use nfield_core::errors::{NFieldError, NFieldResult};
use nfield_core::parameters::{ParamClass, ParamValue, ParameterRegistry};
use nfield_core::ports::ComponentTable;
use serde::{Deserialize, Serialize};

static OUTPUT_ONLY: ComponentTable = ComponentTable::new(&["output"], "output");

// ---------------------------------------------------------------------------
// ScaleInput
// ---------------------------------------------------------------------------

static SCALE_INPUT_PARAMETERS: ParameterRegistry = ParameterRegistry::new(&[
    ("size", ParamClass::Fixed),
    ("amplitude", ParamClass::Free),
]);

/// Pointwise gain on a single input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleInput {
    label: String,
    size: Vec<usize>,
    amplitude: FloatValue,
    lifecycle: Lifecycle,
    output: ArrayD<FloatValue>,
}

impl ScaleInput {
    pub fn new(label: impl Into<String>, size: Vec<usize>, amplitude: FloatValue) -> Self {
        Self {
            label: label.into(),
            size,
            amplitude,
            lifecycle: Lifecycle::new(),
            output: ArrayD::zeros(IxDyn(&[0])),
        }
    }
}

#[typetag::serde]
impl Element for ScaleInput {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &SCALE_INPUT_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &OUTPUT_ONLY
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
        self.output = ArrayD::zeros(IxDyn(&self.size));
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
        let amplitude = self.amplitude;
        self.output.zip_mut_with(&inputs[0], |o, &v| *o = amplitude * v);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SumInputs
// ---------------------------------------------------------------------------

static SUM_INPUTS_PARAMETERS: ParameterRegistry =
    ParameterRegistry::new(&[("size", ParamClass::Fixed)]);

/// Pointwise sum of all wired inputs; with none wired, the output is zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SumInputs {
    label: String,
    size: Vec<usize>,
    lifecycle: Lifecycle,
    output: ArrayD<FloatValue>,
}

impl SumInputs {
    pub fn new(label: impl Into<String>, size: Vec<usize>) -> Self {
        Self {
            label: label.into(),
            size,
            lifecycle: Lifecycle::new(),
            output: ArrayD::zeros(IxDyn(&[0])),
        }
    }
}

#[typetag::serde]
impl Element for SumInputs {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &SUM_INPUTS_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &OUTPUT_ONLY
    }

    fn input_arity(&self) -> InputArity {
        InputArity::Any
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
        self.output = ArrayD::zeros(IxDyn(&self.size));
        Ok(())
    }

    fn step_element(
        &mut self,
        _time: Time,
        _delta_t: Time,
        inputs: &[ArrayViewD<FloatValue>],
    ) -> NFieldResult<()> {
        let mut acc = ArrayD::zeros(self.output.raw_dim());
        for input in inputs {
            expect_shape(&self.label, self.output.shape(), input.shape())?;
            acc += input;
        }
        self.output.assign(&acc);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PointwiseProduct
// ---------------------------------------------------------------------------

static POINTWISE_PRODUCT_PARAMETERS: ParameterRegistry =
    ParameterRegistry::new(&[("size", ParamClass::Fixed)]);

/// Pointwise product of two inputs of equal shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointwiseProduct {
    label: String,
    size: Vec<usize>,
    lifecycle: Lifecycle,
    output: ArrayD<FloatValue>,
}

impl PointwiseProduct {
    pub fn new(label: impl Into<String>, size: Vec<usize>) -> Self {
        Self {
            label: label.into(),
            size,
            lifecycle: Lifecycle::new(),
            output: ArrayD::zeros(IxDyn(&[0])),
        }
    }
}

#[typetag::serde]
impl Element for PointwiseProduct {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &POINTWISE_PRODUCT_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &OUTPUT_ONLY
    }

    fn input_arity(&self) -> InputArity {
        InputArity::Exactly(2)
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
        self.output = ArrayD::zeros(IxDyn(&self.size));
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
        expect_shape(&self.label, self.output.shape(), inputs[1].shape())?;
        self.output.assign(&(&inputs[0] * &inputs[1]));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SumDimension
// ---------------------------------------------------------------------------

static SUM_DIMENSION_PARAMETERS: ParameterRegistry = ParameterRegistry::new(&[
    ("size", ParamClass::Fixed),
    ("axis", ParamClass::InitRequired),
    ("amplitude", ParamClass::Free),
]);

/// Sum a two-dimensional input along one axis, scaled by `amplitude`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SumDimension {
    label: String,
    size: [usize; 2],
    axis: usize,
    amplitude: FloatValue,
    lifecycle: Lifecycle,
    output: ArrayD<FloatValue>,
}

impl SumDimension {
    pub fn new(
        label: impl Into<String>,
        size: [usize; 2],
        axis: usize,
        amplitude: FloatValue,
    ) -> Self {
        Self {
            label: label.into(),
            size,
            axis,
            amplitude,
            lifecycle: Lifecycle::new(),
            output: ArrayD::zeros(IxDyn(&[0])),
        }
    }
}

#[typetag::serde]
impl Element for SumDimension {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &SUM_DIMENSION_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &OUTPUT_ONLY
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

    fn apply_parameter(&mut self, name: &str, value: ParamValue) -> NFieldResult<()> {
        match name {
            "axis" => self.axis = value.into_count(&self.label, name)?,
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
        if self.axis > 1 {
            return Err(NFieldError::UnsupportedConfiguration {
                element: self.label.clone(),
                reason: format!("axis must be 0 or 1 for a 2-d input, got {}", self.axis),
            });
        }
        let remaining = self.size[1 - self.axis];
        self.output = ArrayD::zeros(IxDyn(&[remaining]));
        Ok(())
    }

    fn step_element(
        &mut self,
        _time: Time,
        _delta_t: Time,
        inputs: &[ArrayViewD<FloatValue>],
    ) -> NFieldResult<()> {
        expect_input_count(&self.label, self.input_arity(), inputs.len())?;
        expect_shape(&self.label, &self.size, inputs[0].shape())?;
        let summed = inputs[0].sum_axis(Axis(self.axis)) * self.amplitude;
        self.output.assign(&summed);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Transpose
// ---------------------------------------------------------------------------

static TRANSPOSE_PARAMETERS: ParameterRegistry =
    ParameterRegistry::new(&[("size", ParamClass::Fixed)]);

/// Transpose of a two-dimensional input; other dimensionalities are a fatal
/// configuration error rather than a silent pass-through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transpose {
    label: String,
    size: [usize; 2],
    lifecycle: Lifecycle,
    output: ArrayD<FloatValue>,
}

impl Transpose {
    pub fn new(label: impl Into<String>, size: [usize; 2]) -> Self {
        Self {
            label: label.into(),
            size,
            lifecycle: Lifecycle::new(),
            output: ArrayD::zeros(IxDyn(&[0, 0])),
        }
    }
}

#[typetag::serde]
impl Element for Transpose {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &TRANSPOSE_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &OUTPUT_ONLY
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
        self.output = ArrayD::zeros(IxDyn(&[self.size[1], self.size[0]]));
        Ok(())
    }

    fn step_element(
        &mut self,
        _time: Time,
        _delta_t: Time,
        inputs: &[ArrayViewD<FloatValue>],
    ) -> NFieldResult<()> {
        expect_input_count(&self.label, self.input_arity(), inputs.len())?;
        if inputs[0].ndim() != 2 {
            return Err(NFieldError::UnsupportedConfiguration {
                element: self.label.clone(),
                reason: format!(
                    "only two-dimensional inputs can be transposed, got {} dimension(s)",
                    inputs[0].ndim()
                ),
            });
        }
        expect_shape(&self.label, &self.size, inputs[0].shape())?;
        self.output.assign(&inputs[0].t());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CoordinateTransformation
// ---------------------------------------------------------------------------

static COORDINATE_TRANSFORMATION_PARAMETERS: ParameterRegistry = ParameterRegistry::new(&[
    ("size", ParamClass::Fixed),
    ("circular", ParamClass::InitStepRequired),
]);

/// Shift-composition of two one-dimensional signals via same-mode
/// convolution, the feed-forward stand-in for the coordinate transform that
/// a joint representation with diagonal read-out would compute.
///
/// Input slots: 0 carries the signal to transform (length `size`), 1 the
/// transformation pattern (any length). `circular` is re-validated on every
/// step; only linear convolution is supported, so enabling it fails fatally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinateTransformation {
    label: String,
    size: usize,
    circular: bool,
    lifecycle: Lifecycle,
    output: ArrayD<FloatValue>,
}

impl CoordinateTransformation {
    pub fn new(label: impl Into<String>, size: usize, circular: bool) -> Self {
        Self {
            label: label.into(),
            size,
            circular,
            lifecycle: Lifecycle::new(),
            output: ArrayD::zeros(IxDyn(&[0])),
        }
    }

    fn as_1d<'a>(
        &self,
        input: &ArrayViewD<'a, FloatValue>,
    ) -> NFieldResult<ndarray::ArrayView1<'a, FloatValue>> {
        input
            .clone()
            .into_dimensionality::<Ix1>()
            .map_err(|_| NFieldError::UnsupportedConfiguration {
                element: self.label.clone(),
                reason: format!(
                    "only one-dimensional signals are supported, got shape {:?}",
                    input.shape()
                ),
            })
    }
}

#[typetag::serde]
impl Element for CoordinateTransformation {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &COORDINATE_TRANSFORMATION_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &OUTPUT_ONLY
    }

    fn input_arity(&self) -> InputArity {
        InputArity::Exactly(2)
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
            "circular" => self.circular = value.into_flag(&self.label, name)?,
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
        self.output = ArrayD::zeros(IxDyn(&[self.size]));
        Ok(())
    }

    fn step_element(
        &mut self,
        _time: Time,
        _delta_t: Time,
        inputs: &[ArrayViewD<FloatValue>],
    ) -> NFieldResult<()> {
        if self.circular {
            return Err(NFieldError::UnsupportedConfiguration {
                element: self.label.clone(),
                reason: "only linear convolution is supported".to_string(),
            });
        }
        expect_input_count(&self.label, self.input_arity(), inputs.len())?;
        expect_shape(&self.label, &[self.size], inputs[0].shape())?;

        let signal = self.as_1d(&inputs[0])?;
        let pattern = self.as_1d(&inputs[1])?;
        let result = convolve_same(signal, pattern);
        self.output.assign(&result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array2};

    #[test]
    fn scale_applies_gain() {
        let mut scale = ScaleInput::new("scale", vec![3], -2.0);
        scale.init().unwrap();
        let input = array![1.0, 2.0, 3.0].into_dyn();
        scale.step(1.0, 1.0, &[input.view()]).unwrap();
        assert_eq!(
            scale.output(None).unwrap().to_owned(),
            array![-2.0, -4.0, -6.0].into_dyn()
        );
    }

    #[test]
    fn sum_inputs_adds_everything() {
        let mut sum = SumInputs::new("sum", vec![2]);
        sum.init().unwrap();
        let a = array![1.0, 2.0].into_dyn();
        let b = array![10.0, 20.0].into_dyn();
        let c = array![100.0, 200.0].into_dyn();
        sum.step(1.0, 1.0, &[a.view(), b.view(), c.view()]).unwrap();
        assert_eq!(
            sum.output(None).unwrap().to_owned(),
            array![111.0, 222.0].into_dyn()
        );

        // No inputs leaves the output zero.
        sum.step(2.0, 1.0, &[]).unwrap();
        assert!(sum.output(None).unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn sum_inputs_rejects_mixed_shapes() {
        let mut sum = SumInputs::new("sum", vec![2]);
        sum.init().unwrap();
        let a = array![1.0, 2.0].into_dyn();
        let b = array![1.0, 2.0, 3.0].into_dyn();
        let err = sum.step(1.0, 1.0, &[a.view(), b.view()]).unwrap_err();
        assert!(matches!(err, NFieldError::ShapeMismatch { .. }));
    }

    #[test]
    fn pointwise_product_multiplies() {
        let mut product = PointwiseProduct::new("product", vec![3]);
        product.init().unwrap();
        let a = array![1.0, 2.0, 3.0].into_dyn();
        let b = array![4.0, 5.0, 6.0].into_dyn();
        product.step(1.0, 1.0, &[a.view(), b.view()]).unwrap();
        assert_eq!(
            product.output(None).unwrap().to_owned(),
            array![4.0, 10.0, 18.0].into_dyn()
        );
    }

    #[test]
    fn sum_dimension_reduces_the_chosen_axis() {
        let input = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap()
            .into_dyn();

        let mut rows = SumDimension::new("rows", [2, 3], 0, 1.0);
        rows.init().unwrap();
        rows.step(1.0, 1.0, &[input.view()]).unwrap();
        assert_eq!(
            rows.output(None).unwrap().to_owned(),
            array![5.0, 7.0, 9.0].into_dyn()
        );

        let mut cols = SumDimension::new("cols", [2, 3], 1, 0.5);
        cols.init().unwrap();
        cols.step(1.0, 1.0, &[input.view()]).unwrap();
        assert_eq!(
            cols.output(None).unwrap().to_owned(),
            array![3.0, 7.5].into_dyn()
        );
    }

    #[test]
    fn sum_dimension_rejects_bad_axis() {
        let mut bad = SumDimension::new("bad", [2, 3], 2, 1.0);
        let err = bad.init().unwrap_err();
        assert!(matches!(err, NFieldError::UnsupportedConfiguration { .. }));
    }

    #[test]
    fn transpose_swaps_axes() {
        let input = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap()
            .into_dyn();
        let mut transpose = Transpose::new("transpose", [2, 3]);
        transpose.init().unwrap();
        transpose.step(1.0, 1.0, &[input.view()]).unwrap();

        let out = transpose.output(None).unwrap();
        assert_eq!(out.shape(), &[3, 2]);
        assert_eq!(out[[0, 1]], 4.0);
        assert_eq!(out[[2, 0]], 3.0);
    }

    #[test]
    fn transpose_rejects_one_dimensional_input() {
        let mut transpose = Transpose::new("transpose", [2, 3]);
        transpose.init().unwrap();
        let input = Array1::zeros(6).into_dyn();
        let err = transpose.step(1.0, 1.0, &[input.view()]).unwrap_err();
        assert!(matches!(err, NFieldError::UnsupportedConfiguration { .. }));
    }

    #[test]
    fn coordinate_transformation_convolves() {
        let mut transform = CoordinateTransformation::new("transform", 3, false);
        transform.init().unwrap();

        // numpy.convolve([1, 2, 3], [0, 1, 0.5], 'same') == [1, 2.5, 4]
        let signal = array![1.0, 2.0, 3.0].into_dyn();
        let pattern = array![0.0, 1.0, 0.5].into_dyn();
        transform
            .step(1.0, 1.0, &[signal.view(), pattern.view()])
            .unwrap();
        assert_eq!(
            transform.output(None).unwrap().to_owned(),
            array![1.0, 2.5, 4.0].into_dyn()
        );
    }

    #[test]
    fn circular_mode_fails_on_every_step() {
        let mut transform = CoordinateTransformation::new("transform", 3, false);
        transform.init().unwrap();

        transform
            .set_parameter("circular", ParamValue::Flag(true))
            .unwrap();
        // circular is init-and-step-required: dirty until re-initialised...
        let signal = array![1.0, 2.0, 3.0].into_dyn();
        let pattern = array![1.0].into_dyn();
        let err = transform
            .step(1.0, 1.0, &[signal.view(), pattern.view()])
            .unwrap_err();
        assert!(matches!(err, NFieldError::StaleState { .. }));

        // ...and even after init the per-step validation rejects it.
        transform.init().unwrap();
        let err = transform
            .step(1.0, 1.0, &[signal.view(), pattern.view()])
            .unwrap_err();
        assert!(matches!(err, NFieldError::UnsupportedConfiguration { .. }));
    }
}
