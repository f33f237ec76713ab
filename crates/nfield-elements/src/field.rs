//! The neural field element.

use crate::math::sigmoid;
use ndarray::{ArrayD, ArrayViewD, IxDyn, Zip};
use nfield_core::element::{
    expect_shape, Element, FloatValue, InputArity, Lifecycle, Time,
};
use nfield_core::errors::{NFieldError, NFieldResult};
use nfield_core::parameters::{ParamClass, ParamValue, ParameterRegistry};
use nfield_core::ports::ComponentTable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuralFieldParameters {
    /// Shape of the field; one- or two-dimensional.
    pub size: Vec<usize>,
    /// Time constant of the field dynamics.
    pub tau: FloatValue,
    /// Resting level.
    pub h: FloatValue,
    /// Steepness of the sigmoid output nonlinearity.
    pub beta: FloatValue,
}

static NEURAL_FIELD_PARAMETERS: ParameterRegistry = ParameterRegistry::new(&[
    ("size", ParamClass::Fixed),
    ("tau", ParamClass::Free),
    ("h", ParamClass::Free),
    ("beta", ParamClass::Free),
]);

static NEURAL_FIELD_COMPONENTS: ComponentTable =
    ComponentTable::new(&["activation", "output"], "activation");

/// Dynamic field with sigmoidal output.
///
/// Accepts any number of inputs, each matching the field shape; their
/// pointwise sum drives the activation `u` by one Euler step per tick:
///
/// ```text
/// u += delta_t / tau * (-u + h + sum(inputs))
/// ```
///
/// Components: `activation` (default) is the raw field `u`; `output` is
/// `1 / (1 + exp(-beta * u))`, the value usually routed into interaction
/// kernels. `tau`, `h` and `beta` may change freely between steps; the
/// activation is reset to the resting level at `init()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuralField {
    label: String,
    parameters: NeuralFieldParameters,
    lifecycle: Lifecycle,
    activation: ArrayD<FloatValue>,
    output: ArrayD<FloatValue>,
}

impl NeuralField {
    pub fn new(label: impl Into<String>, parameters: NeuralFieldParameters) -> Self {
        Self {
            label: label.into(),
            parameters,
            lifecycle: Lifecycle::new(),
            activation: ArrayD::zeros(IxDyn(&[0])),
            output: ArrayD::zeros(IxDyn(&[0])),
        }
    }

    fn ensure_valid_tau(&self) -> NFieldResult<()> {
        if self.parameters.tau > 0.0 {
            Ok(())
        } else {
            Err(NFieldError::UnsupportedConfiguration {
                element: self.label.clone(),
                reason: format!("tau must be positive, got {}", self.parameters.tau),
            })
        }
    }
}

#[typetag::serde]
impl Element for NeuralField {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &NEURAL_FIELD_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &NEURAL_FIELD_COMPONENTS
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
        match name {
            "activation" => Some(self.activation.view()),
            "output" => Some(self.output.view()),
            _ => None,
        }
    }

    fn apply_parameter(&mut self, name: &str, value: ParamValue) -> NFieldResult<()> {
        let p = &mut self.parameters;
        match name {
            "tau" => p.tau = value.into_scalar(&self.label, name)?,
            "h" => p.h = value.into_scalar(&self.label, name)?,
            "beta" => p.beta = value.into_scalar(&self.label, name)?,
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
        self.ensure_valid_tau()?;
        let p = &self.parameters;
        if p.size.is_empty() || p.size.len() > 2 {
            return Err(NFieldError::UnsupportedConfiguration {
                element: self.label.clone(),
                reason: format!(
                    "fields must be one- or two-dimensional, got shape {:?}",
                    p.size
                ),
            });
        }
        self.activation = ArrayD::from_elem(IxDyn(&p.size), p.h);
        self.output = self.activation.mapv(|u| sigmoid(u, p.beta));
        Ok(())
    }

    fn step_element(
        &mut self,
        _time: Time,
        delta_t: Time,
        inputs: &[ArrayViewD<FloatValue>],
    ) -> NFieldResult<()> {
        self.ensure_valid_tau()?;

        let mut drive = ArrayD::zeros(self.activation.raw_dim());
        for input in inputs {
            expect_shape(&self.label, self.activation.shape(), input.shape())?;
            drive += input;
        }

        let p = &self.parameters;
        let rate = delta_t / p.tau;
        Zip::from(&mut self.activation)
            .and(&drive)
            .for_each(|u, &s| *u += rate * (-*u + p.h + s));

        let beta = p.beta;
        Zip::from(&mut self.output)
            .and(&self.activation)
            .for_each(|o, &u| *o = sigmoid(u, beta));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use ndarray::Array1;

    fn field() -> NeuralField {
        NeuralField::new(
            "u",
            NeuralFieldParameters {
                size: vec![9],
                tau: 10.0,
                h: -5.0,
                beta: 4.0,
            },
        )
    }

    #[test]
    fn init_sets_resting_level() {
        let mut u = field();
        u.init().unwrap();
        assert!(u.output(None).unwrap().iter().all(|&v| v == -5.0));
        // Default component is the activation; the sigmoided output is far
        // below threshold at rest.
        assert!(u.output(Some("output")).unwrap().iter().all(|&v| v < 1e-8));
    }

    #[test]
    fn without_input_the_field_stays_at_rest() {
        let mut u = field();
        u.init().unwrap();
        for t in 1..=10 {
            u.step(t as f64, 1.0, &[]).unwrap();
        }
        assert!(u
            .output(None)
            .unwrap()
            .iter()
            .all(|&v| is_close!(v, -5.0)));
    }

    #[test]
    fn constant_drive_relaxes_to_h_plus_input() {
        let mut u = field();
        u.init().unwrap();
        let drive = Array1::from_elem(9, 8.0).into_dyn();
        for t in 1..=400 {
            u.step(t as f64, 1.0, &[drive.view()]).unwrap();
        }
        // Fixed point of u' = -u + h + s is h + s = 3.
        for &v in u.output(None).unwrap().iter() {
            assert!((v - 3.0).abs() < 1e-6);
        }
        // Supra-threshold activation saturates the sigmoid.
        assert!(u.output(Some("output")).unwrap().iter().all(|&v| v > 0.99));
    }

    #[test]
    fn inputs_are_summed() {
        let mut u = field();
        u.init().unwrap();
        let a = Array1::from_elem(9, 2.0).into_dyn();
        let b = Array1::from_elem(9, 3.0).into_dyn();
        u.step(1.0, 1.0, &[a.view(), b.view()]).unwrap();

        let mut single = field();
        single.init().unwrap();
        let s = Array1::from_elem(9, 5.0).into_dyn();
        single.step(1.0, 1.0, &[s.view()]).unwrap();

        assert_eq!(
            u.output(None).unwrap().to_owned(),
            single.output(None).unwrap().to_owned()
        );
    }

    #[test]
    fn mismatched_drive_is_fatal() {
        let mut u = field();
        u.init().unwrap();
        let bad = Array1::zeros(4).into_dyn();
        let err = u.step(1.0, 1.0, &[bad.view()]).unwrap_err();
        assert!(matches!(err, NFieldError::ShapeMismatch { .. }));
        assert!(u.output(None).unwrap().iter().all(|&v| v == -5.0));
    }

    #[test]
    fn nonpositive_tau_is_fatal() {
        let mut u = field();
        u.init().unwrap();
        u.set_parameter("tau", ParamValue::Scalar(0.0)).unwrap();
        let err = u.step(1.0, 1.0, &[]).unwrap_err();
        assert!(matches!(err, NFieldError::UnsupportedConfiguration { .. }));
    }
}
