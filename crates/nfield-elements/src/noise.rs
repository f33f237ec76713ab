//! Gaussian noise stimulus for stochastic architectures.

use ndarray::{ArrayD, ArrayViewD, IxDyn};
use nfield_core::element::{Element, FloatValue, InputArity, Lifecycle, Time};
use nfield_core::errors::{NFieldError, NFieldResult};
use nfield_core::parameters::{ParamClass, ParamValue, ParameterRegistry};
use nfield_core::ports::ComponentTable;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalNoiseParameters {
    pub size: usize,
    pub amplitude: FloatValue,
    /// Seed for a reproducible sequence; `None` seeds from entropy at `init()`.
    pub seed: Option<u64>,
}

static NORMAL_NOISE_PARAMETERS: ParameterRegistry = ParameterRegistry::new(&[
    ("size", ParamClass::Fixed),
    ("amplitude", ParamClass::Free),
    ("seed", ParamClass::Fixed),
]);

static NORMAL_NOISE_COMPONENTS: ComponentTable = ComponentTable::new(&["output"], "output");

fn entropy_rng() -> StdRng {
    StdRng::from_entropy()
}

/// Zero-input element writing fresh normally distributed values every step,
/// scaled by `amplitude`.
///
/// The generator state is not serialised; a deserialised element continues
/// with a fresh entropy-seeded generator unless a fixed seed is configured,
/// in which case `init()` restores the reproducible sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalNoise {
    label: String,
    parameters: NormalNoiseParameters,
    lifecycle: Lifecycle,
    output: ArrayD<FloatValue>,
    #[serde(skip, default = "entropy_rng")]
    rng: StdRng,
}

impl NormalNoise {
    pub fn new(label: impl Into<String>, parameters: NormalNoiseParameters) -> Self {
        Self {
            label: label.into(),
            parameters,
            lifecycle: Lifecycle::new(),
            output: ArrayD::zeros(IxDyn(&[0])),
            rng: entropy_rng(),
        }
    }
}

#[typetag::serde]
impl Element for NormalNoise {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &NORMAL_NOISE_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &NORMAL_NOISE_COMPONENTS
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
            "amplitude" => self.parameters.amplitude = value.into_scalar(&self.label, name)?,
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
        self.output = ArrayD::zeros(IxDyn(&[self.parameters.size]));
        self.rng = match self.parameters.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => entropy_rng(),
        };
        Ok(())
    }

    fn step_element(
        &mut self,
        _time: Time,
        _delta_t: Time,
        _inputs: &[ArrayViewD<FloatValue>],
    ) -> NFieldResult<()> {
        let amplitude = self.parameters.amplitude;
        for value in self.output.iter_mut() {
            let sample: FloatValue = self.rng.sample(StandardNormal);
            *value = amplitude * sample;
        }
        Ok(())
    }
}
