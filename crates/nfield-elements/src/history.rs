//! Time-indexed recording of a signal.

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use nfield_core::element::{
    expect_input_count, expect_shape, Element, FloatValue, InputArity, Lifecycle, Time,
};
use nfield_core::errors::{NFieldError, NFieldResult};
use nfield_core::parameters::{ParamClass, ParamValue, ParameterRegistry};
use nfield_core::ports::ComponentTable;
use serde::{Deserialize, Serialize};

static HISTORY_PARAMETERS: ParameterRegistry = ParameterRegistry::new(&[
    ("size", ParamClass::Fixed),
    ("recorded_steps", ParamClass::Fixed),
]);

static HISTORY_COMPONENTS: ComponentTable = ComponentTable::new(&["output"], "output");

/// Records its input into a pre-allocated time-indexed buffer.
///
/// The buffer has shape `(recorded_steps + 1) × size` and is allocated once
/// at `init()`. Each step writes the input into the row indexed by the
/// current tick number, `floor(time / delta_t)`; a tick beyond the recording
/// capacity is a fatal error, never a silent reallocation. Inputs of more
/// than two dimensions are not supported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    label: String,
    size: Vec<usize>,
    recorded_steps: usize,
    lifecycle: Lifecycle,
    output: ArrayD<FloatValue>,
}

impl History {
    pub fn new(label: impl Into<String>, size: Vec<usize>, recorded_steps: usize) -> Self {
        Self {
            label: label.into(),
            size,
            recorded_steps,
            lifecycle: Lifecycle::new(),
            output: ArrayD::zeros(IxDyn(&[0])),
        }
    }

    /// Recording capacity in ticks.
    pub fn capacity(&self) -> usize {
        self.recorded_steps + 1
    }
}

#[typetag::serde]
impl Element for History {
    fn label(&self) -> &str {
        &self.label
    }

    fn parameters(&self) -> &'static ParameterRegistry {
        &HISTORY_PARAMETERS
    }

    fn components(&self) -> &'static ComponentTable {
        &HISTORY_COMPONENTS
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
        if self.size.is_empty() || self.size.len() > 2 {
            return Err(NFieldError::UnsupportedConfiguration {
                element: self.label.clone(),
                reason: format!(
                    "inputs of shape {:?} are not supported; only one- and \
                     two-dimensional signals can be recorded",
                    self.size
                ),
            });
        }
        let mut shape = Vec::with_capacity(self.size.len() + 1);
        shape.push(self.capacity());
        shape.extend_from_slice(&self.size);
        self.output = ArrayD::zeros(IxDyn(&shape));
        Ok(())
    }

    fn step_element(
        &mut self,
        time: Time,
        delta_t: Time,
        inputs: &[ArrayViewD<FloatValue>],
    ) -> NFieldResult<()> {
        expect_input_count(&self.label, self.input_arity(), inputs.len())?;
        expect_shape(&self.label, &self.size, inputs[0].shape())?;

        let slot = (time / delta_t).floor();
        if slot < 0.0 || slot as usize >= self.capacity() {
            return Err(NFieldError::StepIndexOutOfRange {
                element: self.label.clone(),
                time,
                capacity: self.capacity(),
            });
        }
        self.output
            .index_axis_mut(Axis(0), slot as usize)
            .assign(&inputs[0]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn records_rows_by_tick() {
        let mut history = History::new("history", vec![2], 3);
        history.init().unwrap();
        assert_eq!(history.output(None).unwrap().shape(), &[4, 2]);

        let first = array![1.0, 2.0].into_dyn();
        let second = array![3.0, 4.0].into_dyn();
        history.step(1.0, 1.0, &[first.view()]).unwrap();
        history.step(2.0, 1.0, &[second.view()]).unwrap();

        let out = history.output(None).unwrap();
        assert_eq!(out[[1, 0]], 1.0);
        assert_eq!(out[[2, 1]], 4.0);
        // Unwritten slots stay zero.
        assert_eq!(out[[0, 0]], 0.0);
        assert_eq!(out[[3, 0]], 0.0);
    }

    #[test]
    fn slot_follows_delta_t() {
        let mut history = History::new("history", vec![1], 10);
        history.init().unwrap();
        let v = array![5.0].into_dyn();
        history.step(2.0, 0.5, &[v.view()]).unwrap();
        assert_eq!(history.output(None).unwrap()[[4, 0]], 5.0);
    }

    #[test]
    fn overflowing_the_buffer_is_fatal() {
        let mut history = History::new("history", vec![2], 2);
        history.init().unwrap();
        let v = array![1.0, 1.0].into_dyn();

        history.step(2.0, 1.0, &[v.view()]).unwrap();
        let err = history.step(3.0, 1.0, &[v.view()]).unwrap_err();
        assert!(matches!(
            err,
            NFieldError::StepIndexOutOfRange { capacity: 3, .. }
        ));
        // The buffer shape is unchanged by the failed write.
        assert_eq!(history.output(None).unwrap().shape(), &[3, 2]);
    }

    #[test]
    fn two_dimensional_signals_are_recorded() {
        let mut history = History::new("history", vec![2, 2], 1);
        history.init().unwrap();
        let frame = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        history.step(1.0, 1.0, &[frame.view()]).unwrap();
        let out = history.output(None).unwrap();
        assert_eq!(out.shape(), &[2, 2, 2]);
        assert_eq!(out[[1, 1, 0]], 3.0);
    }

    #[test]
    fn three_dimensional_signals_are_rejected() {
        let mut history = History::new("history", vec![2, 2, 2], 1);
        let err = history.init().unwrap_err();
        assert!(matches!(err, NFieldError::UnsupportedConfiguration { .. }));
    }

    #[test]
    fn size_and_capacity_are_fixed() {
        let mut history = History::new("history", vec![2], 2);
        let err = history
            .set_parameter("recorded_steps", ParamValue::Count(5))
            .unwrap_err();
        assert!(matches!(err, NFieldError::ImmutableParameter { .. }));
    }
}
