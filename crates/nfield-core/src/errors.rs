use crate::element::Time;
use thiserror::Error;

/// Error type for invalid operations.
///
/// All variants are raised synchronously at the point of violation and are
/// never retried: they indicate programmer or configuration errors, not
/// transient faults.
#[derive(Error, Debug)]
pub enum NFieldError {
    #[error("element {element} has no parameter named {name}")]
    UnknownParameter { element: String, name: String },
    #[error("parameter {name} of element {element} is fixed at construction and cannot be changed")]
    ImmutableParameter { element: String, name: String },
    #[error("element {element} does not expose an output component named {name}")]
    UnknownComponent { element: String, name: String },
    #[error("element {element} cannot step: {reason}")]
    StaleState { element: String, reason: String },
    #[error("element {element} expected an array of shape {expected:?}, got {actual:?}")]
    ShapeMismatch {
        element: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("invalid configuration for element {element}: {reason}")]
    UnsupportedConfiguration { element: String, reason: String },
    #[error("element {element} has no storage slot for simulation time {time} (capacity {capacity})")]
    StepIndexOutOfRange {
        element: String,
        time: Time,
        capacity: usize,
    },
    #[error("no element labelled {0} is registered with the simulator")]
    UnknownElement(String),
    #[error("an element labelled {0} is already registered")]
    DuplicateLabel(String),
    #[error("element {element} expects {expected} input(s) but is wired with {actual}")]
    InputArityMismatch {
        element: String,
        expected: String,
        actual: usize,
    },
}

/// Convenience type for `Result<T, NFieldError>`.
pub type NFieldResult<T> = Result<T, NFieldError>;
