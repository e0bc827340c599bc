use super::{Parameter, Value};
use thiserror::Error;

/// Failures the engine deals with internally.
///
/// None of these reach the caller of the UI-facing methods, they're logged
/// in the task where they occurred and only affect that single operation.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("reading {parameter} failed: {cause:#}")]
    DeviceRead {
        parameter: Parameter,
        cause: anyhow::Error,
    },

    #[error("device reported invalid {parameter} value {raw:?}")]
    InvalidReading { parameter: Parameter, raw: String },

    #[error("writing {value} to {parameter} failed: {cause:#}")]
    DeviceWrite {
        parameter: Parameter,
        value: Value,
        cause: anyhow::Error,
    },

    #[error("{0} is not supported by this controller")]
    Unsupported(Parameter),

    #[error("{value:?} is not a valid {parameter} value")]
    InvalidValue { parameter: Parameter, value: Value },

    #[error("color preset {0} is not offered by the display")]
    UnknownPreset(String),
}
