use thiserror::Error;

/// Errors raised by a [`LogicalTimeValue`](crate::LogicalTimeValue) implementation.
#[derive(Debug, Error)]
pub enum TimeError {
    #[error("buffer too short to decode a logical time: got {got} bytes, need at least {need}")]
    ShortBuffer { got: usize, need: usize },
}
