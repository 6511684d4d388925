use crate::data_array::Size;
use log::warn;
use ndarray::ShapeError;
use thiserror::Error;

pub type LayerResult<T> = Result<T, LayerError>;

#[derive(Error, Debug)]
pub enum LayerError {
    #[error("Invalid layer parameters: {0}")]
    ConfigurationError(String),
    #[error("Wrong size for {what}: expected {expected}, got {actual}")]
    SizeMismatchError {
        what: &'static str,
        expected: Size,
        actual: Size,
    },
    #[error("Cannot remove a frame of width {width} from a tensor of size {size}")]
    GeometryError { size: Size, width: usize },
    #[error("Coordinate ({x}, {y}, {z}) is out of bounds for a tensor of size {size}")]
    IndexOutOfBounds {
        x: usize,
        y: usize,
        z: usize,
        size: Size,
    },
    #[error("Unknown layer type tag {0}")]
    UnknownLayerType(i32),
    #[error("Layer stream is malformed: {0}")]
    FormatError(String),
    #[error("Wrong shape for tensor data:\n {0}.")]
    ShapeError(#[from] ShapeError),
    #[error("Reading or writing a layer failed. Filesystem reported error\n {0}.")]
    IoError(#[from] std::io::Error),
    #[error("Network description didn't have the correct format:\n {0}.")]
    ConfigFormatError(#[from] serde_json::Error),
}

impl LayerError {
    /// Shorthand for checking a tensor size against the size a layer expects.
    pub(crate) fn check_size(what: &'static str, expected: Size, actual: Size) -> LayerResult<()> {
        if expected == actual {
            Ok(())
        } else {
            warn!("Rejected {} of size {}, expected {}", what, actual, expected);
            Err(LayerError::SizeMismatchError {
                what,
                expected,
                actual,
            })
        }
    }
}
