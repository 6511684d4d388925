//! The logistic sigmoid used as the nonlinearity of every convolutional layer.
//!
//! Backward passes already hold the activated output `s = sigmoid(x)` of the forward pass,
//! so the derivative is available from the output alone, see [`sigmoid_derivative_from_output`].
use crate::ImagePrecision;

pub fn sigmoid(x: ImagePrecision) -> ImagePrecision {
    1. / (1. + (-x).exp())
}

/// Derivative of the sigmoid at the pre-activation input `x`.
pub fn sigmoid_derivative(x: ImagePrecision) -> ImagePrecision {
    sigmoid_derivative_from_output(sigmoid(x))
}

/// Derivative of the sigmoid, given its output `s = sigmoid(x)`.
#[inline]
pub fn sigmoid_derivative_from_output(s: ImagePrecision) -> ImagePrecision {
    s * (1. - s)
}
