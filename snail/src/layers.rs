//! The common interface of all layers and the tagged union a network is built from.
use std::fmt;

use crate::{
    convolutions::ConvolutionLayer,
    data_array::{DataArray, Size},
    errors::{LayerError, LayerResult},
    pooling::MaxPoolLayer,
    WeightPrecision,
};

/// Forward and backward pass of a layer with fixed input and output geometry.
///
/// All tensors are owned by the caller and have to be allocated with the sizes
/// reported by [`NetworkLayer::input_size`] and [`NetworkLayer::output_size`].
/// Calls with wrongly sized tensors fail with a `SizeMismatchError` before
/// anything (tensors or parameters) is modified.
pub trait NetworkLayer {
    fn input_size(&self) -> Size;
    fn output_size(&self) -> Size;

    /// Computes the layer output for `input`.
    fn propagate(&mut self, input: &DataArray, output: &mut DataArray) -> LayerResult<()>;

    /// Given the `input` and `output` of the matching forward pass and the `error`
    /// with respect to the output, updates the layer parameters with learning rate
    /// `lambda` and writes the error with respect to the input into `input_error`.
    fn back_propagate(
        &mut self,
        input: &DataArray,
        output: &DataArray,
        error: &DataArray,
        input_error: &mut DataArray,
        lambda: WeightPrecision,
    ) -> LayerResult<()>;
}

/// Tag identifying the layer variant in a layer stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    Convolutional,
    MaxPool,
    FullConnected,
}

impl LayerType {
    pub fn tag(self) -> i32 {
        match self {
            LayerType::Convolutional => 0,
            LayerType::MaxPool => 1,
            LayerType::FullConnected => 2,
        }
    }

    pub fn from_tag(tag: i32) -> LayerResult<Self> {
        match tag {
            0 => Ok(LayerType::Convolutional),
            1 => Ok(LayerType::MaxPool),
            2 => Ok(LayerType::FullConnected),
            _ => Err(LayerError::UnknownLayerType(tag)),
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerType::Convolutional => "convolutional",
            LayerType::MaxPool => "max pool",
            LayerType::FullConnected => "fully connected",
        };
        f.write_str(name)
    }
}

/// A layer of a network.
///
/// A fully connected layer is a convolution whose single window covers the whole input,
/// it only differs from a convolutional layer in its tag.
#[derive(Debug, Clone)]
pub enum Layer {
    Convolutional(ConvolutionLayer),
    MaxPool(MaxPoolLayer),
    FullConnected(ConvolutionLayer),
}

impl Layer {
    pub fn layer_type(&self) -> LayerType {
        match self {
            Layer::Convolutional(_) => LayerType::Convolutional,
            Layer::MaxPool(_) => LayerType::MaxPool,
            Layer::FullConnected(_) => LayerType::FullConnected,
        }
    }

    fn inner(&self) -> &dyn NetworkLayer {
        match self {
            Layer::Convolutional(c) | Layer::FullConnected(c) => c,
            Layer::MaxPool(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn NetworkLayer {
        match self {
            Layer::Convolutional(c) | Layer::FullConnected(c) => c,
            Layer::MaxPool(m) => m,
        }
    }
}

impl From<ConvolutionLayer> for Layer {
    fn from(layer: ConvolutionLayer) -> Self {
        Layer::Convolutional(layer)
    }
}

impl From<MaxPoolLayer> for Layer {
    fn from(layer: MaxPoolLayer) -> Self {
        Layer::MaxPool(layer)
    }
}

impl NetworkLayer for Layer {
    fn input_size(&self) -> Size {
        self.inner().input_size()
    }

    fn output_size(&self) -> Size {
        self.inner().output_size()
    }

    fn propagate(&mut self, input: &DataArray, output: &mut DataArray) -> LayerResult<()> {
        self.inner_mut().propagate(input, output)
    }

    fn back_propagate(
        &mut self,
        input: &DataArray,
        output: &DataArray,
        error: &DataArray,
        input_error: &mut DataArray,
        lambda: WeightPrecision,
    ) -> LayerResult<()> {
        self.inner_mut()
            .back_propagate(input, output, error, input_error, lambda)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}",
            self.layer_type(),
            self.input_size(),
            self.output_size()
        )?;
        match self {
            Layer::Convolutional(c) | Layer::FullConnected(c) => write!(
                f,
                " (filter {}, stride {}, zero padding {})",
                c.filter_size(),
                c.stride(),
                c.zero_padding()
            ),
            Layer::MaxPool(m) => write!(f, " (window {})", m.filter_size()),
        }
    }
}
