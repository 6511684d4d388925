use crate::{
    convolutions::ConvolutionLayer,
    data_array::Size,
    errors::{LayerError, LayerResult},
    layers::{Layer, NetworkLayer},
};
use rand::Rng;

/// A fully connected layer is a convolution with a single window spanning the
/// whole (square) input, so every output channel is one unit seeing all inputs.
impl ConvolutionLayer {
    /// One output channel per `depth` over the whole input.
    ///
    /// Only square inputs are accepted: filter size and stride both equal the input width,
    /// so a taller input would yield a column of outputs instead of a single unit.
    pub fn fully_connected(input_size: Size, depth: usize) -> LayerResult<ConvolutionLayer> {
        Self::fully_connected_with_rng(input_size, depth, &mut rand::thread_rng())
    }

    pub fn fully_connected_with_rng<R: Rng>(
        input_size: Size,
        depth: usize,
        rng: &mut R,
    ) -> LayerResult<ConvolutionLayer> {
        if input_size.w != input_size.h {
            return Err(LayerError::ConfigurationError(format!(
                "fully connected layers need a square input, got {}",
                input_size
            )));
        }
        Self::new_with_rng(input_size, depth, input_size.w, 0, input_size.w, rng)
    }

    /// Returns true if the layer has the geometry of a fully connected layer.
    pub fn is_fully_connected(&self) -> bool {
        let input_size = self.input_size();
        input_size.w == input_size.h
            && self.filter_size() == input_size.w
            && self.stride() == input_size.w
            && self.zero_padding() == 0
    }
}

impl Layer {
    pub fn full_connected(input_size: Size, depth: usize) -> LayerResult<Layer> {
        Ok(Layer::FullConnected(ConvolutionLayer::fully_connected(
            input_size, depth,
        )?))
    }
}
