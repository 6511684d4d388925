use crate::{
    activation_functions::sigmoid,
    data_array::{DataArray, Size},
    errors::{LayerError, LayerResult},
    layers::NetworkLayer,
    ImagePrecision, WeightPrecision,
};
use log::debug;
use rand::Rng;

/// Weights and bias producing one output channel of a convolution.
/// The weights have size (filter size, filter size, input depth).
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub weights: DataArray,
    pub bias: WeightPrecision,
}

impl Filter {
    pub fn new(weights: DataArray, bias: WeightPrecision) -> Self {
        Self { weights, bias }
    }
}

/// Rust implementation of a sigmoid activated convolutional layer.
///
/// The input is surrounded by `zero_padding` zeros on every spatial side and every
/// one of the `depth` filters is slid over it with the given stride, producing one
/// output channel each.
#[derive(Debug, Clone)]
pub struct ConvolutionLayer {
    input_size: Size,
    output_size: Size,
    depth: usize,
    stride: usize,
    zero_padding: usize,
    filter_size: usize,
    /// Input size after zero padding
    real_input_size: Size,
    filters: Vec<Filter>,
    // Scratch tensors of size real_input_size, reused between calls.
    real_input: DataArray,
    real_input_error: DataArray,
}

/// Checks the layer parameters and returns the padded input size and the output size.
fn convolution_geometry(
    input_size: Size,
    depth: usize,
    stride: usize,
    zero_padding: usize,
    filter_size: usize,
) -> LayerResult<(Size, Size)> {
    if stride == 0 {
        return Err(LayerError::ConfigurationError(
            "stride has to be positive".to_string(),
        ));
    }
    if filter_size == 0 {
        return Err(LayerError::ConfigurationError(
            "filter size has to be positive".to_string(),
        ));
    }
    if depth == 0 {
        return Err(LayerError::ConfigurationError(
            "a convolution needs at least one filter".to_string(),
        ));
    }
    match input_size.checked_elem_cnt() {
        Some(0) => {
            return Err(LayerError::ConfigurationError(format!(
                "input size {} is empty",
                input_size
            )))
        }
        None => {
            return Err(LayerError::ConfigurationError(format!(
                "input size {} is too large",
                input_size
            )))
        }
        Some(_) => {}
    }

    let padded = |extent: usize| {
        zero_padding
            .checked_mul(2)
            .and_then(|p| p.checked_add(extent))
    };
    let real_input_size = match (padded(input_size.w), padded(input_size.h)) {
        (Some(w), Some(h)) if Size::new(w, h, input_size.d).checked_elem_cnt().is_some() => {
            Size::new(w, h, input_size.d)
        }
        _ => {
            return Err(LayerError::ConfigurationError(format!(
                "zero padding {} is too large for input {}",
                zero_padding, input_size
            )))
        }
    };
    for &(name, extent) in &[("width", real_input_size.w), ("height", real_input_size.h)] {
        if extent < filter_size || (extent - filter_size) % stride != 0 {
            return Err(LayerError::ConfigurationError(format!(
                "padded input {} {} cannot be covered by filters of size {} with stride {}",
                name, extent, filter_size, stride
            )));
        }
    }

    let output_size = Size::new(
        (real_input_size.w - filter_size) / stride + 1,
        (real_input_size.h - filter_size) / stride + 1,
        depth,
    );
    Ok((real_input_size, output_size))
}

impl ConvolutionLayer {
    /// New layer with filter weights drawn uniformly from [0, 0.01) and zero biases.
    pub fn new(
        input_size: Size,
        depth: usize,
        stride: usize,
        zero_padding: usize,
        filter_size: usize,
    ) -> LayerResult<ConvolutionLayer> {
        Self::new_with_rng(
            input_size,
            depth,
            stride,
            zero_padding,
            filter_size,
            &mut rand::thread_rng(),
        )
    }

    pub fn new_with_rng<R: Rng>(
        input_size: Size,
        depth: usize,
        stride: usize,
        zero_padding: usize,
        filter_size: usize,
        rng: &mut R,
    ) -> LayerResult<ConvolutionLayer> {
        // validate before allocating anything
        convolution_geometry(input_size, depth, stride, zero_padding, filter_size)?;

        let filters = (0..depth)
            .map(|_| {
                let mut weights = DataArray::with_dims(filter_size, filter_size, input_size.d);
                weights.fill_rnd_with(rng, 0., 0.01);
                Filter::new(weights, 0.)
            })
            .collect();
        Self::with_filters(input_size, stride, zero_padding, filters)
    }

    /// Builds a layer from existing filters, one output channel per filter.
    /// All filters have to share the same square size and span the full input depth.
    pub fn with_filters(
        input_size: Size,
        stride: usize,
        zero_padding: usize,
        filters: Vec<Filter>,
    ) -> LayerResult<ConvolutionLayer> {
        let filter_size = filters.first().map_or(0, |f| f.weights.size().w);
        let depth = filters.len();
        let (real_input_size, output_size) =
            convolution_geometry(input_size, depth, stride, zero_padding, filter_size)?;

        let filter_dims = Size::new(filter_size, filter_size, input_size.d);
        for filter in &filters {
            LayerError::check_size("filter", filter_dims, filter.weights.size())?;
        }

        debug!(
            "Convolution {} -> {}: filter {}, stride {}, zero padding {}",
            input_size, output_size, filter_size, stride, zero_padding
        );

        Ok(ConvolutionLayer {
            input_size,
            output_size,
            depth,
            stride,
            zero_padding,
            filter_size,
            real_input_size,
            filters,
            real_input: DataArray::new(real_input_size),
            real_input_error: DataArray::new(real_input_size),
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn zero_padding(&self) -> usize {
        self.zero_padding
    }

    pub fn filter_size(&self) -> usize {
        self.filter_size
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }
}

impl NetworkLayer for ConvolutionLayer {
    fn input_size(&self) -> Size {
        self.input_size
    }

    fn output_size(&self) -> Size {
        self.output_size
    }

    /// Direct convolution over the zero padded input followed by the sigmoid.
    fn propagate(&mut self, input: &DataArray, output: &mut DataArray) -> LayerResult<()> {
        LayerError::check_size("convolution input", self.input_size, input.size())?;
        LayerError::check_size("convolution output", self.output_size, output.size())?;

        input.add_zeros(self.zero_padding, &mut self.real_input);

        for (d, filter) in self.filters.iter().enumerate() {
            let weights = filter.weights.as_array();
            for xo in 0..self.output_size.w {
                for yo in 0..self.output_size.h {
                    let window =
                        self.real_input
                            .window(xo * self.stride, yo * self.stride, self.filter_size);

                    // window and weights are both walked depth plane by depth plane, row by row
                    let sum = window
                        .iter()
                        .zip(weights.iter())
                        .fold(0. as ImagePrecision, |acc, (x, w)| acc + x * w);

                    *output.at_mut(xo, yo, d) = sigmoid(sum + filter.bias);
                }
            }
        }
        Ok(())
    }

    /// Runs in two passes: the error is first propagated to the input with the weights
    /// the forward pass used, only then are the weights and biases updated.
    fn back_propagate(
        &mut self,
        input: &DataArray,
        output: &DataArray,
        error: &DataArray,
        input_error: &mut DataArray,
        lambda: WeightPrecision,
    ) -> LayerResult<()> {
        LayerError::check_size("convolution input", self.input_size, input.size())?;
        LayerError::check_size("convolution input error", self.input_size, input_error.size())?;
        LayerError::check_size("convolution output", self.output_size, output.size())?;
        LayerError::check_size("convolution error", self.output_size, error.size())?;

        input.add_zeros(self.zero_padding, &mut self.real_input);
        self.real_input_error.ensure_size(self.real_input_size);
        self.real_input_error.clear();

        for (d, filter) in self.filters.iter().enumerate() {
            let weights = filter.weights.as_array();
            for xo in 0..self.output_size.w {
                for yo in 0..self.output_size.h {
                    let s = output.at(xo, yo, d);
                    let local_grad = error.at(xo, yo, d) * (1. - s) * s;

                    self.real_input_error
                        .window_mut(xo * self.stride, yo * self.stride, self.filter_size)
                        .scaled_add(local_grad, &weights);
                }
            }
        }

        for (d, filter) in self.filters.iter_mut().enumerate() {
            for xo in 0..self.output_size.w {
                for yo in 0..self.output_size.h {
                    // sigmoid derivative s * (1 - s) folded in left to right
                    let s = output.at(xo, yo, d);
                    let scaled_grad = error.at(xo, yo, d) * lambda * (1. - s) * s;

                    let window =
                        self.real_input
                            .window(xo * self.stride, yo * self.stride, self.filter_size);
                    filter
                        .weights
                        .as_array_mut()
                        .scaled_add(-scaled_grad, &window);
                    filter.bias -= scaled_grad;
                }
            }
        }

        self.real_input_error
            .remove_frame(self.zero_padding, input_error)
    }
}
