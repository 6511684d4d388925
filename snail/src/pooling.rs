//! Max pooling over non-overlapping square windows.
//!
//! No learnable parameters, no activation. The backward pass routes the error of every
//! output cell to the input cell that held the window maximum; the first maximal cell in
//! row-major window order wins ties.
use crate::{
    data_array::{DataArray, Size},
    errors::{LayerError, LayerResult},
    layers::NetworkLayer,
    ImagePrecision, WeightPrecision,
};
use log::debug;

#[derive(Debug, Clone)]
pub struct MaxPoolLayer {
    input_size: Size,
    output_size: Size,
    filter_size: usize,
}

impl MaxPoolLayer {
    /// The windows have to tile the input exactly.
    pub fn new(input_size: Size, filter_size: usize) -> LayerResult<MaxPoolLayer> {
        if filter_size == 0 {
            return Err(LayerError::ConfigurationError(
                "pooling window has to be positive".to_string(),
            ));
        }
        if input_size.checked_elem_cnt().map_or(true, |cnt| cnt == 0)
            || input_size.w % filter_size != 0
            || input_size.h % filter_size != 0
        {
            return Err(LayerError::ConfigurationError(format!(
                "input {} cannot be tiled by {}x{} pooling windows",
                input_size, filter_size, filter_size
            )));
        }

        let output_size = Size::new(
            input_size.w / filter_size,
            input_size.h / filter_size,
            input_size.d,
        );
        debug!(
            "Max pool {} -> {}: window {}",
            input_size, output_size, filter_size
        );

        Ok(MaxPoolLayer {
            input_size,
            output_size,
            filter_size,
        })
    }

    pub fn filter_size(&self) -> usize {
        self.filter_size
    }

    /// Offset (dx, dy) of the maximum in the window of output cell (xo, yo, z), and the maximum.
    fn argmax(
        &self,
        input: &DataArray,
        xo: usize,
        yo: usize,
        z: usize,
    ) -> (usize, usize, ImagePrecision) {
        let x0 = xo * self.filter_size;
        let y0 = yo * self.filter_size;

        let mut best = (0, 0, input.at(x0, y0, z));
        for dy in 0..self.filter_size {
            for dx in 0..self.filter_size {
                let val = input.at(x0 + dx, y0 + dy, z);
                if val > best.2 {
                    best = (dx, dy, val);
                }
            }
        }
        best
    }
}

impl NetworkLayer for MaxPoolLayer {
    fn input_size(&self) -> Size {
        self.input_size
    }

    fn output_size(&self) -> Size {
        self.output_size
    }

    fn propagate(&mut self, input: &DataArray, output: &mut DataArray) -> LayerResult<()> {
        LayerError::check_size("pooling input", self.input_size, input.size())?;
        LayerError::check_size("pooling output", self.output_size, output.size())?;

        for z in 0..self.output_size.d {
            for yo in 0..self.output_size.h {
                for xo in 0..self.output_size.w {
                    *output.at_mut(xo, yo, z) = self.argmax(input, xo, yo, z).2;
                }
            }
        }
        Ok(())
    }

    /// `lambda` is ignored, there is nothing to learn.
    fn back_propagate(
        &mut self,
        input: &DataArray,
        output: &DataArray,
        error: &DataArray,
        input_error: &mut DataArray,
        _lambda: WeightPrecision,
    ) -> LayerResult<()> {
        LayerError::check_size("pooling input", self.input_size, input.size())?;
        LayerError::check_size("pooling input error", self.input_size, input_error.size())?;
        LayerError::check_size("pooling output", self.output_size, output.size())?;
        LayerError::check_size("pooling error", self.output_size, error.size())?;

        input_error.clear();
        for z in 0..self.output_size.d {
            for yo in 0..self.output_size.h {
                for xo in 0..self.output_size.w {
                    let (dx, dy, _) = self.argmax(input, xo, yo, z);
                    *input_error.at_mut(
                        xo * self.filter_size + dx,
                        yo * self.filter_size + dy,
                        z,
                    ) = error.at(xo, yo, z);
                }
            }
        }
        Ok(())
    }
}
