use std::{
    convert::TryFrom,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use log::{debug, trace};

use crate::{
    config::NetworkConfig,
    data_array::{DataArray, Size},
    errors::{LayerError, LayerResult},
    layers::{Layer, NetworkLayer},
    serialization::{read_int, write_int},
    WeightPrecision,
};

/// Chain of layers trained with plain gradient descent on a squared error loss.
///
/// The network owns every tensor passed between its layers, so a training step
/// allocates nothing once the network is built.
#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
    /// Output of every layer from the latest forward pass
    outputs: Vec<DataArray>,
    /// Error with respect to every layer's input from the latest training step
    input_errors: Vec<DataArray>,
    /// Error with respect to the network output
    output_error: DataArray,
}

impl Network {
    /// Every layer's output size has to match the next layer's input size.
    pub fn new(layers: Vec<Layer>) -> LayerResult<Network> {
        if layers.is_empty() {
            return Err(LayerError::ConfigurationError(
                "a network needs at least one layer".to_string(),
            ));
        }
        for (i, pair) in layers.windows(2).enumerate() {
            if pair[0].output_size() != pair[1].input_size() {
                return Err(LayerError::ConfigurationError(format!(
                    "layer {} produces {} but layer {} expects {}",
                    i,
                    pair[0].output_size(),
                    i + 1,
                    pair[1].input_size()
                )));
            }
        }

        let outputs = layers.iter().map(|l| DataArray::new(l.output_size())).collect();
        let input_errors = layers.iter().map(|l| DataArray::new(l.input_size())).collect();
        let output_error = DataArray::new(layers[layers.len() - 1].output_size());
        Ok(Network {
            layers,
            outputs,
            input_errors,
            output_error,
        })
    }

    pub fn from_config(config: &NetworkConfig) -> LayerResult<Network> {
        Self::new(config.build_layers()?)
    }

    pub fn input_size(&self) -> Size {
        self.layers[0].input_size()
    }

    pub fn output_size(&self) -> Size {
        self.layers[self.layers.len() - 1].output_size()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Runs the input through all layers and returns the network output.
    pub fn forward(&mut self, input: &DataArray) -> LayerResult<&DataArray> {
        LayerError::check_size("network input", self.input_size(), input.size())?;

        for (i, layer) in self.layers.iter_mut().enumerate() {
            let (previous, current) = self.outputs.split_at_mut(i);
            let layer_input = if i == 0 { input } else { &previous[i - 1] };
            layer.propagate(layer_input, &mut current[0])?;
        }
        Ok(&self.outputs[self.outputs.len() - 1])
    }

    /// One gradient descent step on the loss `0.5 * sum((output - target)^2)`.
    /// Returns the loss of the forward pass, before the parameters were updated.
    pub fn train(
        &mut self,
        input: &DataArray,
        target: &DataArray,
        lambda: WeightPrecision,
    ) -> LayerResult<WeightPrecision> {
        LayerError::check_size("training target", self.output_size(), target.size())?;
        self.forward(input)?;

        let last = self.layers.len() - 1;
        self.output_error.copy_from(&self.outputs[last]);
        let mut loss = 0.;
        for (e, t) in self
            .output_error
            .as_slice_mut()
            .iter_mut()
            .zip(target.as_slice())
        {
            *e -= t;
            loss += 0.5 * *e * *e;
        }

        for i in (0..self.layers.len()).rev() {
            let (errors_up_to_layer, later_errors) = self.input_errors.split_at_mut(i + 1);
            let error = if i == last {
                &self.output_error
            } else {
                &later_errors[0]
            };
            let layer_input = if i == 0 { input } else { &self.outputs[i - 1] };
            self.layers[i].back_propagate(
                layer_input,
                &self.outputs[i],
                error,
                &mut errors_up_to_layer[i],
                lambda,
            )?;
        }
        trace!("Training step loss: {}", loss);
        Ok(loss)
    }

    /// Writes the layer count followed by every layer record.
    pub fn write<W: Write>(&self, stream: &mut W) -> LayerResult<()> {
        let count = i32::try_from(self.layers.len())
            .map_err(|_| LayerError::FormatError("too many layers".to_string()))?;
        write_int(stream, count)?;
        for layer in &self.layers {
            layer.write(stream)?;
        }
        Ok(())
    }

    pub fn read<R: Read>(stream: &mut R) -> LayerResult<Network> {
        let count = read_int(stream)?;
        if count <= 0 {
            return Err(LayerError::FormatError(format!(
                "network with {} layers",
                count
            )));
        }
        let layers = (0..count)
            .map(|_| Layer::read(stream))
            .collect::<LayerResult<Vec<_>>>()?;
        Self::new(layers)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> LayerResult<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.write(&mut writer)?;
        writer.flush()?;
        debug!(
            "Saved network with {} layers to {}",
            self.layers.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> LayerResult<Network> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read(&mut reader)
    }
}
