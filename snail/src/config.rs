//! JSON description of a network topology.
//!
//! ```json
//! {
//!     "input_size": {"w": 8, "h": 8, "d": 1},
//!     "seed": 42,
//!     "layers": [
//!         {"type": "convolutional", "depth": 4, "stride": 1, "zero_padding": 1, "filter_size": 3},
//!         {"type": "max_pool", "filter_size": 2},
//!         {"type": "full_connected", "depth": 10}
//!     ]
//! }
//! ```
//! The input size of every layer is the output size of the previous one.
use std::{fs, path::Path};

use rand::{rngs::StdRng, SeedableRng};
use serde_derive::{Deserialize, Serialize};

use crate::{
    convolutions::ConvolutionLayer,
    data_array::Size,
    errors::{LayerError, LayerResult},
    layers::{Layer, NetworkLayer},
    pooling::MaxPoolLayer,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerConfig {
    Convolutional {
        depth: usize,
        stride: usize,
        zero_padding: usize,
        filter_size: usize,
    },
    MaxPool {
        filter_size: usize,
    },
    FullConnected {
        depth: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub input_size: Size,
    pub layers: Vec<LayerConfig>,
    /// Seed for the initial filter weights, random if missing
    #[serde(default)]
    pub seed: Option<u64>,
}

impl NetworkConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> LayerResult<NetworkConfig> {
        let raw_file = fs::read_to_string(path)?;
        Self::from_json(&raw_file)
    }

    pub fn from_json(raw: &str) -> LayerResult<NetworkConfig> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Creates freshly initialized layers, chaining the sizes from the network input on.
    pub fn build_layers(&self) -> LayerResult<Vec<Layer>> {
        if self.layers.is_empty() {
            return Err(LayerError::ConfigurationError(
                "a network needs at least one layer".to_string(),
            ));
        }
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut input_size = self.input_size;
        let mut layers = Vec::with_capacity(self.layers.len());
        for layer_config in &self.layers {
            let layer = match *layer_config {
                LayerConfig::Convolutional {
                    depth,
                    stride,
                    zero_padding,
                    filter_size,
                } => Layer::Convolutional(ConvolutionLayer::new_with_rng(
                    input_size,
                    depth,
                    stride,
                    zero_padding,
                    filter_size,
                    &mut rng,
                )?),
                LayerConfig::MaxPool { filter_size } => {
                    Layer::MaxPool(MaxPoolLayer::new(input_size, filter_size)?)
                }
                LayerConfig::FullConnected { depth } => Layer::FullConnected(
                    ConvolutionLayer::fully_connected_with_rng(input_size, depth, &mut rng)?,
                ),
            };
            input_size = layer.output_size();
            layers.push(layer);
        }
        Ok(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::LayerType;

    const LENET_LIKE: &str = r#"{
        "input_size": {"w": 8, "h": 8, "d": 1},
        "seed": 42,
        "layers": [
            {"type": "convolutional", "depth": 4, "stride": 1, "zero_padding": 1, "filter_size": 3},
            {"type": "max_pool", "filter_size": 2},
            {"type": "full_connected", "depth": 10}
        ]
    }"#;

    #[test]
    fn test_parse_config() {
        let config = NetworkConfig::from_json(LENET_LIKE).unwrap();
        assert_eq!(config.input_size, Size::new(8, 8, 1));
        assert_eq!(config.seed, Some(42));
        assert_eq!(
            config.layers,
            vec![
                LayerConfig::Convolutional {
                    depth: 4,
                    stride: 1,
                    zero_padding: 1,
                    filter_size: 3
                },
                LayerConfig::MaxPool { filter_size: 2 },
                LayerConfig::FullConnected { depth: 10 },
            ]
        );
    }

    #[test]
    fn test_build_layers_chains_sizes() {
        let layers = NetworkConfig::from_json(LENET_LIKE)
            .unwrap()
            .build_layers()
            .unwrap();
        let types: Vec<_> = layers.iter().map(|l| l.layer_type()).collect();
        assert_eq!(
            types,
            vec![
                LayerType::Convolutional,
                LayerType::MaxPool,
                LayerType::FullConnected
            ]
        );
        assert_eq!(layers[0].output_size(), Size::new(8, 8, 4));
        assert_eq!(layers[1].output_size(), Size::new(4, 4, 4));
        assert_eq!(layers[2].input_size(), Size::new(4, 4, 4));
        assert_eq!(layers[2].output_size(), Size::new(1, 1, 10));
    }

    #[test]
    fn test_seed_makes_weights_reproducible() {
        let config = NetworkConfig::from_json(LENET_LIKE).unwrap();
        let first = config.build_layers().unwrap();
        let second = config.build_layers().unwrap();
        match (&first[0], &second[0]) {
            (Layer::Convolutional(a), Layer::Convolutional(b)) => {
                assert_eq!(a.filters(), b.filters())
            }
            _ => panic!("expected convolutions"),
        }
    }

    #[test]
    fn test_invalid_configs() {
        let no_layers = r#"{"input_size": {"w": 2, "h": 2, "d": 1}, "layers": []}"#;
        assert!(matches!(
            NetworkConfig::from_json(no_layers).unwrap().build_layers(),
            Err(LayerError::ConfigurationError(_))
        ));

        let uneven_pool =
            r#"{"input_size": {"w": 3, "h": 3, "d": 1}, "layers": [{"type": "max_pool", "filter_size": 2}]}"#;
        assert!(matches!(
            NetworkConfig::from_json(uneven_pool).unwrap().build_layers(),
            Err(LayerError::ConfigurationError(_))
        ));

        let unknown_type =
            r#"{"input_size": {"w": 3, "h": 3, "d": 1}, "layers": [{"type": "dropout"}]}"#;
        assert!(matches!(
            NetworkConfig::from_json(unknown_type),
            Err(LayerError::ConfigFormatError(_))
        ));
    }
}
