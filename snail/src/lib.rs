//! A small convolutional neural network engine.
//!
//! Networks are chains of layers over 3-D tensors ([`data_array::DataArray`]).
//! Every layer can propagate an input forward and back-propagate an error,
//! updating its own parameters with plain gradient descent on the way.
//!
//! Example:
//! ```
//! use snail::data_array::{DataArray, Size};
//! use snail::layers::NetworkLayer;
//! use snail::pooling::MaxPoolLayer;
//!
//! let input = DataArray::from_vec(
//!     Size::new(2, 2, 1),
//!     vec![1., 3., 2., 4.],
//! )
//! .unwrap();
//! let mut layer = MaxPoolLayer::new(Size::new(2, 2, 1), 2).unwrap();
//! let mut output = DataArray::new(layer.output_size());
//! layer.propagate(&input, &mut output).unwrap();
//!
//! assert_eq!(output.at(0, 0, 0), 4.);
//! ```
pub mod activation_functions;
pub mod config;
pub mod convolutions;
pub mod data_array;
pub mod errors;
pub mod fully_connected;
pub mod layers;
pub mod models;
pub mod pooling;
pub mod serialization;

pub type WeightPrecision = f32;
pub type ImagePrecision = f32;
