//! Binary layer records.
//!
//! Integers are written as 4 byte little endian `i32`, floats as 4 byte little endian
//! IEEE-754 `f32`. A record starts with the [`LayerType`] tag, followed by
//! - convolutional and fully connected layers: input width, height and depth, depth,
//!   stride, zero padding, filter size, then every filter's weights in linear layout
//!   followed by its bias,
//! - max pool layers: input width, height and depth, filter size.
use std::convert::TryFrom;
use std::io::{self, Read, Write};

use log::debug;

use crate::{
    convolutions::{ConvolutionLayer, Filter},
    data_array::{DataArray, Size},
    errors::{LayerError, LayerResult},
    layers::{Layer, LayerType, NetworkLayer},
    pooling::MaxPoolLayer,
};

/// Largest tensor, in elements, a layer record may describe.
pub const MAX_RECORD_ELEMENTS: usize = 1 << 28;

fn check_record_size(what: &str, size: Size) -> LayerResult<()> {
    match size.checked_elem_cnt() {
        Some(cnt) if cnt <= MAX_RECORD_ELEMENTS => Ok(()),
        _ => Err(LayerError::FormatError(format!(
            "{} {} is too large",
            what, size
        ))),
    }
}

pub fn write_int<W: Write>(stream: &mut W, val: i32) -> io::Result<()> {
    stream.write_all(&val.to_le_bytes())
}

pub fn write_float<W: Write>(stream: &mut W, val: f32) -> io::Result<()> {
    stream.write_all(&val.to_le_bytes())
}

pub fn read_int<R: Read>(stream: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

pub fn read_float<R: Read>(stream: &mut R) -> io::Result<f32> {
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn write_usize<W: Write>(stream: &mut W, val: usize) -> LayerResult<()> {
    let val = i32::try_from(val)
        .map_err(|_| LayerError::FormatError(format!("{} does not fit into 4 bytes", val)))?;
    Ok(write_int(stream, val)?)
}

fn read_usize<R: Read>(stream: &mut R) -> LayerResult<usize> {
    let val = read_int(stream)?;
    usize::try_from(val).map_err(|_| LayerError::FormatError(format!("negative size {}", val)))
}

fn write_size<W: Write>(stream: &mut W, size: Size) -> LayerResult<()> {
    write_usize(stream, size.w)?;
    write_usize(stream, size.h)?;
    write_usize(stream, size.d)
}

fn read_size<R: Read>(stream: &mut R) -> LayerResult<Size> {
    let w = read_usize(stream)?;
    let h = read_usize(stream)?;
    let d = read_usize(stream)?;
    let size = Size::new(w, h, d);
    check_record_size("input", size)?;
    Ok(size)
}

fn write_convolution<W: Write>(layer: &ConvolutionLayer, stream: &mut W) -> LayerResult<()> {
    write_size(stream, layer.input_size())?;
    write_usize(stream, layer.depth())?;
    write_usize(stream, layer.stride())?;
    write_usize(stream, layer.zero_padding())?;
    write_usize(stream, layer.filter_size())?;

    for filter in layer.filters() {
        for &val in filter.weights.as_slice() {
            write_float(stream, val)?;
        }
        write_float(stream, filter.bias)?;
    }
    Ok(())
}

fn read_convolution<R: Read>(stream: &mut R) -> LayerResult<ConvolutionLayer> {
    let input_size = read_size(stream)?;
    let depth = read_usize(stream)?;
    let stride = read_usize(stream)?;
    let zero_padding = read_usize(stream)?;
    let filter_size = read_usize(stream)?;

    if depth == 0 || filter_size == 0 {
        return Err(LayerError::FormatError(format!(
            "convolution with depth {} and filter size {}",
            depth, filter_size
        )));
    }

    let padded = |extent: usize| {
        zero_padding
            .checked_mul(2)
            .and_then(|p| p.checked_add(extent))
            .ok_or_else(|| {
                LayerError::FormatError(format!("zero padding {} is too large", zero_padding))
            })
    };
    check_record_size(
        "padded input",
        Size::new(padded(input_size.w)?, padded(input_size.h)?, input_size.d),
    )?;
    let filter_dims = Size::new(filter_size, filter_size, input_size.d);
    check_record_size("filter", filter_dims)?;
    let filters = (0..depth)
        .map(|_| -> LayerResult<Filter> {
            // no preallocation, the counts come from an untrusted stream
            let weights = (0..filter_dims.elem_cnt())
                .map(|_| read_float(stream))
                .collect::<io::Result<Vec<_>>>()?;
            let bias = read_float(stream)?;
            Ok(Filter::new(DataArray::from_vec(filter_dims, weights)?, bias))
        })
        .collect::<LayerResult<Vec<_>>>()?;

    ConvolutionLayer::with_filters(input_size, stride, zero_padding, filters)
}

impl Layer {
    /// Writes the layer record to the stream.
    pub fn write<W: Write>(&self, stream: &mut W) -> LayerResult<()> {
        write_int(stream, self.layer_type().tag())?;
        match self {
            Layer::Convolutional(c) | Layer::FullConnected(c) => write_convolution(c, stream),
            Layer::MaxPool(m) => {
                write_size(stream, m.input_size())?;
                write_usize(stream, m.filter_size())
            }
        }
    }

    /// Reads one layer record from the stream.
    pub fn read<R: Read>(stream: &mut R) -> LayerResult<Layer> {
        let layer_type = LayerType::from_tag(read_int(stream)?)?;
        let layer = match layer_type {
            LayerType::Convolutional => Layer::Convolutional(read_convolution(stream)?),
            LayerType::FullConnected => {
                let layer = read_convolution(stream)?;
                if !layer.is_fully_connected() {
                    return Err(LayerError::FormatError(format!(
                        "fully connected record with filter size {}, stride {} and zero padding {} for input {}",
                        layer.filter_size(),
                        layer.stride(),
                        layer.zero_padding(),
                        layer.input_size()
                    )));
                }
                Layer::FullConnected(layer)
            }
            LayerType::MaxPool => {
                let input_size = read_size(stream)?;
                let filter_size = read_usize(stream)?;
                Layer::MaxPool(MaxPoolLayer::new(input_size, filter_size)?)
            }
        };
        debug!("Read layer: {}", layer);
        Ok(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn assert_same_layer(a: &Layer, b: &Layer) {
        assert_eq!(a.layer_type(), b.layer_type());
        assert_eq!(a.input_size(), b.input_size());
        assert_eq!(a.output_size(), b.output_size());
        match (a, b) {
            (Layer::Convolutional(x), Layer::Convolutional(y))
            | (Layer::FullConnected(x), Layer::FullConnected(y)) => {
                assert_eq!(x.stride(), y.stride());
                assert_eq!(x.zero_padding(), y.zero_padding());
                assert_eq!(x.filters(), y.filters());
            }
            (Layer::MaxPool(x), Layer::MaxPool(y)) => assert_eq!(x.filter_size(), y.filter_size()),
            _ => panic!("layer variants differ"),
        }
    }

    #[test]
    fn test_primitives_are_little_endian() {
        let mut buf = Vec::new();
        write_int(&mut buf, 258).unwrap();
        write_int(&mut buf, -1).unwrap();
        write_float(&mut buf, 1.0).unwrap();
        assert_eq!(
            buf,
            vec![2, 1, 0, 0, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x80, 0x3f]
        );

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_int(&mut cursor).unwrap(), 258);
        assert_eq!(read_int(&mut cursor).unwrap(), -1);
        assert_eq!(read_float(&mut cursor).unwrap(), 1.0);
        assert!(read_float(&mut cursor).is_err());
    }

    #[test]
    fn test_convolution_record_layout() {
        let filters = vec![
            Filter::new(DataArray::from_vec(Size::new(1, 1, 2), vec![0.5, -2.]).unwrap(), 3.),
            Filter::new(DataArray::from_vec(Size::new(1, 1, 2), vec![4., 8.]).unwrap(), -1.),
        ];
        let layer = Layer::Convolutional(
            ConvolutionLayer::with_filters(Size::new(3, 2, 2), 1, 0, filters).unwrap(),
        );
        let mut buf = Vec::new();
        layer.write(&mut buf).unwrap();

        let mut cursor = Cursor::new(&buf);
        let ints: Vec<i32> = (0..8).map(|_| read_int(&mut cursor).unwrap()).collect();
        assert_eq!(ints, vec![0, 3, 2, 2, 2, 1, 0, 1]);
        let floats: Vec<f32> = (0..6).map(|_| read_float(&mut cursor).unwrap()).collect();
        assert_eq!(floats, vec![0.5, -2., 3., 4., 8., -1.]);
        assert_eq!(buf.len(), 14 * 4);
    }

    #[test]
    fn test_layers_survive_write_and_read() {
        let layers = vec![
            Layer::from(ConvolutionLayer::new(Size::new(6, 6, 2), 3, 2, 1, 2).unwrap()),
            Layer::from(MaxPoolLayer::new(Size::new(4, 4, 3), 2).unwrap()),
            Layer::full_connected(Size::new(2, 2, 3), 4).unwrap(),
        ];
        let mut buf = Vec::new();
        for layer in &layers {
            layer.write(&mut buf).unwrap();
        }

        let mut cursor = Cursor::new(buf);
        for layer in &layers {
            assert_same_layer(layer, &Layer::read(&mut cursor).unwrap());
        }
        assert!(matches!(
            Layer::read(&mut cursor),
            Err(LayerError::IoError(_))
        ));
    }

    #[test]
    fn test_read_rejects_bad_records() {
        let mut buf = Vec::new();
        write_int(&mut buf, 7).unwrap();
        assert!(matches!(
            Layer::read(&mut Cursor::new(&buf)),
            Err(LayerError::UnknownLayerType(7))
        ));

        let mut buf = Vec::new();
        for v in &[1, 4, -4, 1, 2] {
            write_int(&mut buf, *v).unwrap();
        }
        assert!(matches!(
            Layer::read(&mut Cursor::new(&buf)),
            Err(LayerError::FormatError(_))
        ));

        // stride 3 does not fit a 4 wide input with filter size 2
        let mut buf = Vec::new();
        for v in &[0, 4, 4, 1, 1, 3, 0, 2] {
            write_int(&mut buf, *v).unwrap();
        }
        for _ in 0..5 {
            write_float(&mut buf, 0.).unwrap();
        }
        assert!(matches!(
            Layer::read(&mut Cursor::new(&buf)),
            Err(LayerError::ConfigurationError(_))
        ));

        // a convolution tagged as fully connected
        let conv = Layer::FullConnected(
            ConvolutionLayer::new(Size::new(4, 4, 1), 1, 2, 0, 2).unwrap(),
        );
        let mut buf = Vec::new();
        conv.write(&mut buf).unwrap();
        assert!(matches!(
            Layer::read(&mut Cursor::new(&buf)),
            Err(LayerError::FormatError(_))
        ));
    }

    #[test]
    fn test_read_rejects_huge_sizes() {
        let records: &[&[i32]] = &[
            // max pool over an input whose element count overflows
            &[1, i32::MAX, i32::MAX, i32::MAX, 2],
            // convolution with a filter larger than any tensor we accept
            &[0, 4, 4, 1, 1, 1, 0, i32::MAX],
            // convolution padded beyond the limit
            &[0, 4, 4, 1, 1, 1, i32::MAX, 1],
        ];
        for record in records {
            let mut buf = Vec::new();
            for v in record.iter() {
                write_int(&mut buf, *v).unwrap();
            }
            assert!(
                matches!(
                    Layer::read(&mut Cursor::new(&buf)),
                    Err(LayerError::FormatError(_))
                ),
                "record {:?}",
                record
            );
        }
    }

    #[test]
    fn test_truncated_filter_data() {
        let layer = Layer::from(ConvolutionLayer::new(Size::new(3, 3, 1), 2, 1, 0, 3).unwrap());
        let mut buf = Vec::new();
        layer.write(&mut buf).unwrap();
        buf.truncate(buf.len() - 2);

        assert!(matches!(
            Layer::read(&mut Cursor::new(&buf)),
            Err(LayerError::IoError(_))
        ));
    }
}
