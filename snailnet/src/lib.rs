//! Helpers to feed npy arrays into snail networks.
use std::path::Path;

use ndarray::{Array3, Array4, Axis};
use ndarray_npy::{read_npy, ReadNpyError};
use snail::data_array::DataArray;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("{inputs} input samples but {targets} target samples")]
    SampleCountMismatch { inputs: usize, targets: usize },
    #[error("The dataset holds no samples.")]
    Empty,
    #[error("Could not read npy file: {0}")]
    NpyError(#[from] ReadNpyError),
}

pub type DatasetResult<T> = Result<T, DatasetError>;

/// Reads a single `(depth, height, width)` tensor.
pub fn read_tensor<P: AsRef<Path>>(path: P) -> DatasetResult<DataArray> {
    let arr: Array3<f32> = read_npy(path)?;
    Ok(DataArray::from_array(arr))
}

/// Splits a `(samples, depth, height, width)` stack into one tensor per sample.
pub fn samples_from_stack(stack: &Array4<f32>) -> Vec<DataArray> {
    stack
        .axis_iter(Axis(0))
        .map(|sample| DataArray::from_array(sample.to_owned()))
        .collect()
}

/// Reads a sample stack from an npy file.
pub fn read_samples<P: AsRef<Path>>(path: P) -> DatasetResult<Vec<DataArray>> {
    let stack: Array4<f32> = read_npy(path)?;
    Ok(samples_from_stack(&stack))
}

/// Pairs every input sample with its target.
pub fn training_pairs(
    inputs: Vec<DataArray>,
    targets: Vec<DataArray>,
) -> DatasetResult<Vec<(DataArray, DataArray)>> {
    if inputs.len() != targets.len() {
        return Err(DatasetError::SampleCountMismatch {
            inputs: inputs.len(),
            targets: targets.len(),
        });
    }
    if inputs.is_empty() {
        return Err(DatasetError::Empty);
    }
    Ok(inputs.into_iter().zip(targets).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;
    use ndarray_npy::write_npy;
    use snail::data_array::Size;
    use tempfile::tempdir;

    fn stack(n: usize) -> Array4<f32> {
        Array::from_shape_vec(
            (n, 2, 1, 3),
            (0..n * 6).map(|v| v as f32).collect::<Vec<_>>(),
        )
        .unwrap()
    }

    #[test]
    fn test_samples_from_stack() {
        let samples = samples_from_stack(&stack(2));
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].size(), Size::new(3, 1, 2));
        assert_eq!(samples[0].at(2, 0, 1), 5.);
        assert_eq!(samples[1].at(0, 0, 0), 6.);
        assert_eq!(samples[1].at(2, 0, 1), 11.);
    }

    #[test]
    fn test_training_pairs() {
        let pairs = training_pairs(samples_from_stack(&stack(3)), samples_from_stack(&stack(3)))
            .unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[2].0, pairs[2].1);

        assert!(matches!(
            training_pairs(samples_from_stack(&stack(3)), samples_from_stack(&stack(2))),
            Err(DatasetError::SampleCountMismatch {
                inputs: 3,
                targets: 2
            })
        ));
        assert!(matches!(
            training_pairs(vec![], vec![]),
            Err(DatasetError::Empty)
        ));
    }

    #[test]
    fn test_read_npy_files() {
        let dir = tempdir().unwrap();
        let stack_path = dir.path().join("stack.npy");
        write_npy(&stack_path, &stack(2)).unwrap();
        let samples = read_samples(&stack_path).unwrap();
        assert_eq!(samples, samples_from_stack(&stack(2)));

        let tensor_path = dir.path().join("tensor.npy");
        let tensor = Array::from_shape_vec((1, 2, 2), vec![1f32, 2., 3., 4.]).unwrap();
        write_npy(&tensor_path, &tensor).unwrap();
        assert_eq!(read_tensor(&tensor_path).unwrap().at(1, 1, 0), 4.);

        // a sample stack is not a single tensor
        assert!(matches!(
            read_tensor(&stack_path),
            Err(DatasetError::NpyError(_))
        ));
        dir.close().unwrap();
    }
}
