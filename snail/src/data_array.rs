//! Three dimensional tensors used as inputs, outputs and filters of all layers.
//!
//! A [`DataArray`] with size (w, h, d) stores its values as `d` planes of `h` rows
//! of `w` columns, so coordinate (x, y, z) lives at linear index `z*w*h + y*w + x`.
//! The serialized filter format depends on this layout.
use std::fmt;

use ndarray::*;
use rand::Rng;
use serde_derive::{Deserialize, Serialize};

use crate::{
    errors::{LayerError, LayerResult},
    ImagePrecision,
};

/// Width, height and depth of a tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub w: usize,
    pub h: usize,
    pub d: usize,
}

impl Size {
    pub fn new(w: usize, h: usize, d: usize) -> Self {
        Self { w, h, d }
    }

    pub fn elem_cnt(&self) -> usize {
        self.w * self.h * self.d
    }

    /// Element count, or `None` if it does not fit into `usize`.
    pub fn checked_elem_cnt(&self) -> Option<usize> {
        self.w.checked_mul(self.h)?.checked_mul(self.d)
    }

    /// Returns true if (x, y, z) addresses an element of a tensor of this size.
    pub fn check(&self, x: usize, y: usize, z: usize) -> bool {
        x < self.w && y < self.h && z < self.d
    }

    /// The ndarray shape (depth, height, width) belonging to this size.
    fn shape(&self) -> (usize, usize, usize) {
        (self.d, self.h, self.w)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.w, self.h, self.d)
    }
}

/// Owned 3-D tensor of floats.
///
/// Cloning produces an independent copy, two tensors never share storage.
#[derive(Debug, Clone, PartialEq)]
pub struct DataArray {
    size: Size,
    data: Array3<ImagePrecision>,
}

impl Default for DataArray {
    /// The empty tensor of size 0x0x0.
    fn default() -> Self {
        Self::new(Size::default())
    }
}

impl DataArray {
    /// Allocates a zero filled tensor of the given size.
    pub fn new(size: Size) -> Self {
        Self {
            size,
            data: Array::zeros(size.shape()),
        }
    }

    pub fn with_dims(w: usize, h: usize, d: usize) -> Self {
        Self::new(Size::new(w, h, d))
    }

    /// Builds a tensor from values given in linear layout (x fastest, then y, then z).
    pub fn from_vec(size: Size, values: Vec<ImagePrecision>) -> LayerResult<Self> {
        let data = Array::from_shape_vec(size.shape(), values)?;
        Ok(Self { size, data })
    }

    /// Wraps an array in (depth, height, width) layout.
    pub fn from_array(data: Array3<ImagePrecision>) -> Self {
        let (d, h, w) = data.dim();
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Self {
            size: Size::new(w, h, d),
            data,
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size.elem_cnt() == 0
    }

    /// View of the values in (depth, height, width) layout.
    pub fn as_array(&self) -> ArrayView3<'_, ImagePrecision> {
        self.data.view()
    }

    pub fn as_array_mut(&mut self) -> ArrayViewMut3<'_, ImagePrecision> {
        self.data.view_mut()
    }

    /// View of the square `edge` x `edge` spatial window with top left corner (x, y),
    /// spanning all depth planes.
    pub fn window(&self, x: usize, y: usize, edge: usize) -> ArrayView3<'_, ImagePrecision> {
        self.data.slice(s![.., y..y + edge, x..x + edge])
    }

    pub fn window_mut(
        &mut self,
        x: usize,
        y: usize,
        edge: usize,
    ) -> ArrayViewMut3<'_, ImagePrecision> {
        self.data.slice_mut(s![.., y..y + edge, x..x + edge])
    }

    pub fn into_array(self) -> Array3<ImagePrecision> {
        self.data
    }

    /// All values in linear layout.
    pub fn as_slice(&self) -> &[ImagePrecision] {
        self.data
            .as_slice()
            .expect("tensor storage is always in standard layout")
    }

    pub fn as_slice_mut(&mut self) -> &mut [ImagePrecision] {
        self.data
            .as_slice_mut()
            .expect("tensor storage is always in standard layout")
    }

    /// Value at (x, y, z). Coordinates are only validated in debug builds,
    /// use [`DataArray::try_at`] for a checked access.
    #[inline]
    pub fn at(&self, x: usize, y: usize, z: usize) -> ImagePrecision {
        debug_assert!(
            self.size.check(x, y, z),
            "({}, {}, {}) out of bounds for {}",
            x,
            y,
            z,
            self.size
        );
        self.data[[z, y, x]]
    }

    #[inline]
    pub fn at_mut(&mut self, x: usize, y: usize, z: usize) -> &mut ImagePrecision {
        debug_assert!(
            self.size.check(x, y, z),
            "({}, {}, {}) out of bounds for {}",
            x,
            y,
            z,
            self.size
        );
        &mut self.data[[z, y, x]]
    }

    pub fn try_at(&self, x: usize, y: usize, z: usize) -> LayerResult<ImagePrecision> {
        self.data
            .get([z, y, x])
            .copied()
            .ok_or(LayerError::IndexOutOfBounds {
                x,
                y,
                z,
                size: self.size,
            })
    }

    /// Sets every element to zero.
    pub fn clear(&mut self) {
        self.data.fill(0.);
    }

    /// Fills the tensor with independent uniform samples from [min_val, max_val).
    pub fn fill_rnd(&mut self, min_val: ImagePrecision, max_val: ImagePrecision) {
        self.fill_rnd_with(&mut rand::thread_rng(), min_val, max_val);
    }

    /// Fills the tensor with independent uniform samples from [0, 1).
    pub fn fill_rnd_unit(&mut self) {
        self.fill_rnd(0., 1.);
    }

    /// Same as [`DataArray::fill_rnd`], drawing from the given generator.
    /// An empty range fills the tensor with `min_val`.
    pub fn fill_rnd_with<R: Rng>(
        &mut self,
        rng: &mut R,
        min_val: ImagePrecision,
        max_val: ImagePrecision,
    ) {
        if min_val < max_val {
            self.data
                .iter_mut()
                .for_each(|v| *v = rng.gen_range(min_val..max_val));
        } else {
            self.data.fill(min_val);
        }
    }

    /// Copies `other` into this tensor. Storage is only reallocated when the sizes differ.
    pub fn copy_from(&mut self, other: &DataArray) {
        if self.size == other.size {
            self.data.assign(&other.data);
        } else {
            *self = other.clone();
        }
    }

    /// Makes sure `self` has the given size. Contents are unspecified afterwards.
    pub(crate) fn ensure_size(&mut self, size: Size) {
        if self.size != size {
            *self = DataArray::new(size);
        }
    }

    /// Writes a copy of this tensor surrounded by a zero border of `width` cells
    /// on every spatial side into `output`, resizing it if needed.
    pub fn add_zeros(&self, width: usize, output: &mut DataArray) {
        let padded = Size::new(
            self.size.w + 2 * width,
            self.size.h + 2 * width,
            self.size.d,
        );
        output.ensure_size(padded);
        output.clear();

        output
            .data
            .slice_mut(s![
                ..,
                width..width + self.size.h,
                width..width + self.size.w
            ])
            .assign(&self.data);
    }

    /// Inverse of [`DataArray::add_zeros`]: writes the interior of this tensor without
    /// its `width` wide border into `output`, resizing it if needed.
    ///
    /// Fails with a `GeometryError` (leaving `output` untouched) if nothing would remain.
    pub fn remove_frame(&self, width: usize, output: &mut DataArray) -> LayerResult<()> {
        if self.size.w <= 2 * width || self.size.h <= 2 * width {
            return Err(LayerError::GeometryError {
                size: self.size,
                width,
            });
        }
        let cropped = Size::new(
            self.size.w - 2 * width,
            self.size.h - 2 * width,
            self.size.d,
        );
        output.ensure_size(cropped);

        output.data.assign(&self.data.slice(s![
            ..,
            width..width + cropped.h,
            width..width + cropped.w
        ]));
        Ok(())
    }
}
