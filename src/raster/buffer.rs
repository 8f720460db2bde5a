use std::ops::{Index, IndexMut};

use crate::errors::{GdalError, Result};
use crate::raster::GdalType;

#[cfg(feature = "ndarray")]
use ndarray::Array2;

/// A 2-D array backed by it's `size` (cols, rows) and a row-major `Vec<T>` and it's dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer<T> {
    pub size: (usize, usize),
    pub data: Vec<T>,
}

impl<T: GdalType> Buffer<T> {
    /// Construct a new buffer from `size` (`(cols, rows)`) and `Vec<T>`.
    ///
    /// # Panic
    /// Will panic if `size.0 * size.1 != data.len()`.
    pub fn new(size: (usize, usize), data: Vec<T>) -> Self {
        assert_eq!(
            size.0 * size.1,
            data.len(),
            "size {:?} does not match length {}",
            size,
            data.len()
        );
        Buffer { size, data }
    }

    /// Like [`Buffer::new`], but reports a size mismatch as an error.
    pub fn try_new(size: (usize, usize), data: Vec<T>) -> Result<Self> {
        if size.0 * size.1 != data.len() {
            return Err(GdalError::BadArgument(format!(
                "size {size:?} does not match length {}",
                data.len()
            )));
        }
        Ok(Buffer { size, data })
    }

    /// A buffer of `size` filled with `T::default()`.
    pub fn zeroed(size: (usize, usize)) -> Self {
        Buffer {
            size,
            data: vec![T::default(); size.0 * size.1],
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `(cols, rows)`
    pub fn shape(&self) -> (usize, usize) {
        self.size
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_shape_and_vec(self) -> ((usize, usize), Vec<T>) {
        (self.size, self.data)
    }

    #[cfg(feature = "ndarray")]
    /// Convert `self` into an [`ndarray::Array2`].
    pub fn to_array(self) -> Result<Array2<T>> {
        // Array2 shape is (rows, cols) and Buffer shape is (cols in x-axis, rows in y-axis)
        Array2::from_shape_vec((self.size.1, self.size.0), self.data)
            .map_err(|e| GdalError::BadArgument(e.to_string()))
    }
}

/// Indexed by `(x, y)`.
impl<T> Index<(usize, usize)> for Buffer<T> {
    type Output = T;

    fn index(&self, (x, y): (usize, usize)) -> &T {
        &self.data[y * self.size.0 + x]
    }
}

impl<T> IndexMut<(usize, usize)> for Buffer<T> {
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        &mut self.data[y * self.size.0 + x]
    }
}

pub type ByteBuffer = Buffer<u8>;

#[cfg(feature = "ndarray")]
impl<T: GdalType> TryFrom<Buffer<T>> for Array2<T> {
    type Error = GdalError;

    fn try_from(value: Buffer<T>) -> Result<Self> {
        value.to_array()
    }
}

#[cfg(feature = "ndarray")]
impl<T: GdalType> From<Array2<T>> for Buffer<T> {
    fn from(value: Array2<T>) -> Self {
        // Array2 shape is (rows, cols) and Buffer shape is (cols in x-axis, rows in y-axis)
        let shape = value.shape();
        let (rows, cols) = (shape[0], shape[1]);
        let data = value
            .as_standard_layout()
            .iter()
            .copied()
            .collect::<Vec<T>>();
        Buffer::new((cols, rows), data)
    }
}
