//! Single raster band with a cached no-data mask

use std::sync::OnceLock;

use ndarray::{Array2, ArrayView2, ArrayViewMut2};

use crate::error::{Error, Result};
use crate::raster::{DataType, RasterElement};

/// A 2D grid of one typed value with an optional no-data sentinel.
///
/// The no-data mask is derived on first use and dropped whenever cell values
/// or the sentinel change.
#[derive(Debug, Clone)]
pub struct Band<T: RasterElement> {
    /// Cell values in row-major order (row, col)
    data: Array2<T>,
    nodata: Option<T>,
    data_type: DataType,
    mask: OnceLock<Array2<bool>>,
}

impl<T: RasterElement> Band<T> {
    /// Create a new band filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new band filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a band from row-major values
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Create a band from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            nodata: None,
            data_type: T::DATA_TYPE,
            mask: OnceLock::new(),
        }
    }

    /// Builder-style no-data setter
    pub fn with_nodata(mut self, nodata: Option<T>) -> Self {
        self.set_nodata(nodata);
        self
    }

    /// Tag the band with a narrower storage type, e.g. [`DataType::Bit1`] for `u8` masks.
    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        self.mask.take();
        Ok(())
    }

    /// Overwrite every cell
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
        self.mask.take();
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Mutable view of the cells; invalidates the cached mask
    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, T> {
        self.mask.take();
        self.data.view_mut()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Mutable access to the cells; invalidates the cached mask
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        self.mask.take();
        &mut self.data
    }

    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // No-data

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data sentinel; invalidates the cached mask
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
        self.mask.take();
    }

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Check if cell at (row, col) contains no-data
    pub fn is_nodata_at(&self, row: usize, col: usize) -> Result<bool> {
        let value = self.get(row, col)?;
        Ok(self.is_nodata(value))
    }

    /// Binary grid marking no-data cells with `true`
    pub fn mask(&self) -> &Array2<bool> {
        self.mask
            .get_or_init(|| self.data.mapv(|v| v.is_nodata(self.nodata)))
    }

    /// Iterator over `(row, col, value)` of every valid cell
    pub fn valid_cells(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        let mask = self.mask();
        self.data
            .indexed_iter()
            .filter(move |(idx, _)| !mask[*idx])
            .map(|((row, col), v)| (row, col, *v))
    }

    /// Distinct valid values in ascending order
    pub fn unique_values(&self) -> Vec<T> {
        let mut values: Vec<T> = self.valid_cells().map(|(_, _, v)| v).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup();
        values
    }

    // Statistics

    /// Calculate basic statistics (min, max, mean, count of valid cells)
    pub fn statistics(&self) -> BandStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for (_, _, value) in self.valid_cells() {
            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }
            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        let mean = if count > 0 {
            Some(sum / count as f64)
        } else {
            None
        };

        BandStatistics {
            min,
            max,
            mean,
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a band
#[derive(Debug, Clone)]
pub struct BandStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}
