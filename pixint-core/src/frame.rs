//! Detector frames.

use ndarray::Array2;

use crate::error::{Error, Result};

/// A detector image with an optional per-pixel standard deviation.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    data: Array2<f64>,
    error: Option<Array2<f64>>,
}

impl Frame {
    /// Frame without error estimates.
    #[must_use]
    pub fn new(data: Array2<f64>) -> Self {
        Self { data, error: None }
    }

    /// Frame with a parallel error array.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if `error` and `data` differ in shape.
    pub fn with_error(data: Array2<f64>, error: Array2<f64>) -> Result<Self> {
        Error::check_shape("error array", data.dim(), error.dim())?;
        Ok(Self {
            data,
            error: Some(error),
        })
    }

    /// Frame whose error is the Poisson estimate `sqrt(max(signal, 0))`.
    #[must_use]
    pub fn with_poisson_error(data: Array2<f64>) -> Self {
        let error = data.mapv(|v| v.max(0.0).sqrt());
        Self {
            data,
            error: Some(error),
        }
    }

    /// Shape as (rows, cols).
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Signal values.
    #[must_use]
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Per-pixel standard deviation, if present.
    #[must_use]
    pub fn error(&self) -> Option<&Array2<f64>> {
        self.error.as_ref()
    }

    /// Standard deviation of pixel `[row, col]`, if errors are present.
    #[inline]
    #[must_use]
    pub fn error_at(&self, row: usize, col: usize) -> Option<f64> {
        self.error.as_ref().map(|e| e[[row, col]])
    }
}

impl From<Array2<f64>> for Frame {
    fn from(data: Array2<f64>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use ndarray::array;

    #[test]
    fn test_error_shape_checked() {
        let data = Array2::zeros((2, 2));
        assert!(Frame::with_error(data.clone(), Array2::zeros((2, 3))).is_err());
        let frame = Frame::with_error(data, Array2::ones((2, 2))).unwrap();
        assert_eq!(frame.error_at(1, 1), Some(1.0));
    }

    #[test]
    fn test_poisson_error() {
        let frame = Frame::with_poisson_error(array![[4.0, -1.0]]);
        assert_eq!(frame.error_at(0, 0), Some(2.0));
        assert_eq!(frame.error_at(0, 1), Some(0.0));
    }
}
