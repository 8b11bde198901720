use crate::error::{CnnError, CnnResult};
use serde::{Deserialize, Serialize};

/// Extent of a volume: width, height and depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dims {
    pub sx: usize,
    pub sy: usize,
    pub depth: usize,
}

impl Dims {
    pub const fn new(sx: usize, sy: usize, depth: usize) -> Self {
        Dims { sx, sy, depth }
    }

    /// A `1×1×depth` column, the shape of biases and classifier outputs.
    pub const fn column(depth: usize) -> Self {
        Dims { sx: 1, sy: 1, depth }
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.sx * self.sy * self.depth
    }

    pub fn to_vec(&self) -> Vec<usize> {
        vec![self.sx, self.sy, self.depth]
    }

    /// Number of window positions along one axis:
    /// `floor((input + 2·pad − window) / stride + 1)`.
    pub fn out_extent(input: usize, window: usize, stride: usize, pad: usize) -> CnnResult<usize> {
        if stride == 0 {
            return Err(CnnError::InvalidGeometry("stride must be positive".to_string()));
        }
        if window == 0 {
            return Err(CnnError::InvalidGeometry("window size must be positive".to_string()));
        }
        let padded = input + 2 * pad;
        if padded < window {
            return Err(CnnError::InvalidGeometry(format!(
                "window {} does not fit padded extent {}",
                window, padded
            )));
        }
        Ok((padded - window) / stride + 1)
    }
}

impl std::fmt::Display for Dims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.sx, self.sy, self.depth)
    }
}

impl From<(usize, usize, usize)> for Dims {
    fn from((sx, sy, depth): (usize, usize, usize)) -> Self {
        Dims::new(sx, sy, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numel() {
        let d = Dims::new(32, 32, 3);
        assert_eq!(d.numel(), 3072);
        assert_eq!(Dims::column(10).numel(), 10);
        assert_eq!(d.to_vec(), vec![32, 32, 3]);
    }

    #[test]
    fn test_out_extent() {
        // same padding
        assert_eq!(Dims::out_extent(32, 5, 1, 2).unwrap(), 32);
        // halving pool
        assert_eq!(Dims::out_extent(32, 2, 2, 0).unwrap(), 16);
        // floor on uneven strides
        assert_eq!(Dims::out_extent(7, 2, 2, 0).unwrap(), 3);
        assert_eq!(Dims::out_extent(4, 3, 1, 0).unwrap(), 2);
    }

    #[test]
    fn test_out_extent_rejects_degenerate() {
        assert!(Dims::out_extent(8, 2, 0, 0).is_err());
        assert!(Dims::out_extent(8, 0, 1, 0).is_err());
        assert!(Dims::out_extent(3, 5, 1, 0).is_err());
        assert!(Dims::out_extent(3, 5, 1, 1).is_ok());
    }

    #[test]
    fn test_display() {
        assert_eq!(Dims::new(16, 8, 20).to_string(), "16x8x20");
    }
}
