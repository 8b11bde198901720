use crate::error::{CnnError, CnnResult};
use crate::shape::Dims;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense three-dimensional array of activations or weights.
///
/// Element `(x, y, d)` lives at `((sx * y) + x) * depth + d`: row-major inside
/// each depth plane, depth fastest. The buffer length always equals
/// `sx * sy * depth`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    dims: Dims,
    w: Vec<f64>,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl Volume {
    /// Allocate a volume with every element set to `fill`.
    pub fn new(sx: usize, sy: usize, depth: usize, fill: f64) -> Self {
        Self::full(Dims::new(sx, sy, depth), fill)
    }

    pub fn zeros(dims: Dims) -> Self {
        Self::full(dims, 0.0)
    }

    pub fn full(dims: Dims, fill: f64) -> Self {
        Volume {
            dims,
            w: vec![fill; dims.numel()],
        }
    }

    /// Wrap an existing buffer laid out in storage order.
    pub fn from_data(dims: Dims, data: Vec<f64>) -> CnnResult<Self> {
        if data.len() != dims.numel() {
            return Err(CnnError::ShapeMismatch {
                expected: vec![dims.numel()],
                got: vec![data.len()],
            });
        }
        Ok(Volume { dims, w: data })
    }

    /// Uniform values in `[-0.5, 0.5)` drawn from a seeded generator.
    pub fn rand(dims: Dims, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::rand_with(dims, &mut rng)
    }

    pub fn rand_with(dims: Dims, rng: &mut StdRng) -> Self {
        let w = (0..dims.numel()).map(|_| rng.gen::<f64>() - 0.5).collect();
        Volume { dims, w }
    }
}

// ─── Accessors ──────────────────────────────────────────────────────────────

impl Volume {
    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn sx(&self) -> usize {
        self.dims.sx
    }

    pub fn sy(&self) -> usize {
        self.dims.sy
    }

    pub fn depth(&self) -> usize {
        self.dims.depth
    }

    pub fn numel(&self) -> usize {
        self.w.len()
    }

    pub fn data(&self) -> &[f64] {
        &self.w
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.w
    }

    /// Flat offset of `(x, y, d)`. Coordinates are the caller's responsibility.
    #[inline]
    pub fn index(&self, x: usize, y: usize, d: usize) -> usize {
        debug_assert!(
            x < self.dims.sx && y < self.dims.sy && d < self.dims.depth,
            "({}, {}, {}) outside {}",
            x,
            y,
            d,
            self.dims
        );
        ((self.dims.sx * y) + x) * self.dims.depth + d
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, d: usize) -> f64 {
        self.w[self.index(x, y, d)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, d: usize, value: f64) {
        let i = self.index(x, y, d);
        self.w[i] = value;
    }

    /// The `depth` contiguous values stored at spatial position `(x, y)`.
    #[inline]
    pub fn fiber(&self, x: usize, y: usize) -> &[f64] {
        let start = self.index(x, y, 0);
        &self.w[start..start + self.dims.depth]
    }

    /// Overwrite this volume with the contents of `src`. Shapes must agree.
    pub fn copy_from(&mut self, src: &Volume) {
        debug_assert_eq!(self.dims, src.dims);
        self.w.copy_from_slice(&src.w);
    }

    pub fn fill(&mut self, value: f64) {
        self.w.iter_mut().for_each(|v| *v = value);
    }

    pub fn sum(&self) -> f64 {
        self.w.iter().sum()
    }
}

// ─── Display ────────────────────────────────────────────────────────────────

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dims.sx == 1 && self.dims.sy == 1 {
            write!(f, "volume([")?;
            for (i, v) in self.w.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                if i > 9 {
                    write!(f, "...")?;
                    break;
                }
                write!(f, "{:.4}", v)?;
            }
            return write!(f, "])");
        }
        write!(f, "volume(dims={}, numel={})", self.dims, self.numel())
    }
}
