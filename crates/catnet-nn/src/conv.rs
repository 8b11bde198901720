use catnet_core::{CnnError, CnnResult, Dims, ParamSink, ParamSource, Volume};
use rand::rngs::StdRng;
use rayon::prelude::*;

use super::layers::{dot, he_scaled, taps, Layer, LayerKind};

/// 2D convolution with square filters and implicit zero padding.
///
/// Input:  `in_sx × in_sy × in_depth`
/// Output: `out_sx × out_sy × filters`
/// where `out = floor((in + 2·pad − size) / stride + 1)`
pub struct ConvLayer {
    pub size: usize,
    pub stride: usize,
    pub pad: usize,
    in_dims: Dims,
    out_dims: Dims,
    /// One `size × size × in_depth` filter per output channel.
    pub filters: Vec<Volume>,
    /// `1 × 1 × filters`
    pub biases: Volume,
}

impl ConvLayer {
    pub fn new(
        in_dims: Dims,
        size: usize,
        filters: usize,
        stride: usize,
        pad: usize,
    ) -> CnnResult<Self> {
        if filters == 0 {
            return Err(CnnError::InvalidGeometry(
                "convolution needs at least one filter".to_string(),
            ));
        }
        let out_sx = Dims::out_extent(in_dims.sx, size, stride, pad)?;
        let out_sy = Dims::out_extent(in_dims.sy, size, stride, pad)?;
        let filter_dims = Dims::new(size, size, in_dims.depth);

        Ok(ConvLayer {
            size,
            stride,
            pad,
            in_dims,
            out_dims: Dims::new(out_sx, out_sy, filters),
            filters: (0..filters).map(|_| Volume::zeros(filter_dims)).collect(),
            biases: Volume::zeros(Dims::column(filters)),
        })
    }

    /// Fill one output row (`ay`) of every channel.
    ///
    /// `row` is the `out_sx * out_depth` slice of the output starting at `(0, ay, 0)`.
    fn forward_row(&self, input: &Volume, ay: usize, row: &mut [f64]) {
        let out_depth = self.out_dims.depth;
        let y0 = (ay * self.stride) as isize - self.pad as isize;
        let fys = taps(y0, self.size, input.sy());

        for (ax, cell) in row.chunks_exact_mut(out_depth).enumerate() {
            let x0 = (ax * self.stride) as isize - self.pad as isize;
            let fxs = taps(x0, self.size, input.sx());

            for (d, (filter, slot)) in self.filters.iter().zip(cell.iter_mut()).enumerate() {
                let mut a = 0.0;
                for fy in fys.clone() {
                    let oy = (y0 + fy as isize) as usize;
                    for fx in fxs.clone() {
                        let ox = (x0 + fx as isize) as usize;
                        a += dot(filter.fiber(fx, fy), input.fiber(ox, oy));
                    }
                }
                *slot = a + self.biases.data()[d];
            }
        }
    }
}

impl Layer for ConvLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Conv
    }

    fn in_dims(&self) -> Dims {
        self.in_dims
    }

    fn out_dims(&self) -> Dims {
        self.out_dims
    }

    /// Output rows are independent, so they are split across workers.
    fn forward_sample(&self, input: &Volume, output: &mut Volume) {
        let row_len = self.out_dims.sx * self.out_dims.depth;
        output
            .data_mut()
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(ay, row)| self.forward_row(input, ay, row));
    }

    fn has_params(&self) -> bool {
        true
    }

    /// Header `sx sy depth filters`, then weights in (filter, x, y, z) order,
    /// then one bias per filter.
    fn load_params(&mut self, src: &mut dyn ParamSource) -> CnnResult<()> {
        src.expect_dim("sx", self.size)?;
        src.expect_dim("sy", self.size)?;
        src.expect_dim("depth", self.in_dims.depth)?;
        src.expect_dim("filters", self.out_dims.depth)?;

        for filter in self.filters.iter_mut() {
            for x in 0..self.size {
                for y in 0..self.size {
                    for z in 0..self.in_dims.depth {
                        filter.set(x, y, z, src.next_value()?);
                    }
                }
            }
        }
        src.read_into(self.biases.data_mut())
    }

    fn save_params(&self, sink: &mut dyn ParamSink) -> CnnResult<()> {
        sink.put_header(&[self.size, self.size, self.in_dims.depth, self.out_dims.depth])?;
        let mut values = Vec::with_capacity(self.size * self.size * self.in_dims.depth);
        for filter in &self.filters {
            values.clear();
            for x in 0..self.size {
                for y in 0..self.size {
                    values.extend_from_slice(filter.fiber(x, y));
                }
            }
            sink.put_values(&values)?;
        }
        sink.put_values(self.biases.data())
    }

    fn init_random(&mut self, rng: &mut StdRng) {
        let filter_dims = Dims::new(self.size, self.size, self.in_dims.depth);
        for filter in self.filters.iter_mut() {
            *filter = he_scaled(filter_dims, filter_dims.numel(), rng);
        }
        self.biases.fill(0.0);
    }
}

/// Max pooling over square windows, no padding. Depth is preserved.
pub struct PoolLayer {
    pub size: usize,
    pub stride: usize,
    in_dims: Dims,
    out_dims: Dims,
}

impl PoolLayer {
    /// Rejects geometry where a window could miss the input entirely, so
    /// every output has at least one candidate.
    pub fn new(in_dims: Dims, size: usize, stride: usize) -> CnnResult<Self> {
        let out_sx = Dims::out_extent(in_dims.sx, size, stride, 0)?;
        let out_sy = Dims::out_extent(in_dims.sy, size, stride, 0)?;
        Ok(PoolLayer {
            size,
            stride,
            in_dims,
            out_dims: Dims::new(out_sx, out_sy, in_dims.depth),
        })
    }
}

impl Layer for PoolLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Pool
    }

    fn in_dims(&self) -> Dims {
        self.in_dims
    }

    fn out_dims(&self) -> Dims {
        self.out_dims
    }

    fn forward_sample(&self, input: &Volume, output: &mut Volume) {
        for ay in 0..self.out_dims.sy {
            let y0 = (ay * self.stride) as isize;
            let fys = taps(y0, self.size, input.sy());
            for ax in 0..self.out_dims.sx {
                let x0 = (ax * self.stride) as isize;
                let fxs = taps(x0, self.size, input.sx());
                debug_assert!(!fys.is_empty() && !fxs.is_empty());

                for d in 0..self.out_dims.depth {
                    let mut a = f64::NEG_INFINITY;
                    for fy in fys.clone() {
                        for fx in fxs.clone() {
                            let v = input.get(x0 as usize + fx, y0 as usize + fy, d);
                            if v > a {
                                a = v;
                            }
                        }
                    }
                    output.set(ax, ay, d, a);
                }
            }
        }
    }
}
