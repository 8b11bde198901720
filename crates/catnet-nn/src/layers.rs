use std::fmt;
use std::ops::Range;

use catnet_core::{CnnError, CnnResult, Dims, ParamSink, ParamSource, Volume};
use rand::rngs::StdRng;
use rayon::prelude::*;

/// Which family a layer belongs to. Also names its parameter file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Conv,
    Relu,
    Pool,
    Fc,
    Softmax,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Conv => "conv",
            LayerKind::Relu => "relu",
            LayerKind::Pool => "pool",
            LayerKind::Fc => "fc",
            LayerKind::Softmax => "softmax",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A forward-only network layer with fixed geometry.
///
/// Geometry is settled at construction. `forward` maps `input[i]` to
/// `output[i]` for every sample it is handed; samples never share mutable
/// state, so the default implementation fans them out over rayon.
pub trait Layer: Send + Sync {
    fn kind(&self) -> LayerKind;

    fn in_dims(&self) -> Dims;

    fn out_dims(&self) -> Dims;

    /// Transform one sample. `output` must already have `out_dims()`.
    fn forward_sample(&self, input: &Volume, output: &mut Volume);

    /// Transform a run of samples, `input[i]` into `output[i]`.
    fn forward(&self, input: &[Volume], output: &mut [Volume]) {
        debug_assert_eq!(input.len(), output.len());
        input
            .par_iter()
            .zip(output.par_iter_mut())
            .for_each(|(v, a)| self.forward_sample(v, a));
    }

    /// Whether the layer carries learned weights.
    fn has_params(&self) -> bool {
        false
    }

    fn load_params(&mut self, _src: &mut dyn ParamSource) -> CnnResult<()> {
        Ok(())
    }

    fn save_params(&self, _sink: &mut dyn ParamSink) -> CnnResult<()> {
        Ok(())
    }

    /// Replace learned weights with seeded synthetic values.
    fn init_random(&mut self, _rng: &mut StdRng) {}
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Offsets `k` in `0..window` for which `origin + k` falls inside `0..extent`.
pub(crate) fn taps(origin: isize, window: usize, extent: usize) -> Range<usize> {
    let lo = (-origin).max(0) as usize;
    let hi = (extent as isize - origin).clamp(0, window as isize) as usize;
    lo.min(hi)..hi
}

/// Scale uniform `[-0.5, 0.5)` noise into He-style `[-k, k)`.
pub(crate) fn he_scaled(dims: Dims, fan_in: usize, rng: &mut StdRng) -> Volume {
    let k = (2.0 / fan_in.max(1) as f64).sqrt();
    let mut v = Volume::rand_with(dims, rng);
    v.data_mut().iter_mut().for_each(|x| *x *= 2.0 * k);
    v
}

// ─── Rectify ────────────────────────────────────────────────────────────────

/// ReLU: `max(x, 0)` element-wise, shape preserving.
pub struct RectifyLayer {
    dims: Dims,
}

impl RectifyLayer {
    pub fn new(dims: Dims) -> Self {
        RectifyLayer { dims }
    }
}

impl Layer for RectifyLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Relu
    }

    fn in_dims(&self) -> Dims {
        self.dims
    }

    fn out_dims(&self) -> Dims {
        self.dims
    }

    fn forward_sample(&self, input: &Volume, output: &mut Volume) {
        for (o, &x) in output.data_mut().iter_mut().zip(input.data()) {
            *o = if x < 0.0 { 0.0 } else { x };
        }
    }
}

// ─── Fully connected ────────────────────────────────────────────────────────

/// Fully connected layer over the flattened input: `out[i] = w_i · x + b_i`.
pub struct FullyConnectedLayer {
    in_dims: Dims,
    out_dims: Dims,
    pub num_inputs: usize,
    /// One `1×1×num_inputs` weight vector per neuron.
    pub filters: Vec<Volume>,
    pub biases: Volume,
}

impl FullyConnectedLayer {
    pub fn new(in_dims: Dims, neurons: usize) -> CnnResult<Self> {
        if neurons == 0 {
            return Err(CnnError::InvalidGeometry(
                "fully connected layer needs at least one neuron".to_string(),
            ));
        }
        let num_inputs = in_dims.numel();
        Ok(FullyConnectedLayer {
            in_dims,
            out_dims: Dims::column(neurons),
            num_inputs,
            filters: (0..neurons)
                .map(|_| Volume::zeros(Dims::column(num_inputs)))
                .collect(),
            biases: Volume::zeros(Dims::column(neurons)),
        })
    }

    pub fn neurons(&self) -> usize {
        self.out_dims.depth
    }
}

impl Layer for FullyConnectedLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Fc
    }

    fn in_dims(&self) -> Dims {
        self.in_dims
    }

    fn out_dims(&self) -> Dims {
        self.out_dims
    }

    fn forward_sample(&self, input: &Volume, output: &mut Volume) {
        let x = input.data();
        let out = output.data_mut();
        for (i, filter) in self.filters.iter().enumerate() {
            out[i] = dot(x, filter.data()) + self.biases.data()[i];
        }
    }

    fn has_params(&self) -> bool {
        true
    }

    /// Header `num_inputs out_depth`, then weights neuron-major, then biases.
    fn load_params(&mut self, src: &mut dyn ParamSource) -> CnnResult<()> {
        src.expect_dim("num_inputs", self.num_inputs)?;
        src.expect_dim("out_depth", self.neurons())?;
        for filter in self.filters.iter_mut() {
            src.read_into(filter.data_mut())?;
        }
        src.read_into(self.biases.data_mut())
    }

    fn save_params(&self, sink: &mut dyn ParamSink) -> CnnResult<()> {
        sink.put_header(&[self.num_inputs, self.neurons()])?;
        for filter in &self.filters {
            sink.put_values(filter.data())?;
        }
        sink.put_values(self.biases.data())
    }

    fn init_random(&mut self, rng: &mut StdRng) {
        for filter in self.filters.iter_mut() {
            *filter = he_scaled(Dims::column(self.num_inputs), self.num_inputs, rng);
        }
        self.biases.fill(0.0);
    }
}

// ─── Softmax ────────────────────────────────────────────────────────────────

/// Softmax over every element of the input, producing a `1×1×n` distribution.
pub struct SoftmaxLayer {
    in_dims: Dims,
    out_dims: Dims,
}

impl SoftmaxLayer {
    pub fn new(in_dims: Dims) -> CnnResult<Self> {
        if in_dims.numel() == 0 {
            return Err(CnnError::InvalidGeometry(
                "softmax over an empty volume".to_string(),
            ));
        }
        Ok(SoftmaxLayer {
            in_dims,
            out_dims: Dims::column(in_dims.numel()),
        })
    }
}

impl Layer for SoftmaxLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Softmax
    }

    fn in_dims(&self) -> Dims {
        self.in_dims
    }

    fn out_dims(&self) -> Dims {
        self.out_dims
    }

    fn forward_sample(&self, input: &Volume, output: &mut Volume) {
        let x = input.data();
        let amax = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        // shift by the max so the largest exponent is exp(0)
        let out = output.data_mut();
        let mut esum = 0.0;
        for (o, &v) in out.iter_mut().zip(x) {
            let e = (v - amax).exp();
            esum += e;
            *o = e;
        }
        for o in out.iter_mut() {
            *o /= esum;
        }
    }
}
