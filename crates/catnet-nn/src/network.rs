use std::ops::RangeInclusive;

use catnet_core::{CnnError, CnnResult, Dims, Volume};
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::batch::Batch;
use crate::conv::{ConvLayer, PoolLayer};
use crate::layers::{FullyConnectedLayer, Layer, RectifyLayer, SoftmaxLayer};

/// Input geometry of the CIFAR-10 network: 32×32 RGB.
pub const CIFAR10_INPUT: Dims = Dims::new(32, 32, 3);

/// Serializable description of one layer, sized against its input at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Conv {
        size: usize,
        filters: usize,
        stride: usize,
        pad: usize,
    },
    Relu,
    Pool {
        size: usize,
        stride: usize,
    },
    Fc {
        neurons: usize,
    },
    Softmax,
}

impl LayerSpec {
    pub fn build(&self, input: Dims) -> CnnResult<Box<dyn Layer>> {
        Ok(match *self {
            LayerSpec::Conv {
                size,
                filters,
                stride,
                pad,
            } => Box::new(ConvLayer::new(input, size, filters, stride, pad)?),
            LayerSpec::Relu => Box::new(RectifyLayer::new(input)),
            LayerSpec::Pool { size, stride } => Box::new(PoolLayer::new(input, size, stride)?),
            LayerSpec::Fc { neurons } => Box::new(FullyConnectedLayer::new(input, neurons)?),
            LayerSpec::Softmax => Box::new(SoftmaxLayer::new(input)?),
        })
    }

    /// conv→relu→pool three times (16, 20, 20 filters), then fc(10) and softmax.
    pub fn cifar10() -> Vec<LayerSpec> {
        let mut specs = Vec::with_capacity(11);
        for filters in [16, 20, 20] {
            specs.push(LayerSpec::Conv {
                size: 5,
                filters,
                stride: 1,
                pad: 2,
            });
            specs.push(LayerSpec::Relu);
            specs.push(LayerSpec::Pool { size: 2, stride: 2 });
        }
        specs.push(LayerSpec::Fc { neurons: 10 });
        specs.push(LayerSpec::Softmax);
        specs
    }
}

/// Ordered chain of layers plus the dims of every boundary between them.
///
/// `boundaries()[i]` is the input of layer `i`; the last entry is the network output.
pub struct Network {
    layers: Vec<Box<dyn Layer>>,
    boundaries: Vec<Dims>,
}

impl Network {
    /// An empty chain accepting `input`. Layers are appended with [`Network::add`].
    pub fn with_input(input: Dims) -> Self {
        Network {
            layers: Vec::new(),
            boundaries: vec![input],
        }
    }

    /// Build a network by sizing each spec against the previous layer's output.
    pub fn new(input: Dims, specs: &[LayerSpec]) -> CnnResult<Self> {
        if specs.is_empty() {
            return Err(CnnError::Config("network has no layers".to_string()));
        }
        let mut net = Network::with_input(input);
        for spec in specs {
            let layer = spec.build(net.output_dims())?;
            net.add(layer)?;
        }
        debug!(
            "built network of {} layers: {} -> {}",
            net.len(),
            net.input_dims(),
            net.output_dims()
        );
        Ok(net)
    }

    /// The fixed CIFAR-10 topology with zeroed weights.
    pub fn cifar10() -> CnnResult<Self> {
        Self::new(CIFAR10_INPUT, &LayerSpec::cifar10())
    }

    /// Append a layer. Its input must match the current output.
    pub fn add(&mut self, layer: Box<dyn Layer>) -> CnnResult<()> {
        let current = self.output_dims();
        if layer.in_dims() != current {
            return Err(CnnError::ShapeMismatch {
                expected: current.to_vec(),
                got: layer.in_dims().to_vec(),
            });
        }
        self.boundaries.push(layer.out_dims());
        self.layers.push(layer);
        Ok(())
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Box<dyn Layer>] {
        &mut self.layers
    }

    pub fn boundaries(&self) -> &[Dims] {
        &self.boundaries
    }

    pub fn input_dims(&self) -> Dims {
        self.boundaries[0]
    }

    pub fn output_dims(&self) -> Dims {
        self.boundaries[self.boundaries.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Seeded synthetic weights for every layer that has any.
    pub fn init_random(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        for layer in self.layers.iter_mut() {
            layer.init_random(&mut rng);
        }
    }

    /// Run samples `range` (inclusive) of `batch` through every layer.
    pub fn forward(&self, batch: &mut Batch, range: RangeInclusive<usize>) {
        batch.run(self, range);
    }

    /// Classify a single image, returning the output volume.
    pub fn predict(&self, image: &Volume) -> CnnResult<Volume> {
        if image.dims() != self.input_dims() {
            return Err(CnnError::ShapeMismatch {
                expected: self.input_dims().to_vec(),
                got: image.dims().to_vec(),
            });
        }
        let mut batch = Batch::new(self, 1);
        batch.input_mut(0).copy_from(image);
        batch.run(self, 0..=0);
        Ok(batch.output(0).clone())
    }
}
