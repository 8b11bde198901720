use std::ops::RangeInclusive;

use catnet_core::{Dims, Volume};
use log::debug;

use crate::network::Network;

/// Working storage for running samples through a [`Network`].
///
/// `boundary(b)[n]` is the activation of sample `n` at boundary `b`: boundary 0
/// holds the input images and the last one the class probabilities. Every
/// volume is owned by the batch and freed with it.
pub struct Batch {
    slots: Vec<Vec<Volume>>,
    dims: Vec<Dims>,
    len: usize,
}

impl Batch {
    /// Allocate zeroed volumes for `samples` samples at every boundary of `net`.
    pub fn new(net: &Network, samples: usize) -> Self {
        debug!(
            "allocating batch of {} samples over {} boundaries",
            samples,
            net.boundaries().len()
        );
        let slots = net
            .boundaries()
            .iter()
            .map(|&dims| vec![Volume::zeros(dims); samples])
            .collect();
        Batch {
            slots,
            dims: net.boundaries().to_vec(),
            len: samples,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Dims of every boundary, in order.
    pub fn boundary_dims(&self) -> &[Dims] {
        &self.dims
    }

    /// All samples at boundary `b`.
    pub fn boundary(&self, b: usize) -> &[Volume] {
        &self.slots[b]
    }

    /// Input slot of `sample`, to be filled before [`Batch::run`].
    pub fn input_mut(&mut self, sample: usize) -> &mut Volume {
        &mut self.slots[0][sample]
    }

    /// Final-layer output of `sample`.
    pub fn output(&self, sample: usize) -> &Volume {
        &self.slots[self.slots.len() - 1][sample]
    }

    /// Push samples `range` (inclusive) through every layer of `net`,
    /// from boundary `i` to boundary `i + 1`.
    ///
    /// `net` must be the network this batch was allocated for.
    pub fn run(&mut self, net: &Network, range: RangeInclusive<usize>) {
        assert!(
            range.end() < &self.len,
            "sample range {:?} outside batch of {}",
            range,
            self.len
        );
        debug_assert!(self.dims.as_slice() == net.boundaries());

        for (i, layer) in net.layers().iter().enumerate() {
            let (head, tail) = self.slots.split_at_mut(i + 1);
            layer.forward(&head[i][range.clone()], &mut tail[0][range.clone()]);
        }
    }
}
