use catnet_core::{CnnError, CnnResult, Volume};
use log::debug;
use rayon::prelude::*;

use crate::batch::Batch;
use crate::network::Network;

/// Index of the "cat" class in the CIFAR-10 output.
pub const CAT_LABEL: usize = 3;

/// Probability above which callers conventionally report a cat.
pub const CAT_THRESHOLD: f64 = 0.5;

/// How [`classify_with`] reads and schedules its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyOptions {
    /// Output element reported for each image.
    pub label: usize,
    /// Images run through one batch together.
    pub group_size: usize,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        ClassifyOptions {
            label: CAT_LABEL,
            group_size: 1,
        }
    }
}

/// Write the probability of `label` for `images[i]` into `outputs[i]`.
pub fn classify(
    net: &Network,
    images: &[Volume],
    outputs: &mut [f64],
    label: usize,
) -> CnnResult<()> {
    let opts = ClassifyOptions {
        label,
        ..ClassifyOptions::default()
    };
    classify_with(net, images, outputs, &opts)
}

/// Cat probability for every image.
pub fn classify_cats(net: &Network, images: &[Volume]) -> CnnResult<Vec<f64>> {
    let mut outputs = vec![0.0; images.len()];
    classify(net, images, &mut outputs, CAT_LABEL)?;
    Ok(outputs)
}

/// Grouped, parallel classification.
///
/// Images are cut into groups of `opts.group_size`; groups run on the rayon
/// pool, each worker reusing one private batch across the groups it takes.
/// `outputs[i]` depends only on `images[i]`.
pub fn classify_with(
    net: &Network,
    images: &[Volume],
    outputs: &mut [f64],
    opts: &ClassifyOptions,
) -> CnnResult<()> {
    if outputs.len() != images.len() {
        return Err(CnnError::ShapeMismatch {
            expected: vec![images.len()],
            got: vec![outputs.len()],
        });
    }
    if opts.group_size == 0 {
        return Err(CnnError::Config("group size must be positive".to_string()));
    }
    let classes = net.output_dims().numel();
    if opts.label >= classes {
        return Err(CnnError::Config(format!(
            "label {} outside {} network outputs",
            opts.label, classes
        )));
    }
    let input = net.input_dims();
    if let Some(bad) = images.iter().find(|img| img.dims() != input) {
        return Err(CnnError::ShapeMismatch {
            expected: input.to_vec(),
            got: bad.dims().to_vec(),
        });
    }

    debug!(
        "classifying {} images in groups of {} on {} threads",
        images.len(),
        opts.group_size,
        rayon::current_num_threads()
    );

    // chunks never exceed the input, whatever group size was asked for
    let group = opts.group_size.min(images.len()).max(1);
    images
        .par_chunks(group)
        .zip(outputs.par_chunks_mut(group))
        .for_each_init(
            || Batch::new(net, group),
            |batch, (imgs, outs)| {
                for (n, img) in imgs.iter().enumerate() {
                    batch.input_mut(n).copy_from(img);
                }
                batch.run(net, 0..=imgs.len() - 1);
                for (n, out) in outs.iter_mut().enumerate() {
                    *out = batch.output(n).data()[opts.label];
                }
            },
        );
    Ok(())
}
