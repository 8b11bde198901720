//! # catnet
//!
//! Forward-only convolutional network inference over batches of small images.
//!
//! ## Modules
//!
//! - **core** — `Volume` storage, `Dims` geometry, `CnnError`, parameter stream traits
//! - **nn** — Conv / ReLU / max-pool / fully-connected / softmax layers, `Network`, `Batch`, classification
//! - **io** — text parameter files, JSON engine configuration, raw image files

/// Volumes, geometry and errors.
pub use catnet_core as core;

/// Layers, networks and the classification driver.
pub use catnet_nn as nn;

/// Parameter, configuration and image files.
pub use catnet_io as io;

pub use catnet_core::{CnnError, CnnResult, Dims, Volume};
pub use catnet_io::EngineConfig;
pub use catnet_nn::{
    classify, classify_cats, classify_with, Batch, ClassifyOptions, Network, CAT_LABEL,
    CAT_THRESHOLD,
};
