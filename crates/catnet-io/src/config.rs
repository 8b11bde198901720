//! Engine configuration
//!
//! A JSON document describing the topology and how to run it. Every field
//! is optional; missing ones fall back to the CIFAR-10 cat classifier.
//!
//! ```json
//! {
//!   "input": { "sx": 32, "sy": 32, "depth": 3 },
//!   "layers": [
//!     { "type": "conv", "size": 5, "filters": 16, "stride": 1, "pad": 2 },
//!     { "type": "relu" },
//!     { "type": "pool", "size": 2, "stride": 2 },
//!     { "type": "fc", "neurons": 10 },
//!     { "type": "softmax" }
//!   ],
//!   "cat_label": 3,
//!   "group_size": 4,
//!   "threads": 8,
//!   "params_dir": "layers"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use catnet_core::{CnnError, CnnResult, Dims};
use catnet_nn::{ClassifyOptions, LayerSpec, Network, CAT_LABEL, CIFAR10_INPUT};
use serde::{Deserialize, Serialize};

use crate::params::load_network_params;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Shape of every input image.
    pub input: Dims,
    /// Layers in forward order.
    pub layers: Vec<LayerSpec>,
    /// Output element reported per image.
    pub cat_label: usize,
    /// Images pushed through one batch together.
    pub group_size: usize,
    /// Worker threads; `None` uses rayon's default.
    pub threads: Option<usize>,
    /// Directory holding `conv0.txt`, `fc9.txt`, ...
    pub params_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            input: CIFAR10_INPUT,
            layers: LayerSpec::cifar10(),
            cat_label: CAT_LABEL,
            group_size: 1,
            threads: None,
            params_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> CnnResult<Self> {
        serde_json::from_str(json).map_err(|e| CnnError::Config(e.to_string()))
    }

    pub fn to_json(&self) -> CnnResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CnnError::Config(e.to_string()))
    }

    /// Read a configuration file.
    pub fn load(path: &Path) -> CnnResult<Self> {
        let json = fs::read_to_string(path).map_err(|e| CnnError::io(path, e))?;
        Self::from_json(&json).map_err(|e| e.in_file(path))
    }

    pub fn save(&self, path: &Path) -> CnnResult<()> {
        fs::write(path, self.to_json()?).map_err(|e| CnnError::io(path, e))
    }

    /// Build the configured topology with zeroed weights.
    pub fn build_network(&self) -> CnnResult<Network> {
        Network::new(self.input, &self.layers)
    }

    /// Build the topology and, when `params_dir` is set, load its weights.
    pub fn load_network(&self) -> CnnResult<Network> {
        let mut net = self.build_network()?;
        if let Some(dir) = &self.params_dir {
            load_network_params(&mut net, dir)?;
        }
        Ok(net)
    }

    pub fn classify_options(&self) -> ClassifyOptions {
        ClassifyOptions {
            label: self.cat_label,
            group_size: self.group_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_cifar10() {
        let cfg = EngineConfig::default();
        let net = cfg.build_network().unwrap();
        let reference = Network::cifar10().unwrap();
        assert_eq!(net.boundaries(), reference.boundaries());
        assert_eq!(cfg.classify_options(), ClassifyOptions::default());
    }

    #[test]
    fn test_json_roundtrip() {
        let cfg = EngineConfig {
            group_size: 4,
            threads: Some(2),
            params_dir: Some(PathBuf::from("layers")),
            ..EngineConfig::default()
        };
        let json = cfg.to_json().unwrap();
        let back = EngineConfig::from_json(&json).unwrap();
        assert_eq!(back, cfg);
        assert_eq!(
            back.build_network().unwrap().boundaries(),
            cfg.build_network().unwrap().boundaries()
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg = EngineConfig::from_json(r#"{ "group_size": 8 }"#).unwrap();
        assert_eq!(cfg.group_size, 8);
        assert_eq!(cfg.layers, LayerSpec::cifar10());
        assert_eq!(cfg.cat_label, CAT_LABEL);
    }

    #[test]
    fn test_custom_topology() {
        let json = r#"{
            "input": { "sx": 8, "sy": 8, "depth": 1 },
            "layers": [
                { "type": "conv", "size": 3, "filters": 2, "stride": 1, "pad": 1 },
                { "type": "relu" },
                { "type": "pool", "size": 2, "stride": 2 },
                { "type": "fc", "neurons": 3 },
                { "type": "softmax" }
            ],
            "cat_label": 1
        }"#;
        let net = EngineConfig::from_json(json).unwrap().build_network().unwrap();
        assert_eq!(net.output_dims(), Dims::column(3));
        assert_eq!(net.boundaries()[3], Dims::new(4, 4, 2));
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(matches!(
            EngineConfig::from_json(r#"{ "layers": [ { "type": "dropout" } ] }"#),
            Err(CnnError::Config(_))
        ));
        assert!(EngineConfig::from_json(r#"{ "grup_size": 2 }"#).is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let cfg = EngineConfig {
            cat_label: 5,
            ..EngineConfig::default()
        };
        cfg.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), cfg);
        assert!(EngineConfig::load(&dir.path().join("missing.json")).is_err());
    }
}
