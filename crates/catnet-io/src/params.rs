//! Whitespace-separated text parameter files.
//!
//! Convolution: `sx sy depth filters`, the weights in (filter, x, y, z) order,
//! then one bias per filter. Fully connected: `num_inputs out_depth`, the
//! weights neuron by neuron, then one bias per neuron.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::SplitWhitespace;

use catnet_core::{CnnError, CnnResult, ParamSink, ParamSource};
use catnet_nn::{Layer, LayerKind, Network};
use log::{info, warn};

/// Token reader over the text of one parameter file.
pub struct TextParams<'a> {
    tokens: SplitWhitespace<'a>,
    position: usize,
}

impl<'a> TextParams<'a> {
    pub fn new(text: &'a str) -> Self {
        TextParams {
            tokens: text.split_whitespace(),
            position: 0,
        }
    }

    /// Tokens not consumed yet.
    pub fn remaining(&self) -> usize {
        self.tokens.clone().count()
    }

    fn next_token(&mut self, expected: &'static str) -> CnnResult<&'a str> {
        let token = self.tokens.next().ok_or(CnnError::UnexpectedEof {
            expected,
            position: self.position,
        })?;
        self.position += 1;
        Ok(token)
    }

    fn parse_error(&self, token: &str) -> CnnError {
        CnnError::Parse {
            token: token.to_string(),
            position: self.position - 1,
        }
    }
}

impl ParamSource for TextParams<'_> {
    fn next_int(&mut self) -> CnnResult<i64> {
        let token = self.next_token("header integer")?;
        token.parse().map_err(|_| self.parse_error(token))
    }

    fn next_value(&mut self) -> CnnResult<f64> {
        let token = self.next_token("weight value")?;
        token.parse().map_err(|_| self.parse_error(token))
    }
}

/// Accumulates parameters in the text format [`TextParams`] reads.
#[derive(Debug, Default)]
pub struct TextParamWriter {
    buf: String,
}

impl TextParamWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

impl ParamSink for TextParamWriter {
    fn put_header(&mut self, dims: &[usize]) -> CnnResult<()> {
        let line: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
        self.buf.push_str(&line.join(" "));
        self.buf.push('\n');
        Ok(())
    }

    fn put_values(&mut self, values: &[f64]) -> CnnResult<()> {
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                self.buf.push(' ');
            }
            // Display for f64 is the shortest form that parses back exactly
            self.buf.push_str(&v.to_string());
        }
        self.buf.push('\n');
        Ok(())
    }
}

/// File name holding the weights of layer `index`, e.g. `conv0.txt`, `fc9.txt`.
pub fn param_file_name(kind: LayerKind, index: usize) -> String {
    format!("{}{}.txt", kind, index)
}

/// Load one layer's weights from `path`.
pub fn load_layer_params(layer: &mut dyn Layer, path: &Path) -> CnnResult<()> {
    let text = fs::read_to_string(path).map_err(|e| CnnError::io(path, e))?;
    let mut src = TextParams::new(&text);
    layer
        .load_params(&mut src)
        .map_err(|e| e.in_file(path))?;

    let extra = src.remaining();
    if extra > 0 {
        warn!("{}: ignoring {} trailing tokens", path.display(), extra);
    }
    info!("loaded {} parameters from {}", layer.kind(), path.display());
    Ok(())
}

/// Write one layer's weights to `path`.
pub fn save_layer_params(layer: &dyn Layer, path: &Path) -> CnnResult<()> {
    let mut sink = TextParamWriter::new();
    layer.save_params(&mut sink)?;
    fs::write(path, sink.into_string()).map_err(|e| CnnError::io(path, e))
}

/// Paths of every parameter file `net` expects under `dir`, by layer index.
pub fn network_param_paths(net: &Network, dir: &Path) -> Vec<(usize, PathBuf)> {
    net.layers()
        .iter()
        .enumerate()
        .filter(|(_, layer)| layer.has_params())
        .map(|(i, layer)| (i, dir.join(param_file_name(layer.kind(), i))))
        .collect()
}

/// Load every parametric layer of `net` from `dir`. Stops at the first failure.
pub fn load_network_params(net: &mut Network, dir: &Path) -> CnnResult<()> {
    let paths = network_param_paths(net, dir);
    for (i, path) in &paths {
        load_layer_params(net.layers_mut()[*i].as_mut(), path)?;
    }
    info!("loaded {} parameter files from {}", paths.len(), dir.display());
    Ok(())
}

/// Write every parametric layer of `net` into `dir`, creating it if needed.
pub fn save_network_params(net: &Network, dir: &Path) -> CnnResult<()> {
    fs::create_dir_all(dir).map_err(|e| CnnError::io(dir, e))?;
    let paths = network_param_paths(net, dir);
    for (i, path) in &paths {
        save_layer_params(net.layers()[*i].as_ref(), path)?;
    }
    info!("saved {} parameter files to {}", paths.len(), dir.display());
    Ok(())
}
