//! Raw, already-decoded images and probability lists as whitespace-separated text.

use std::fs;
use std::path::Path;

use catnet_core::{CnnError, CnnResult, Dims, ParamSink, ParamSource, Volume};
use log::debug;

use crate::params::{TextParamWriter, TextParams};

fn read_values(path: &Path) -> CnnResult<Vec<f64>> {
    let text = fs::read_to_string(path).map_err(|e| CnnError::io(path, e))?;
    let mut src = TextParams::new(&text);
    let mut values = vec![0.0; src.remaining()];
    src.read_into(&mut values).map_err(|e| e.in_file(path))?;
    Ok(values)
}

/// Read images of shape `dims`, each stored as `dims.numel()` values in volume order.
pub fn read_images(path: &Path, dims: Dims) -> CnnResult<Vec<Volume>> {
    let values = read_values(path)?;
    let per_image = dims.numel();
    if per_image == 0 || values.len() % per_image != 0 {
        return Err(CnnError::ShapeMismatch {
            expected: dims.to_vec(),
            got: vec![values.len()],
        }
        .in_file(path));
    }
    let images = values
        .chunks_exact(per_image)
        .map(|chunk| Volume::from_data(dims, chunk.to_vec()))
        .collect::<CnnResult<Vec<_>>>()?;
    debug!("read {} images of {} from {}", images.len(), dims, path.display());
    Ok(images)
}

/// Write images one per line, in the layout [`read_images`] expects.
pub fn write_images(path: &Path, images: &[Volume]) -> CnnResult<()> {
    let mut sink = TextParamWriter::new();
    for image in images {
        sink.put_values(image.data())?;
    }
    fs::write(path, sink.into_string()).map_err(|e| CnnError::io(path, e))
}

/// Read one probability per image, e.g. reference outputs.
pub fn read_probabilities(path: &Path) -> CnnResult<Vec<f64>> {
    read_values(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_images_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.txt");
        let dims = Dims::new(4, 4, 3);
        let images: Vec<Volume> = (0..3).map(|s| Volume::rand(dims, s)).collect();
        write_images(&path, &images).unwrap();
        assert_eq!(read_images(&path, dims).unwrap(), images);
    }

    #[test]
    fn test_partial_image_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.txt");
        fs::write(&path, "1 2 3 4 5").unwrap();
        let err = read_images(&path, Dims::new(2, 1, 2)).unwrap_err();
        match err {
            CnnError::Load { source, .. } => {
                assert!(matches!(*source, CnnError::ShapeMismatch { .. }))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bad_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probs.txt");
        fs::write(&path, "0.1\n0.9\nabc\n").unwrap();
        assert!(read_probabilities(&path).is_err());

        fs::write(&path, "0.1\n0.9\n").unwrap();
        assert_eq!(read_probabilities(&path).unwrap(), vec![0.1, 0.9]);
    }

    #[test]
    fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.txt");
        fs::write(&path, "").unwrap();
        assert!(read_images(&path, Dims::new(2, 2, 1)).unwrap().is_empty());
    }
}
