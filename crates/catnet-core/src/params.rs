//! Streams of learned parameters.
//!
//! Layers read and write their weights through these traits, so the storage
//! format stays outside the layer code.

use crate::error::{CnnError, CnnResult};

/// Sequential reader of header integers and weight values.
pub trait ParamSource {
    /// Next header integer. Signed, so that nonsense headers surface as mismatches.
    fn next_int(&mut self) -> CnnResult<i64>;

    fn next_value(&mut self) -> CnnResult<f64>;

    /// Read a header integer and require it to equal `expected`.
    fn expect_dim(&mut self, field: &'static str, expected: usize) -> CnnResult<()> {
        let got = self.next_int()?;
        if usize::try_from(got).ok() != Some(expected) {
            return Err(CnnError::HeaderMismatch {
                field,
                expected,
                got,
            });
        }
        Ok(())
    }

    /// Fill `out` with the next `out.len()` values.
    fn read_into(&mut self, out: &mut [f64]) -> CnnResult<()> {
        for slot in out.iter_mut() {
            *slot = self.next_value()?;
        }
        Ok(())
    }
}

/// Sequential writer, the inverse of [`ParamSource`].
pub trait ParamSink {
    fn put_header(&mut self, dims: &[usize]) -> CnnResult<()>;

    fn put_values(&mut self, values: &[f64]) -> CnnResult<()>;
}
