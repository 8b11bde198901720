pub mod volume;
pub mod shape;
pub mod params;
pub mod error;

pub use volume::Volume;
pub use shape::Dims;
pub use params::{ParamSink, ParamSource};
pub use error::{CnnError, CnnResult};
