pub mod layers;
pub mod conv;
pub mod network;
pub mod batch;
pub mod classify;

pub use layers::*;
pub use conv::*;
pub use network::*;
pub use batch::*;
pub use classify::*;
