//! Domain and wire types.

pub mod instrument;
pub mod mode;
pub mod ranking;
pub mod sample;

pub use instrument::*;
pub use mode::*;
pub use ranking::*;
pub use sample::*;
