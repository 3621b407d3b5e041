pub mod error;
pub mod grid;
pub mod value;

pub use error::*;
pub use grid::*;
pub use value::*;
