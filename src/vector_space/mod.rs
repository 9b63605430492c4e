pub mod vector_space;
pub mod weighted_vector_space;

pub use vector_space::*;
pub use weighted_vector_space::*;
