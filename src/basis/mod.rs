pub mod b_spline_basis;
pub mod basis_function;
pub mod topology;

pub use b_spline_basis::*;
pub use basis_function::*;
pub use topology::*;
