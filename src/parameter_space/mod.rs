pub mod parameter_space;
pub use parameter_space::*;
