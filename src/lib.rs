#![allow(clippy::needless_range_loop, clippy::module_inception)]

mod basis;
mod error;
mod index;
mod knot;
mod misc;
mod parameter_space;
mod spline;
mod vector_space;

pub mod prelude {
    pub use crate::basis::*;
    pub use crate::error::*;
    pub use crate::index::*;
    pub use crate::knot::*;
    pub use crate::misc::*;
    pub use crate::parameter_space::*;
    pub use crate::spline::*;
    pub use crate::vector_space::*;
}
