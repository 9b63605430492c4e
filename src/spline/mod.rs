pub mod b_spline;
pub mod nurbs;
pub mod spline;
pub mod spline_record;

pub use b_spline::*;
pub use nurbs::*;
pub use spline::*;
pub use spline_record::*;
