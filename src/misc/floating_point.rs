use nalgebra::RealField;
use num_traits::ToPrimitive;

/// Trait for floating point types (f32, f64)
/// Mainly used to identify the type of the field in nalgebra
pub trait FloatingPoint: RealField + ToPrimitive + Copy {}

impl FloatingPoint for f32 {}
impl FloatingPoint for f64 {}

/// Convert a count into the scalar type
pub(crate) fn from_usize<T: FloatingPoint>(value: usize) -> T {
    nalgebra::convert(value as f64)
}
