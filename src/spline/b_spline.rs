use nalgebra::DVector;
use simba::scalar::SupersetOf;

use crate::error::SplineResult;
use crate::misc::FloatingPoint;
use crate::parameter_space::ParameterSpace;
use crate::vector_space::VectorSpace;

use super::{Spline, SplineRecord};

/// Non-rational tensor-product B-spline
pub type BSpline<T> = Spline<T, VectorSpace<T>>;

impl<T: FloatingPoint> Spline<T, VectorSpace<T>> {
    /// Create a B-spline
    /// # Failures
    /// - if the numbers of knot vectors and degrees differ
    /// - if a knot vector is invalid for its degree
    /// - if the control points differ in dimensionality
    /// - if the number of control points differs from the number of basis functions
    ///
    /// # Example
    /// ```
    /// use bsplinekit::prelude::*;
    /// use nalgebra::dvector;
    ///
    /// // quadratic Bezier curve in the plane
    /// let spline = BSpline::try_new(
    ///     vec![vec![0., 0., 0., 1., 1., 1.]],
    ///     vec![2],
    ///     vec![dvector![0., 0.], dvector![1., 2.], dvector![2., 0.]],
    /// ).unwrap();
    /// let p = spline.evaluate(&[0.5], 0.).unwrap();
    /// assert_eq!(p, dvector![1., 1.]);
    /// ```
    pub fn try_new(
        knot_vectors: Vec<Vec<T>>,
        degrees: Vec<usize>,
        coordinates: Vec<DVector<T>>,
    ) -> SplineResult<Self> {
        let parameter_space = ParameterSpace::try_from_knots(knot_vectors, degrees)?;
        Self::from_spaces(parameter_space, VectorSpace::try_new(coordinates)?)
    }

    /// Evaluate the spline at the parametric coordinate `u`
    /// # Failures
    /// - if `u` has the wrong number of components
    /// - if `u` lies outside the domain beyond `tolerance`
    pub fn evaluate(&self, u: &[T], tolerance: T) -> SplineResult<DVector<T>> {
        let orders = vec![0; self.parametric_dimensionality()];
        self.evaluate_storage(u, &orders, tolerance)
    }

    /// Evaluate the partial derivative of orders `orders` at `u`
    pub fn evaluate_derivative(
        &self,
        u: &[T],
        orders: &[usize],
        tolerance: T,
    ) -> SplineResult<DVector<T>> {
        self.evaluate_storage(u, orders, tolerance)
    }

    /// Evaluate the spline on a regular grid over the domain
    pub fn sample(&self, counts: &[usize]) -> SplineResult<Vec<DVector<T>>> {
        self.sample_parameters(counts)?
            .iter()
            .map(|u| self.evaluate(u, T::zero()))
            .collect()
    }

    pub fn write(&self) -> SplineRecord<T> {
        SplineRecord {
            degrees: self.degrees(),
            knot_vectors: self
                .parameter_space()
                .knot_vectors()
                .iter()
                .map(|k| k.to_vec())
                .collect(),
            coordinates: self
                .vector_space()
                .coordinates()
                .iter()
                .map(|c| c.iter().copied().collect())
                .collect(),
            weights: None,
        }
    }

    /// Cast the spline to another floating point type
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> BSpline<F> {
        Spline::from_cast_parts(self.parameter_space().cast(), self.vector_space().cast())
    }
}
