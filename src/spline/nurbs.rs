use nalgebra::DVector;
use simba::scalar::SupersetOf;

use crate::error::SplineResult;
use crate::index::{grid_points, Index, IndexLength};
use crate::misc::{Binomial, FloatingPoint};
use crate::parameter_space::ParameterSpace;
use crate::vector_space::WeightedVectorSpace;

use super::{Spline, SplineRecord};

/// Rational tensor-product B-spline
/// Control points are stored as homogeneous coordinates, see [`WeightedVectorSpace`]
pub type Nurbs<T> = Spline<T, WeightedVectorSpace<T>>;

impl<T: FloatingPoint> Spline<T, WeightedVectorSpace<T>> {
    /// Create a NURBS
    /// # Failures
    /// - if the numbers of knot vectors and degrees differ
    /// - if a knot vector is invalid for its degree
    /// - if the numbers of control points and weights differ
    /// - if a weight is not strictly positive
    /// - if the number of control points differs from the number of basis functions
    ///
    /// # Example
    /// ```
    /// use bsplinekit::prelude::*;
    /// use nalgebra::dvector;
    /// use approx::assert_relative_eq;
    ///
    /// // quarter circle
    /// let w = std::f64::consts::FRAC_1_SQRT_2;
    /// let nurbs = Nurbs::try_new(
    ///     vec![vec![0., 0., 0., 1., 1., 1.]],
    ///     vec![2],
    ///     vec![dvector![1., 0.], dvector![1., 1.], dvector![0., 1.]],
    ///     vec![1., w, 1.],
    /// ).unwrap();
    /// for i in 0..=10 {
    ///     let p = nurbs.evaluate(&[i as f64 / 10.], 0.).unwrap();
    ///     assert_relative_eq!(p.norm(), 1., epsilon = 1e-12);
    /// }
    /// ```
    pub fn try_new(
        knot_vectors: Vec<Vec<T>>,
        degrees: Vec<usize>,
        coordinates: Vec<DVector<T>>,
        weights: Vec<T>,
    ) -> SplineResult<Self> {
        let parameter_space = ParameterSpace::try_from_knots(knot_vectors, degrees)?;
        Self::from_spaces(
            parameter_space,
            WeightedVectorSpace::try_new(coordinates, weights)?,
        )
    }

    /// Evaluate the spline at the parametric coordinate `u`
    pub fn evaluate(&self, u: &[T], tolerance: T) -> SplineResult<DVector<T>> {
        let orders = vec![0; self.parametric_dimensionality()];
        let homogeneous = self.evaluate_storage(u, &orders, tolerance)?;
        Ok(WeightedVectorSpace::project(&homogeneous))
    }

    /// Evaluate the partial derivative of orders `orders` at `u`
    ///
    /// With `A` the derivatives of the weighted numerator and `w` those of the weight, the
    /// derivatives `C` of the projection follow from the product rule for every multi-index
    /// `k`: `C^(k) = (A^(k) - sum_{0 < j <= k} binom(k, j) w^(j) C^(k - j)) / w`
    pub fn evaluate_derivative(
        &self,
        u: &[T],
        orders: &[usize],
        tolerance: T,
    ) -> SplineResult<DVector<T>> {
        // validate before sizing the table of lower derivatives
        self.evaluate_storage(u, orders, tolerance)?;

        let n = self.dimensionality();
        let extents = IndexLength::new(orders.iter().map(|o| o + 1).collect());
        let homogeneous = grid_points(&extents)
            .map(|index| self.evaluate_storage(u, &index.value(), tolerance))
            .collect::<SplineResult<Vec<_>>>()?;
        let weight = homogeneous[0][n];

        let mut binom = Binomial::<T>::new();
        let mut derivatives: Vec<DVector<T>> = Vec::with_capacity(extents.product());
        for k in grid_points(&extents) {
            let k_value = k.value();
            let mut v = homogeneous[k.offset()].rows(0, n).into_owned();
            // every j <= k precedes k in flat order
            for j in grid_points(&extents).take(k.offset() + 1).skip(1) {
                let j_value = j.value();
                if j_value.iter().zip(k_value.iter()).any(|(j, k)| j > k) {
                    continue;
                }
                let coefficient = j_value
                    .iter()
                    .zip(k_value.iter())
                    .fold(T::one(), |acc, (j, k)| acc * binom.get(*k, *j));
                let difference: Vec<usize> =
                    k_value.iter().zip(j_value.iter()).map(|(k, j)| k - j).collect();
                let lower = Index::new(&extents, &difference).offset();
                v -= &derivatives[lower] * (coefficient * homogeneous[j.offset()][n]);
            }
            derivatives.push(v / weight);
        }
        Ok(derivatives.swap_remove(extents.product() - 1))
    }

    /// Evaluate the spline on a regular grid over the domain
    pub fn sample(&self, counts: &[usize]) -> SplineResult<Vec<DVector<T>>> {
        self.sample_parameters(counts)?
            .iter()
            .map(|u| self.evaluate(u, T::zero()))
            .collect()
    }

    /// Record with the projected control points and the weights
    pub fn write(&self) -> SplineRecord<T> {
        let (coordinates, weights) = self.vector_space().write_projected();
        SplineRecord {
            degrees: self.degrees(),
            knot_vectors: self
                .parameter_space()
                .knot_vectors()
                .iter()
                .map(|k| k.to_vec())
                .collect(),
            coordinates: coordinates
                .iter()
                .map(|c| c.iter().copied().collect())
                .collect(),
            weights: Some(weights),
        }
    }

    /// Cast the spline to another floating point type
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> Nurbs<F> {
        Spline::from_cast_parts(self.parameter_space().cast(), self.vector_space().cast())
    }
}
