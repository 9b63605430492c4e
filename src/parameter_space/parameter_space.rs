use simba::scalar::SupersetOf;

use crate::basis::{BSplineBasis, BasisEvaluationCache, BezierExtraction, DegreeChange, KnotInsertion};
use crate::error::{ensure_tolerance, SplineError, SplineResult};
use crate::index::{IndexLength, IndexValue};
use crate::knot::KnotVector;
use crate::misc::FloatingPoint;

/// Tensor product of one B-spline basis per parametric dimension
///
/// The basis functions of the product are addressed by an [`IndexValue`] holding one
/// per-dimension basis function index, laid out with the first dimension varying fastest.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterSpace<T> {
    bases: Vec<BSplineBasis<T>>,
}

impl<T: FloatingPoint> ParameterSpace<T> {
    /// Create a parameter space
    /// # Failures
    /// - if no basis is given
    pub fn try_new(bases: Vec<BSplineBasis<T>>) -> SplineResult<Self> {
        if bases.is_empty() {
            return Err(SplineError::invalid_argument(
                "a parameter space needs at least one parametric dimension",
            ));
        }
        Ok(Self { bases })
    }

    /// Create a parameter space from per-dimension knot sequences and degrees
    /// # Failures
    /// - if the number of knot sequences and degrees differ
    /// - if a knot sequence is invalid for its degree
    ///
    /// # Example
    /// ```
    /// use bsplinekit::prelude::*;
    /// let space = ParameterSpace::try_from_knots(
    ///     vec![vec![0., 0., 1., 1.], vec![0., 0., 0., 1., 1., 1.]],
    ///     vec![1, 2],
    /// ).unwrap();
    /// assert_eq!(space.number_of_basis_functions().to_vec(), vec![2, 3]);
    /// assert_eq!(space.total_number_of_basis_functions(), 6);
    /// ```
    pub fn try_from_knots(knot_vectors: Vec<Vec<T>>, degrees: Vec<usize>) -> SplineResult<Self> {
        if knot_vectors.len() != degrees.len() {
            return Err(SplineError::invalid_argument(format!(
                "{} knot vectors were provided for {} degrees",
                knot_vectors.len(),
                degrees.len()
            )));
        }
        let bases = knot_vectors
            .into_iter()
            .zip(degrees)
            .map(|(knots, degree)| BSplineBasis::try_new(KnotVector::try_new(knots)?, degree))
            .collect::<SplineResult<Vec<_>>>()?;
        Self::try_new(bases)
    }

    pub fn dimensionality(&self) -> usize {
        self.bases.len()
    }

    pub fn bases(&self) -> &[BSplineBasis<T>] {
        &self.bases
    }

    /// Basis of a single dimension
    pub fn basis(&self, dimension: usize) -> SplineResult<&BSplineBasis<T>> {
        self.check_dimension(dimension)?;
        Ok(&self.bases[dimension])
    }

    pub fn degrees(&self) -> Vec<usize> {
        self.bases.iter().map(|b| b.degree()).collect()
    }

    pub fn knot_vectors(&self) -> Vec<&KnotVector<T>> {
        self.bases.iter().map(|b| b.knots()).collect()
    }

    /// Number of basis functions per dimension
    pub fn number_of_basis_functions(&self) -> IndexLength {
        IndexLength::new(
            self.bases
                .iter()
                .map(|b| b.number_of_basis_functions())
                .collect(),
        )
    }

    pub fn total_number_of_basis_functions(&self) -> usize {
        self.number_of_basis_functions().product()
    }

    /// Parametric domain per dimension
    pub fn domain(&self) -> Vec<(T, T)> {
        self.bases.iter().map(|b| b.domain()).collect()
    }

    fn check_dimension(&self, dimension: usize) -> SplineResult<()> {
        if dimension >= self.dimensionality() {
            return Err(SplineError::dimension_out_of_range(
                dimension,
                self.dimensionality(),
            ));
        }
        Ok(())
    }

    /// Validate a parametric coordinate against the domain
    pub fn check_parametric_coordinate(&self, u: &[T], tolerance: T) -> SplineResult<()> {
        ensure_tolerance(tolerance)?;
        if u.len() != self.dimensionality() {
            return Err(SplineError::invalid_argument(format!(
                "parametric coordinate has {} components but the parameter space has {} dimensions",
                u.len(),
                self.dimensionality()
            )));
        }
        self.bases
            .iter()
            .zip(u.iter())
            .try_for_each(|(basis, u)| basis.ensure_in_domain(*u, tolerance))
    }

    fn check_orders(&self, orders: &[usize]) -> SplineResult<()> {
        if orders.len() != self.dimensionality() {
            return Err(SplineError::invalid_argument(format!(
                "derivative has {} components but the parameter space has {} dimensions",
                orders.len(),
                self.dimensionality()
            )));
        }
        Ok(())
    }

    /// Per-dimension coordinates of the first basis function not vanishing at `u`
    pub fn find_first_non_zero_basis_function(
        &self,
        u: &[T],
        tolerance: T,
    ) -> SplineResult<IndexValue> {
        self.check_parametric_coordinate(u, tolerance)?;
        Ok(IndexValue::new(
            self.bases
                .iter()
                .zip(u.iter())
                .map(|(basis, u)| basis.first_non_zero_basis_function(*u, tolerance))
                .collect(),
        ))
    }

    /// Values of the `degree + 1` non-zero basis functions of every dimension at `u`
    pub fn evaluate_basis_values_per_dimension(
        &self,
        u: &[T],
        tolerance: T,
    ) -> SplineResult<Vec<Vec<T>>> {
        self.check_parametric_coordinate(u, tolerance)?;
        Ok(self
            .bases
            .iter()
            .zip(u.iter())
            .map(|(basis, u)| basis.evaluate_basis_values(*u, tolerance))
            .collect())
    }

    /// Derivatives of the `degree + 1` non-zero basis functions of every dimension at `u`
    /// `orders[d]` is the derivative order along dimension `d`
    pub fn evaluate_basis_derivative_values_per_dimension(
        &self,
        u: &[T],
        orders: &[usize],
        tolerance: T,
    ) -> SplineResult<Vec<Vec<T>>> {
        self.check_parametric_coordinate(u, tolerance)?;
        self.check_orders(orders)?;
        Ok(self
            .bases
            .iter()
            .zip(u.iter().zip(orders.iter()))
            .map(|(basis, (u, order))| basis.evaluate_basis_derivative_values(*u, *order, tolerance))
            .collect())
    }

    /// Evaluate the tensor-product basis function `index` through the per-dimension trees
    pub fn evaluate_basis_function(
        &self,
        index: &IndexValue,
        u: &[T],
        orders: &[usize],
        tolerance: T,
    ) -> SplineResult<T> {
        self.check_parametric_coordinate(u, tolerance)?;
        self.check_orders(orders)?;
        if index.len() != self.dimensionality() {
            return Err(SplineError::invalid_argument(format!(
                "basis function index has {} components but the parameter space has {} dimensions",
                index.len(),
                self.dimensionality()
            )));
        }
        self.bases
            .iter()
            .enumerate()
            .try_fold(T::one(), |acc, (d, basis)| {
                let mut cache = BasisEvaluationCache::new();
                let value = basis.evaluate_basis_function_with_cache(
                    index[d],
                    u[d],
                    orders[d],
                    tolerance,
                    &mut cache,
                )?;
                Ok(acc * value)
            })
    }

    /// Insert `knot` `multiplicity` times into dimension `dimension`
    pub fn insert_knot(
        &mut self,
        dimension: usize,
        knot: T,
        multiplicity: usize,
        tolerance: T,
    ) -> SplineResult<Vec<KnotInsertion<T>>> {
        self.check_dimension(dimension)?;
        self.bases[dimension].insert_knot(knot, multiplicity, tolerance)
    }

    /// Remove `knot` up to `multiplicity` times from dimension `dimension`
    pub fn remove_knot(
        &mut self,
        dimension: usize,
        knot: T,
        multiplicity: usize,
        tolerance: T,
    ) -> SplineResult<Vec<KnotInsertion<T>>> {
        self.check_dimension(dimension)?;
        self.bases[dimension].remove_knot(knot, multiplicity, tolerance)
    }

    pub fn determine_bezier_extraction_knots(
        &self,
        dimension: usize,
        tolerance: T,
    ) -> SplineResult<BezierExtraction<T>> {
        self.check_dimension(dimension)?;
        self.bases[dimension].determine_bezier_extraction_knots(tolerance)
    }

    pub fn elevate_degree(
        &mut self,
        dimension: usize,
        multiplicity: usize,
    ) -> SplineResult<DegreeChange<T>> {
        self.check_dimension(dimension)?;
        self.bases[dimension].elevate_degree(multiplicity)
    }

    pub fn reduce_degree(
        &mut self,
        dimension: usize,
        multiplicity: usize,
    ) -> SplineResult<DegreeChange<T>> {
        self.check_dimension(dimension)?;
        self.bases[dimension].reduce_degree(multiplicity)
    }

    /// Cast the parameter space to another floating point type
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> ParameterSpace<F> {
        ParameterSpace {
            bases: self.bases.iter().map(|b| b.cast()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use crate::index::{grid_points, Index};

    use super::*;

    fn surface_space() -> ParameterSpace<f64> {
        ParameterSpace::try_from_knots(
            vec![
                vec![0., 0., 0., 0.4, 1., 1., 1.],
                vec![-1., -1., 0., 0.5, 2., 2.],
            ],
            vec![2, 1],
        )
        .unwrap()
    }

    #[test]
    fn tensor_product_partition_of_unity() {
        let space = surface_space();
        let extents = space.number_of_basis_functions();
        assert_eq!(extents.to_vec(), vec![4, 4]);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let u = [rng.random_range(0.0..1.0), rng.random_range(-1.0..2.0)];
            let sum: f64 = grid_points(&extents)
                .map(|i| {
                    space
                        .evaluate_basis_function(&i.value(), &u, &[0, 0], 0.)
                        .unwrap()
                })
                .sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);

            // the non-zero window agrees with the per-dimension arrays
            let first = space.find_first_non_zero_basis_function(&u, 0.).unwrap();
            let values = space.evaluate_basis_values_per_dimension(&u, 0.).unwrap();
            let origin = Index::new(&extents, &first);
            let tree = space
                .evaluate_basis_function(&origin.value(), &u, &[0, 0], 0.)
                .unwrap();
            assert_relative_eq!(tree, values[0][0] * values[1][0], epsilon = 1e-12);
        }
    }

    #[test]
    fn argument_checks() {
        let mut space = surface_space();
        assert!(space
            .evaluate_basis_values_per_dimension(&[0.5], 0.)
            .unwrap_err()
            .is_invalid_argument());
        assert!(space
            .evaluate_basis_values_per_dimension(&[0.5, 3.], 0.)
            .unwrap_err()
            .is_domain_error());
        assert!(space
            .evaluate_basis_values_per_dimension(&[0.5, 0.], -1.)
            .unwrap_err()
            .is_invalid_argument());
        assert!(space
            .evaluate_basis_derivative_values_per_dimension(&[0.5, 0.], &[1], 0.)
            .unwrap_err()
            .is_invalid_argument());
        assert!(space.insert_knot(2, 0.5, 1, 0.).unwrap_err().is_out_of_range());
        assert!(space
            .evaluate_basis_values_per_dimension(&[1. + 1e-9, 2.], 1e-6)
            .is_ok());
    }

    #[test]
    fn edits_touch_a_single_dimension() {
        let mut space = surface_space();
        space.insert_knot(1, 1.0, 1, 0.).unwrap();
        assert_eq!(space.number_of_basis_functions().to_vec(), vec![4, 5]);
        assert_eq!(space.degrees(), vec![2, 1]);
        let removed = space.remove_knot(1, 1.0, 1, 0.).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(space, surface_space());
    }
}
