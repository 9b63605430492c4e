use nalgebra::convert;
use simba::scalar::SupersetOf;

use crate::error::{ensure_tolerance, SplineError, SplineResult};
use crate::knot::KnotVector;
use crate::misc::{Binomial, FloatingPoint};

use super::{BasisEvaluationCache, BasisFunction, BezierExtraction, DegreeChange, KnotInsertion};

/// B-spline basis of one parametric dimension: a knot vector and a degree
/// The number of basis functions is `knots.len() - degree - 1`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BSplineBasis<T> {
    knots: KnotVector<T>,
    degree: usize,
}

impl<T: FloatingPoint> BSplineBasis<T> {
    /// Create a basis
    /// # Failures
    /// - if the knot vector has less than `degree + 2` knots
    /// - if the domain `[knots[degree], knots[n]]` is a single point
    ///
    /// # Example
    /// ```
    /// use bsplinekit::prelude::*;
    /// let knots = KnotVector::try_new(vec![0., 0., 0., 1., 2., 2., 2.]).unwrap();
    /// let basis = BSplineBasis::try_new(knots, 2).unwrap();
    /// assert_eq!(basis.number_of_basis_functions(), 4);
    /// assert_eq!(basis.domain(), (0., 2.));
    /// ```
    pub fn try_new(knots: KnotVector<T>, degree: usize) -> SplineResult<Self> {
        if knots.len() < degree + 2 {
            return Err(SplineError::invalid_argument(format!(
                "{} knots were provided but at least {} are needed for degree {}",
                knots.len(),
                degree + 2,
                degree
            )));
        }
        let (lower, upper) = knots.domain(degree);
        if lower >= upper {
            return Err(SplineError::domain(format!(
                "the domain [{}, {}] of degree {} is empty",
                lower, upper, degree
            )));
        }
        Ok(Self { knots, degree })
    }

    pub fn knots(&self) -> &KnotVector<T> {
        &self.knots
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn number_of_basis_functions(&self) -> usize {
        self.knots.len() - self.degree - 1
    }

    /// The parametric interval on which the basis forms a partition of unity
    pub fn domain(&self) -> (T, T) {
        self.knots.domain(self.degree)
    }

    pub fn is_clamped(&self) -> bool {
        self.knots.is_clamped(self.degree)
    }

    pub fn is_in_domain(&self, u: T, tolerance: T) -> bool {
        let (lower, upper) = self.domain();
        u >= lower - tolerance && u <= upper + tolerance
    }

    /// Fail with a domain error if `u` lies outside the domain beyond `tolerance`
    pub fn ensure_in_domain(&self, u: T, tolerance: T) -> SplineResult<()> {
        if !self.is_in_domain(u, tolerance) {
            let (lower, upper) = self.domain();
            return Err(SplineError::domain(format!(
                "parametric coordinate {} lies outside the domain [{}, {}]",
                u, lower, upper
            )));
        }
        Ok(())
    }

    /// Knot span containing `u`
    pub fn find_span(&self, u: T, tolerance: T) -> usize {
        self.knots.find_knot_span_index(self.degree, u, tolerance)
    }

    /// Index of the first of the `degree + 1` basis functions that do not vanish at `u`
    pub fn first_non_zero_basis_function(&self, u: T, tolerance: T) -> usize {
        self.find_span(u, tolerance) - self.degree
    }

    /// Values of the `degree + 1` non-zero basis functions at `u`
    pub fn evaluate_basis_values(&self, u: T, tolerance: T) -> Vec<T> {
        let span = self.find_span(u, tolerance);
        let u = self.knots.snap(u, tolerance);
        self.knots.basis_functions(span, u, self.degree)
    }

    /// `derivative`-th derivatives of the `degree + 1` non-zero basis functions at `u`
    pub fn evaluate_basis_derivative_values(&self, u: T, derivative: usize, tolerance: T) -> Vec<T> {
        if derivative == 0 {
            return self.evaluate_basis_values(u, tolerance);
        }
        if derivative > self.degree {
            return vec![T::zero(); self.degree + 1];
        }
        let span = self.find_span(u, tolerance);
        let u = self.knots.snap(u, tolerance);
        let mut ders = self
            .knots
            .derivative_basis_functions(span, u, self.degree, derivative);
        ders.swap_remove(derivative)
    }

    /// Evaluate a single basis function through its Cox–de Boor tree
    ///
    /// # Example
    /// ```
    /// use bsplinekit::prelude::*;
    /// let knots = KnotVector::try_new(vec![0., 0., 1., 2., 2.]).unwrap();
    /// let basis = BSplineBasis::try_new(knots, 0).unwrap();
    /// assert_eq!(basis.evaluate_basis_function(1, 0.5, 0, 0.).unwrap(), 1.);
    /// assert_eq!(basis.evaluate_basis_function(2, 0.5, 0, 0.).unwrap(), 0.);
    /// ```
    pub fn evaluate_basis_function(
        &self,
        index: usize,
        u: T,
        derivative: usize,
        tolerance: T,
    ) -> SplineResult<T> {
        let mut cache = BasisEvaluationCache::new();
        self.evaluate_basis_function_with_cache(index, u, derivative, tolerance, &mut cache)
    }

    /// Evaluate a single basis function sharing `cache` with other evaluations at the same `u`
    pub fn evaluate_basis_function_with_cache(
        &self,
        index: usize,
        u: T,
        derivative: usize,
        tolerance: T,
        cache: &mut BasisEvaluationCache<T>,
    ) -> SplineResult<T> {
        ensure_tolerance(tolerance)?;
        let count = self.number_of_basis_functions();
        if index >= count {
            return Err(SplineError::OutOfRange {
                name: "basis function",
                index,
                bound: count,
            });
        }
        Ok(BasisFunction::new(index, self.degree).evaluate(
            &self.knots,
            u,
            derivative,
            tolerance,
            cache,
        ))
    }

    /// Blending coefficients for inserting `knot` once more, given the span `span`
    /// (last index of a knot not greater than `knot`) and its present `multiplicity`
    fn insertion_step(&self, span: usize, multiplicity: usize, knot: T) -> KnotInsertion<T> {
        let p = self.degree;
        let start = span + 1 - p;
        let alphas = (start..=(span - multiplicity))
            .map(|i| (knot - self.knots[i]) / (self.knots[i + p] - self.knots[i]))
            .collect();
        KnotInsertion::new(start, alphas)
    }

    /// Insert `knot` `multiplicity` times
    /// Returns the blending coefficients of every single insertion in order
    /// # Failures
    /// - if `multiplicity` is zero
    /// - if `knot` lies outside the domain beyond `tolerance`
    /// - if the resulting multiplicity would exceed `degree + 1`
    pub fn insert_knot(
        &mut self,
        knot: T,
        multiplicity: usize,
        tolerance: T,
    ) -> SplineResult<Vec<KnotInsertion<T>>> {
        ensure_tolerance(tolerance)?;
        if multiplicity == 0 {
            return Err(SplineError::invalid_argument("multiplicity must be positive"));
        }
        self.ensure_in_domain(knot, tolerance)?;

        let knot = self.knots.snap(knot, tolerance);
        let existing = self.knots.multiplicity_of(knot, tolerance);
        if existing + multiplicity > self.degree + 1 {
            return Err(SplineError::invalid_argument(format!(
                "inserting knot {} {} times would raise its multiplicity from {} above {}",
                knot,
                multiplicity,
                existing,
                self.degree + 1
            )));
        }

        let span = match self.knots.last_index_of(knot, tolerance) {
            Some(last) if existing > 0 => last,
            _ => self.knots.floor(knot).unwrap_or(self.degree),
        };
        let knot = if existing > 0 { self.knots[span] } else { knot };

        let steps = (0..multiplicity)
            .map(|j| {
                let step = self.insertion_step(span + j, existing + j, knot);
                self.knots.insert(span + j + 1, knot);
                step
            })
            .collect();
        Ok(steps)
    }

    /// Remove `knot` up to `multiplicity` times (at most its present multiplicity)
    /// Returns for every removal, in order, the insertion that the removal undoes
    /// # Failures
    /// - if `multiplicity` is zero
    /// - if `knot` does not lie strictly inside the domain
    pub fn remove_knot(
        &mut self,
        knot: T,
        multiplicity: usize,
        tolerance: T,
    ) -> SplineResult<Vec<KnotInsertion<T>>> {
        ensure_tolerance(tolerance)?;
        if multiplicity == 0 {
            return Err(SplineError::invalid_argument("multiplicity must be positive"));
        }
        let (lower, upper) = self.domain();
        if !(knot > lower + tolerance && knot < upper - tolerance) {
            return Err(SplineError::domain(format!(
                "knot {} does not lie in the interior of the domain [{}, {}]",
                knot, lower, upper
            )));
        }

        let removals = multiplicity.min(self.knots.multiplicity_of(knot, tolerance));
        let mut steps = Vec::with_capacity(removals);
        for _ in 0..removals {
            let Some(last) = self.knots.last_index_of(knot, tolerance) else {
                break;
            };
            let value = self.knots.remove(last);
            let remaining = self.knots.multiplicity_of(value, tolerance);
            steps.push(self.insertion_step(last - 1, remaining, value));
        }
        Ok(steps)
    }

    /// Whether every interior knot has multiplicity `degree` or `degree + 1` and both ends
    /// have multiplicity `degree + 1`
    pub fn is_bezier_form(&self) -> bool {
        let multiplicity = self.knots.multiplicity();
        let last = multiplicity.len() - 1;
        multiplicity.iter().enumerate().all(|(i, m)| {
            if i == 0 || i == last {
                m.multiplicity() == self.degree + 1
            } else {
                m.multiplicity() == self.degree || m.multiplicity() == self.degree + 1
            }
        })
    }

    /// Knots whose insertion turns the basis into Bezier form
    /// Knots within `tolerance` of each other count as one knot
    /// # Failures
    /// - if the knot vector is not clamped
    pub fn determine_bezier_extraction_knots(
        &self,
        tolerance: T,
    ) -> SplineResult<BezierExtraction<T>> {
        ensure_tolerance(tolerance)?;
        let multiplicity = self
            .knots
            .multiplicity_within(tolerance.max(T::default_epsilon()));
        let (first, last) = (&multiplicity[0], &multiplicity[multiplicity.len() - 1]);
        if first.multiplicity() != self.degree + 1 || last.multiplicity() != self.degree + 1 {
            return Err(SplineError::domain(format!(
                "Bezier extraction requires end knots of multiplicity {}, got {} and {}",
                self.degree + 1,
                first.multiplicity(),
                last.multiplicity()
            )));
        }

        let knots = multiplicity[1..multiplicity.len() - 1]
            .iter()
            .flat_map(|m| {
                std::iter::repeat_n(*m.knot(), self.degree.saturating_sub(m.multiplicity()))
            })
            .collect();
        Ok(BezierExtraction::new(multiplicity.len() - 1, knots))
    }

    /// Index of the first control point of every Bezier segment
    fn bezier_segment_starts(&self) -> Vec<usize> {
        let multiplicity = self.knots.multiplicity();
        multiplicity[..multiplicity.len() - 1]
            .iter()
            .map(|m| m.last_index() - self.degree)
            .collect()
    }

    /// Interior knots of multiplicity `degree`, where neighbouring Bezier segments share
    /// their end point
    pub fn shared_segment_knots(&self) -> Vec<T> {
        let multiplicity = self.knots.multiplicity();
        multiplicity[1..multiplicity.len() - 1]
            .iter()
            .filter(|m| m.multiplicity() == self.degree)
            .map(|m| *m.knot())
            .collect()
    }

    /// Add `delta` (possibly negative) to the multiplicity of every distinct knot
    fn shift_multiplicities(&mut self, delta: isize) {
        let knots = self
            .knots
            .multiplicity()
            .iter()
            .flat_map(|m| {
                let count = (m.multiplicity() as isize + delta).max(0) as usize;
                std::iter::repeat_n(*m.knot(), count)
            })
            .collect();
        self.knots = KnotVector::from_sorted(knots);
    }

    fn ensure_bezier_form(&self) -> SplineResult<()> {
        if !self.is_bezier_form() {
            return Err(SplineError::domain(
                "degree changes require a basis in Bezier form",
            ));
        }
        Ok(())
    }

    /// Raise the degree of a basis in Bezier form by `multiplicity`
    /// # Failures
    /// - if `multiplicity` is zero
    /// - if the basis is not in Bezier form
    pub fn elevate_degree(&mut self, multiplicity: usize) -> SplineResult<DegreeChange<T>> {
        if multiplicity == 0 {
            return Err(SplineError::invalid_argument("multiplicity must be positive"));
        }
        self.ensure_bezier_form()?;

        let segment_starts = self.bezier_segment_starts();
        let lower_degree = self.degree;
        self.shift_multiplicities(multiplicity as isize);
        self.degree += multiplicity;

        Ok(DegreeChange::new(
            segment_starts,
            lower_degree,
            multiplicity,
            elevation_coefficients(lower_degree, multiplicity),
        ))
    }

    /// Lower the degree of a basis in Bezier form by `multiplicity`
    ///
    /// Degree 0 segments share no end points, so reducing to degree 0 requires every
    /// interior knot to have multiplicity `degree + 1`.
    /// # Failures
    /// - if `multiplicity` is zero or greater than the degree
    /// - if the basis is not in Bezier form
    pub fn reduce_degree(&mut self, multiplicity: usize) -> SplineResult<DegreeChange<T>> {
        if multiplicity == 0 || multiplicity > self.degree {
            return Err(SplineError::invalid_argument(format!(
                "cannot reduce degree {} by {}",
                self.degree, multiplicity
            )));
        }
        self.ensure_bezier_form()?;
        if multiplicity == self.degree && !self.shared_segment_knots().is_empty() {
            return Err(SplineError::domain(
                "reduction to degree 0 requires disjoint Bezier segments",
            ));
        }

        let segment_starts = self.bezier_segment_starts();
        let lower_degree = self.degree - multiplicity;
        self.shift_multiplicities(-(multiplicity as isize));
        self.degree = lower_degree;

        Ok(DegreeChange::new(
            segment_starts,
            lower_degree,
            multiplicity,
            elevation_coefficients(lower_degree, multiplicity),
        ))
    }

    /// Cast the basis to another floating point type
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> BSplineBasis<F> {
        BSplineBasis {
            knots: self.knots.cast(),
            degree: self.degree,
        }
    }
}

/// `(degree + multiplicity + 1) x (degree + 1)` table of Bezier degree elevation
fn elevation_coefficients<T: FloatingPoint>(degree: usize, multiplicity: usize) -> Vec<Vec<T>> {
    let mut binom = Binomial::<f64>::new();
    (0..=(degree + multiplicity))
        .map(|i| {
            (0..=degree)
                .map(|j| convert(binom.elevation_ratio(degree, multiplicity, i, j)))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn basis(knots: Vec<f64>, degree: usize) -> BSplineBasis<f64> {
        BSplineBasis::try_new(KnotVector::try_new(knots).unwrap(), degree).unwrap()
    }

    #[test]
    fn partition_of_unity() {
        let b = basis(vec![0., 0., 0., 0., 0.3, 0.3, 0.7, 1., 1., 1., 1.], 3);
        for i in 0..=20 {
            let u = i as f64 / 20.;
            let values = b.evaluate_basis_values(u, 0.);
            assert_relative_eq!(values.iter().sum::<f64>(), 1.0, epsilon = 1e-12);

            let tree_sum: f64 = (0..b.number_of_basis_functions())
                .map(|k| b.evaluate_basis_function(k, u, 0, 0.).unwrap())
                .sum();
            assert_relative_eq!(tree_sum, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn dynamic_programming_matches_tree() {
        let b = basis(vec![0., 0., 0., 0.25, 0.5, 0.5, 1., 1., 1.], 2);
        for u in [0.1, 0.3, 0.5, 0.8, 1.0] {
            let first = b.first_non_zero_basis_function(u, 0.);
            for derivative in 0..=3 {
                let values = b.evaluate_basis_derivative_values(u, derivative, 0.);
                for (j, value) in values.iter().enumerate() {
                    let tree = b
                        .evaluate_basis_function(first + j, u, derivative, 0.)
                        .unwrap();
                    assert_relative_eq!(*value, tree, epsilon = 1e-10);
                }
            }
        }
    }

    #[test]
    fn degree_zero_derivatives_vanish() {
        let b = basis(vec![0., 0., 1., 2., 2.], 0);
        assert_eq!(b.number_of_basis_functions(), 4);
        assert_eq!(b.evaluate_basis_values(1.5, 0.), vec![1.]);
        assert_eq!(b.first_non_zero_basis_function(1.5, 0.), 2);
        assert_eq!(b.first_non_zero_basis_function(0.5, 0.), 1);
        assert_eq!(b.evaluate_basis_derivative_values(1.5, 1, 0.), vec![0.]);
    }

    #[test]
    fn insertion_coefficients() {
        let mut b = basis(vec![0., 0., 0., 1., 2., 2., 2.], 2);
        let steps = b.insert_knot(0.5, 2, 0.).unwrap();
        assert_eq!(b.knots().to_vec(), vec![0., 0., 0., 0.5, 0.5, 1., 2., 2., 2.]);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].start(), 1);
        assert_eq!(steps[0].position(), 2);
        assert_relative_eq!(steps[0].alphas()[0], 0.5);
        assert_relative_eq!(steps[0].alphas()[1], 0.25);
        assert_eq!(steps[1].start(), 2);
        assert_eq!(steps[1].position(), 2);
    }

    #[test]
    fn insertion_limits() {
        let mut b = basis(vec![0., 0., 0., 1., 2., 2., 2.], 2);
        assert!(b.insert_knot(1.0, 3, 0.).unwrap_err().is_invalid_argument());
        assert!(b.insert_knot(0.0, 1, 0.).unwrap_err().is_invalid_argument());
        assert!(b.insert_knot(2.5, 1, 0.).unwrap_err().is_domain_error());
        assert!(b.insert_knot(0.5, 0, 0.).unwrap_err().is_invalid_argument());
        assert!(b.insert_knot(0.5, 1, -1.).unwrap_err().is_invalid_argument());
        // nothing changed by the failed calls
        assert_eq!(b.knots().to_vec(), vec![0., 0., 0., 1., 2., 2., 2.]);
        assert!(b.insert_knot(1.0, 2, 0.).is_ok());
    }

    #[test]
    fn removal_inverts_insertion_records() {
        let mut b = basis(vec![0., 0., 0., 1., 2., 2., 2.], 2);
        let original = b.clone();
        let inserted = b.insert_knot(0.5, 2, 0.).unwrap();
        let removed = b.remove_knot(0.5, 3, 0.).unwrap();
        assert_eq!(b, original);
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0], inserted[1]);
        assert_eq!(removed[1], inserted[0]);
        assert!(b.remove_knot(2.0, 1, 0.).unwrap_err().is_domain_error());
        assert!(b.remove_knot(0.5, 1, 0.).unwrap().is_empty());
    }

    #[test]
    fn bezier_extraction_and_degree_changes() {
        let mut b = basis(vec![0., 0., 0., 1., 2., 2., 3., 3., 3.], 2);
        let extraction = b.determine_bezier_extraction_knots(0.).unwrap();
        assert_eq!(extraction.segments(), 3);
        assert_eq!(extraction.knots(), &[1.]);
        b.insert_knot(1., 1, 0.).unwrap();
        assert!(b.is_bezier_form());

        let elevation = b.elevate_degree(1).unwrap();
        assert_eq!(elevation.segment_starts(), &[0, 2, 4]);
        assert_eq!(b.degree(), 3);
        assert_eq!(
            b.knots().to_vec(),
            vec![0., 0., 0., 0., 1., 1., 1., 2., 2., 2., 3., 3., 3., 3.]
        );
        assert_eq!(elevation.coefficients().len(), 4);
        assert_relative_eq!(elevation.coefficients()[1][0], 1. / 3.);
        assert_relative_eq!(elevation.coefficients()[1][1], 2. / 3.);

        let reduction = b.reduce_degree(1).unwrap();
        assert_eq!(reduction.segment_starts(), &[0, 3, 6]);
        assert_eq!(b.degree(), 2);
        assert_eq!(reduction.coefficients(), elevation.coefficients());
        assert!(b.reduce_degree(3).unwrap_err().is_invalid_argument());
        // segments sharing end points cannot collapse to degree 0
        assert!(b.reduce_degree(2).unwrap_err().is_domain_error());
        assert_eq!(b.degree(), 2);
    }

    #[test]
    fn reduction_to_degree_zero() {
        let mut b = basis(vec![0., 0., 1., 1., 2., 2.], 1);
        assert!(b.shared_segment_knots().is_empty());
        let reduction = b.reduce_degree(1).unwrap();
        assert_eq!(reduction.segment_starts(), &[0, 2]);
        assert_eq!(reduction.lower_degree(), 0);
        assert_eq!(b.degree(), 0);
        assert_eq!(b.knots().to_vec(), vec![0., 1., 2.]);

        let b = basis(vec![0., 0., 1., 2., 2.], 1);
        assert_eq!(b.shared_segment_knots(), vec![1.]);
    }

    #[test]
    fn empty_domain_is_rejected() {
        let knots = KnotVector::try_new(vec![0., 1., 2.]).unwrap();
        assert!(BSplineBasis::try_new(knots, 1).unwrap_err().is_domain_error());
        let knots = KnotVector::try_new(vec![0., 0., 0., 1., 1., 1.]).unwrap();
        assert!(BSplineBasis::try_new(knots, 5).unwrap_err().is_invalid_argument());
        let knots = KnotVector::try_new(vec![0., 1., 1., 1., 1., 2.]).unwrap();
        assert!(BSplineBasis::try_new(knots, 2).unwrap_err().is_domain_error());
    }

    #[test]
    fn bezier_extraction_groups_knots_within_tolerance() {
        let b = basis(vec![0., 0., 0., 0.5, 0.5 + 1e-9, 1., 1., 1.], 2);
        let extraction = b.determine_bezier_extraction_knots(1e-6).unwrap();
        assert_eq!(extraction.segments(), 2);
        assert!(extraction.knots().is_empty());

        let extraction = b.determine_bezier_extraction_knots(0.).unwrap();
        assert_eq!(extraction.segments(), 3);
        assert_eq!(extraction.knots(), &[0.5, 0.5 + 1e-9]);
    }

    #[test]
    fn bezier_extraction_requires_clamped_ends() {
        let b = basis(vec![0., 1., 2., 3., 4., 5.], 2);
        assert!(b
            .determine_bezier_extraction_knots(0.)
            .unwrap_err()
            .is_domain_error());
    }
}
