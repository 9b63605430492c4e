use std::ops::Index;

use itertools::Itertools;
use nalgebra::convert;
use simba::scalar::SupersetOf;

use crate::error::{SplineError, SplineResult};
use crate::misc::FloatingPoint;
use crate::prelude::KnotMultiplicity;

/// Knot vector representation
/// A non-decreasing sequence of parametric values for one parametric dimension
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnotVector<T>(Vec<T>);

impl<T: FloatingPoint> KnotVector<T> {
    /// Create a knot vector
    /// # Failures
    /// - if the knot vector is empty
    /// - if the knots are not sorted in non-decreasing order
    ///
    /// # Example
    /// ```
    /// use bsplinekit::prelude::KnotVector;
    /// assert!(KnotVector::try_new(vec![0., 0., 1., 1.]).is_ok());
    /// assert!(KnotVector::try_new(vec![0., 1., 0.5]).is_err());
    /// ```
    pub fn try_new(knots: Vec<T>) -> SplineResult<Self> {
        if knots.is_empty() {
            return Err(SplineError::invalid_argument("knot vector is empty"));
        }
        if let Some((i, _)) = knots
            .iter()
            .tuple_windows()
            .find_position(|(a, b)| !(*a <= *b))
        {
            return Err(SplineError::invalid_argument(format!(
                "knot vector is not non-decreasing at index {} ({} > {})",
                i + 1,
                knots[i],
                knots[i + 1]
            )));
        }
        Ok(Self(knots))
    }

    /// Wrap knots known to be sorted
    pub(crate) fn from_sorted(knots: Vec<T>) -> Self {
        debug_assert!(knots.windows(2).all(|w| w[0] <= w[1]));
        Self(knots)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.0.clone()
    }

    pub fn first(&self) -> T {
        self.0[0]
    }

    pub fn last(&self) -> T {
        self.0[self.0.len() - 1]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    /// Get the domain of the knot vector by degree
    pub fn domain(&self, degree: usize) -> (T, T) {
        (self.0[degree], self.0[self.0.len() - 1 - degree])
    }

    /// Returns the index of the last knot less than or equal to knot
    pub fn floor(&self, knot: T) -> Option<usize> {
        self.iter().rposition(|t| *t <= knot)
    }

    /// Insert a knot at `index`; the caller keeps the sequence sorted
    pub fn insert(&mut self, index: usize, knot: T) {
        debug_assert!(index == 0 || self.0[index - 1] <= knot);
        debug_assert!(index == self.0.len() || knot <= self.0[index]);
        self.0.insert(index, knot);
    }

    /// Remove the knot at `index`
    pub fn remove(&mut self, index: usize) -> T {
        self.0.remove(index)
    }

    /// Get the multiplicity of each knot
    /// # Example
    /// ```
    /// use bsplinekit::prelude::KnotVector;
    /// let knots = KnotVector::try_new(vec![0., 0., 0., 1., 2., 3., 3., 3.]).unwrap();
    /// let knot_multiplicity = knots.multiplicity();
    /// assert_eq!(knot_multiplicity[0].multiplicity(), 3);
    /// assert_eq!(knot_multiplicity[1].multiplicity(), 1);
    /// assert_eq!(knot_multiplicity[2].multiplicity(), 1);
    /// assert_eq!(knot_multiplicity[3].multiplicity(), 3);
    /// assert_eq!(knot_multiplicity[3].last_index(), 7);
    /// ```
    pub fn multiplicity(&self) -> Vec<KnotMultiplicity<T>> {
        self.multiplicity_within(T::default_epsilon())
    }

    /// Get the multiplicity of each knot, grouping knots within `tolerance` of the first
    /// knot of their group
    /// # Example
    /// ```
    /// use bsplinekit::prelude::KnotVector;
    /// let knots = KnotVector::try_new(vec![0., 0., 0.5, 0.5 + 1e-9, 1., 1.]).unwrap();
    /// assert_eq!(knots.multiplicity().len(), 4);
    /// let grouped = knots.multiplicity_within(1e-6);
    /// assert_eq!(grouped.len(), 3);
    /// assert_eq!(grouped[1].multiplicity(), 2);
    /// ```
    pub fn multiplicity_within(&self, tolerance: T) -> Vec<KnotMultiplicity<T>> {
        let mut mult = vec![];

        let mut current = KnotMultiplicity::new(self.0[0], 0, 0);
        self.0.iter().enumerate().for_each(|(i, knot)| {
            if (*knot - *current.knot()).abs() > tolerance {
                mult.push(current.clone());
                current = KnotMultiplicity::new(*knot, i, 0);
            }
            current.increment_multiplicity();
        });
        mult.push(current);

        mult
    }

    /// Number of knots within `tolerance` of `knot`
    pub fn multiplicity_of(&self, knot: T, tolerance: T) -> usize {
        self.iter()
            .filter(|k| (**k - knot).abs() <= tolerance)
            .count()
    }

    /// Index of the last knot within `tolerance` of `knot`
    pub fn last_index_of(&self, knot: T, tolerance: T) -> Option<usize> {
        self.iter().rposition(|k| (*k - knot).abs() <= tolerance)
    }

    /// Replace `u` by a knot within `tolerance` of it
    pub fn snap(&self, u: T, tolerance: T) -> T {
        self.iter()
            .find(|k| (**k - u).abs() <= tolerance)
            .copied()
            .unwrap_or(u)
    }

    /// Check if the knot vector is clamped
    /// `clamped` means the first and last knots have a multiplicity greater than the degree
    /// e.g. [0, 0, 0, 1, 2, 3, 3, 3] with degree 2 is clamped
    pub fn is_clamped(&self, degree: usize) -> bool {
        let multiplicity = self.multiplicity();
        let start = multiplicity.first();
        let end = multiplicity.last();
        match (start, end) {
            (Some(start), Some(end)) => {
                start.multiplicity() > degree && end.multiplicity() > degree
            }
            _ => false,
        }
    }

    /// Find the knot span index `i` with `knots[i] <= u < knots[i + 1]`
    ///
    /// The result is clamped to the spans of the domain and always refers to a span of
    /// positive length. Coordinates within `tolerance` of a knot are treated as the knot,
    /// and the upper end of the domain resolves to the last non-empty span.
    ///
    /// # Example
    /// ```
    /// use bsplinekit::prelude::KnotVector;
    /// let knots = KnotVector::try_new(vec![0., 0., 0., 1., 2., 3., 3., 3.]).unwrap();
    /// assert_eq!(knots.find_knot_span_index(2, 2.5, 0.), 4);
    /// assert_eq!(knots.find_knot_span_index(2, 3.0, 0.), 4);
    /// assert_eq!(knots.find_knot_span_index(2, 0.0, 0.), 2);
    /// ```
    pub fn find_knot_span_index(&self, degree: usize, u: T, tolerance: T) -> usize {
        let n = self.len() - degree - 1;
        let first_span = (degree..n)
            .find(|&i| self[i] < self[i + 1])
            .unwrap_or(degree);
        let last_span = (degree..n)
            .rev()
            .find(|&i| self[i] < self[i + 1])
            .unwrap_or(n - 1);

        let u = self.snap(u, tolerance);
        if u >= self[n] {
            return last_span;
        }

        match self.floor(u) {
            Some(span) => span.clamp(first_span, last_span),
            None => first_span,
        }
    }

    /// Compute the non-vanishing basis functions
    ///
    pub fn basis_functions(&self, knot_span_index: usize, u: T, degree: usize) -> Vec<T> {
        let mut basis_functions = vec![T::zero(); degree + 1];
        let mut left = vec![T::zero(); degree + 1];
        let mut right = vec![T::zero(); degree + 1];

        basis_functions[0] = T::one();

        for j in 1..=degree {
            left[j] = u - self[knot_span_index + 1 - j];
            right[j] = self[knot_span_index + j] - u;
            let mut saved = T::zero();

            for r in 0..j {
                let temp = basis_functions[r] / (right[r + 1] + left[j - r]);
                basis_functions[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }

            basis_functions[j] = saved;
        }

        basis_functions
    }

    /// Compute the non-vanishing basis functions and their derivatives
    /// 2d array of basis and derivative values of size (n+1, p+1) The nth row is the nth derivative and the first row is made up of the basis function values.
    /// `n` must not exceed the degree; higher derivatives vanish
    pub fn derivative_basis_functions(
        &self,
        knot_index: usize,
        u: T,
        degree: usize,
        n: usize,
    ) -> Vec<Vec<T>> {
        debug_assert!(n <= degree);
        let mut ndu = vec![vec![T::zero(); degree + 1]; degree + 1];
        let mut left = vec![T::zero(); degree + 1];
        let mut right = vec![T::zero(); degree + 1];

        ndu[0][0] = T::one();

        for j in 1..=degree {
            left[j] = u - self[knot_index + 1 - j];
            right[j] = self[knot_index + j] - u;

            let mut saved = T::zero();
            for r in 0..j {
                // lower triangle
                ndu[j][r] = right[r + 1] + left[j - r];
                let temp = ndu[r][j - 1] / ndu[j][r];

                // upper triangle
                ndu[r][j] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            ndu[j][j] = saved;
        }

        let mut ders = vec![vec![T::zero(); degree + 1]; n + 1];
        let mut a = vec![vec![T::zero(); degree + 1]; 2];

        // load the basis functions
        for j in 0..=degree {
            ders[0][j] = ndu[j][degree];
        }

        let idegree = degree as isize;
        let n = n as isize;

        // compute the derivatives
        for r in 0..=idegree {
            // alternate rows in array a
            let mut s1 = 0;
            let mut s2 = 1;
            a[0][0] = T::one();

            // loop to compute the kth derivative
            for k in 1..=n {
                let mut d = T::zero();
                let rk = r - k;
                let pk = idegree - k;

                if r >= k {
                    a[s2][0] = a[s1][0] / ndu[(pk + 1) as usize][rk as usize];
                    d = a[s2][0] * ndu[rk as usize][pk as usize];
                }

                let j1 = if rk >= -1 { 1 } else { -rk };
                let j2 = if r - 1 <= pk { k - 1 } else { idegree - r };

                for j in j1..=j2 {
                    a[s2][j as usize] = (a[s1][j as usize] - a[s1][j as usize - 1])
                        / ndu[(pk + 1) as usize][(rk + j) as usize];
                    d += a[s2][j as usize] * ndu[(rk + j) as usize][pk as usize];
                }

                let uk = k as usize;
                let ur = r as usize;
                if r <= pk {
                    a[s2][uk] = -a[s1][(k - 1) as usize] / ndu[(pk + 1) as usize][ur];
                    d += a[s2][uk] * ndu[ur][pk as usize];
                }

                ders[uk][ur] = d;

                // switch rows
                std::mem::swap(&mut s1, &mut s2);
            }
        }

        let mut acc = idegree;
        for k in 1..=n {
            for j in 0..=idegree {
                ders[k as usize][j as usize] *= convert::<f64, T>(acc as f64);
            }
            acc *= idegree - k;
        }
        ders
    }

    /// Cast the knot vector to another floating point type
    /// # Example
    /// ```
    /// use bsplinekit::prelude::*;
    /// let knots: KnotVector<f64> = KnotVector::try_new(vec![1., 2., 3., 4., 5., 6.]).unwrap();
    /// let knots2 = knots.cast::<f32>();
    /// assert_eq!(knots2.first(), 1.0);
    /// ```
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> KnotVector<F> {
        KnotVector(self.0.iter().map(|v| convert(*v)).collect())
    }
}

impl<T> Index<usize> for KnotVector<T> {
    type Output = T;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::KnotVector;

    #[test]
    fn knot_span_lookup() {
        let knot = KnotVector::try_new(vec![0., 0., 0., 1., 2., 3., 3., 3.]).unwrap();
        assert_eq!(knot.find_knot_span_index(2, 2.5, 0.), 4);
        assert_eq!(knot.find_knot_span_index(2, 1.0, 0.), 3);
        assert_eq!(knot.find_knot_span_index(2, 1.0 - 1e-9, 1e-6), 3);
        assert_eq!(knot.find_knot_span_index(2, 1.0 - 1e-9, 0.), 2);
        assert_eq!(knot.find_knot_span_index(2, 3.0 + 1e-9, 1e-6), 4);
    }

    #[test]
    fn knot_span_skips_empty_spans() {
        let knot = KnotVector::try_new(vec![0., 0., 1., 2., 2.]).unwrap();
        // degree 0: spans [0,0), [0,1), [1,2), [2,2)
        assert_eq!(knot.find_knot_span_index(0, 0.0, 0.), 1);
        assert_eq!(knot.find_knot_span_index(0, 1.5, 0.), 2);
        assert_eq!(knot.find_knot_span_index(0, 2.0, 0.), 2);
    }

    #[test]
    fn basis_functions_sum_to_one() {
        let knot = KnotVector::try_new(vec![0., 0., 0., 0.5, 1., 2., 2., 2.]).unwrap();
        for u in [0.0, 0.25, 0.5, 0.75, 1.3, 2.0] {
            let span = knot.find_knot_span_index(2, u, 0.);
            let sum: f64 = knot.basis_functions(span, u, 2).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn derivative_rows_match_values() {
        let knot = KnotVector::try_new(vec![0., 0., 0., 0., 1., 2., 2., 2., 2.]).unwrap();
        let u = 0.7;
        let span = knot.find_knot_span_index(3, u, 0.);
        let values = knot.basis_functions(span, u, 3);
        let ders = knot.derivative_basis_functions(span, u, 3, 2);
        for j in 0..=3 {
            assert_relative_eq!(values[j], ders[0][j], epsilon = 1e-12);
        }
        // derivatives of a partition of unity vanish in sum
        assert_relative_eq!(ders[1].iter().sum::<f64>(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(ders[2].iter().sum::<f64>(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn multiplicity_with_tolerance() {
        let knot = KnotVector::try_new(vec![0., 0., 0.5, 0.5, 0.5 + 1e-9, 1., 1.]).unwrap();
        assert_eq!(knot.multiplicity_of(0.5, 1e-6), 3);
        assert_eq!(knot.multiplicity_of(0.5, 0.), 2);
        assert_eq!(knot.last_index_of(0.5, 1e-6), Some(4));
        assert_eq!(knot.multiplicity_of(0.25, 1e-6), 0);
    }

    #[test]
    fn rejects_decreasing_knots() {
        let err = KnotVector::try_new(vec![0., 1., 0.5]).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(KnotVector::<f64>::try_new(vec![]).is_err());
    }
}
