use nalgebra::DVector;
use simba::scalar::SupersetOf;

use crate::error::{SplineError, SplineResult};
use crate::misc::FloatingPoint;

use super::{ControlSpace, VectorSpace};

/// Control points of a rational spline stored as homogeneous coordinates
/// `weight * [coordinate, 1]`, the weight living in the trailing component
#[derive(Clone, Debug, PartialEq)]
pub struct WeightedVectorSpace<T: FloatingPoint> {
    homogeneous: VectorSpace<T>,
}

impl<T: FloatingPoint> WeightedVectorSpace<T> {
    /// Create a weighted vector space
    /// # Failures
    /// - if the number of coordinates and weights differ
    /// - if a weight is not strictly positive
    /// - if the coordinates differ in dimensionality
    ///
    /// # Example
    /// ```
    /// use bsplinekit::prelude::*;
    /// use nalgebra::dvector;
    /// let space = WeightedVectorSpace::try_new(
    ///     vec![dvector![1., 0.], dvector![1., 1.]],
    ///     vec![1., 0.5],
    /// ).unwrap();
    /// assert_eq!(space.dimensionality(), 2);
    /// assert_eq!(space.homogeneous()[1], dvector![0.5, 0.5, 0.5]);
    /// ```
    pub fn try_new(coordinates: Vec<DVector<T>>, weights: Vec<T>) -> SplineResult<Self> {
        if coordinates.len() != weights.len() {
            return Err(SplineError::domain(format!(
                "{} coordinates were provided with {} weights",
                coordinates.len(),
                weights.len()
            )));
        }
        if let Some((i, w)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| **w <= T::zero())
        {
            return Err(SplineError::domain(format!(
                "weight {} at index {} is not positive",
                w, i
            )));
        }
        let plain = VectorSpace::try_new(coordinates)?;
        let homogeneous = plain
            .coordinates()
            .iter()
            .zip(weights)
            .map(|(c, w)| c.push(T::one()) * w)
            .collect();
        Ok(Self {
            homogeneous: VectorSpace::try_new(homogeneous)?,
        })
    }

    pub fn dimensionality(&self) -> usize {
        self.homogeneous.dimensionality() - 1
    }

    pub fn len(&self) -> usize {
        self.homogeneous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.homogeneous.is_empty()
    }

    pub fn homogeneous(&self) -> &VectorSpace<T> {
        &self.homogeneous
    }

    /// Project a homogeneous vector onto the affine space dividing by its weight
    pub fn project(homogeneous: &DVector<T>) -> DVector<T> {
        let n = homogeneous.len() - 1;
        let w = homogeneous[n];
        homogeneous.rows(0, n) / w
    }

    pub fn weights(&self) -> Vec<T> {
        let n = self.dimensionality();
        self.homogeneous.coordinates().iter().map(|h| h[n]).collect()
    }

    /// Largest norm among the projected control points and the smallest weight, in one pass
    pub fn determine_maximum_distance_from_origin_and_minimum_weight(&self) -> (T, T) {
        let n = self.dimensionality();
        self.homogeneous.coordinates().iter().fold(
            (T::zero(), T::max_value().unwrap_or(T::one())),
            |(distance, weight), h| {
                (
                    distance.max(Self::project(h).norm()),
                    weight.min(h[n]),
                )
            },
        )
    }

    /// Projected control points and their weights
    pub fn write_projected(&self) -> (Vec<DVector<T>>, Vec<T>) {
        let coordinates = self
            .homogeneous
            .coordinates()
            .iter()
            .map(Self::project)
            .collect();
        (coordinates, self.weights())
    }

    /// Weighted control points `weight * coordinate` and their weights
    pub fn write_weighted(&self) -> (Vec<DVector<T>>, Vec<T>) {
        let n = self.dimensionality();
        let coordinates = self
            .homogeneous
            .coordinates()
            .iter()
            .map(|h| h.rows(0, n).into_owned())
            .collect();
        (coordinates, self.weights())
    }

    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> WeightedVectorSpace<F> {
        WeightedVectorSpace {
            homogeneous: self.homogeneous.cast(),
        }
    }
}

impl<T: FloatingPoint> ControlSpace<T> for WeightedVectorSpace<T> {
    fn storage(&self) -> &VectorSpace<T> {
        &self.homogeneous
    }

    fn storage_mut(&mut self) -> &mut VectorSpace<T> {
        &mut self.homogeneous
    }

    fn dimensionality(&self) -> usize {
        self.homogeneous.dimensionality() - 1
    }

    fn is_rational(&self) -> bool {
        true
    }

    fn determine_maximum_distance_from_origin(&self) -> T {
        self.determine_maximum_distance_from_origin_and_minimum_weight().0
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::dvector;

    use super::*;

    #[test]
    fn counts_are_named_on_mismatch() {
        let err = WeightedVectorSpace::try_new(
            vec![dvector![0., 0.], dvector![1., 0.], dvector![2., 0.]],
            vec![1., 1.],
        )
        .unwrap_err();
        assert!(err.is_domain_error());
        let message = err.to_string();
        assert!(message.contains('3') && message.contains('2'));
    }

    #[test]
    fn non_positive_weights_are_rejected() {
        let err = WeightedVectorSpace::try_new(vec![dvector![0.], dvector![1.]], vec![1., 0.])
            .unwrap_err();
        assert!(err.is_domain_error());
    }

    #[test]
    fn projection_and_output() {
        let space = WeightedVectorSpace::try_new(
            vec![dvector![2., 0.], dvector![0., 4.]],
            vec![0.5, 2.],
        )
        .unwrap();
        let (projected, weights) = space.write_projected();
        assert_eq!(projected[0], dvector![2., 0.]);
        assert_eq!(weights, vec![0.5, 2.]);
        let (weighted, _) = space.write_weighted();
        assert_eq!(weighted[1], dvector![0., 8.]);

        let (distance, weight) = space.determine_maximum_distance_from_origin_and_minimum_weight();
        assert_relative_eq!(distance, 4.);
        assert_relative_eq!(weight, 0.5);
        assert_eq!(space.dimensionality(), 2);
        assert_eq!(ControlSpace::storage(&space).dimensionality(), 3);
        assert_relative_eq!(ControlSpace::determine_maximum_distance_from_origin(&space), 4.);
    }
}
