use std::ops::Index;

use nalgebra::{convert, DVector};
use simba::scalar::SupersetOf;

use crate::error::{SplineError, SplineResult};
use crate::misc::FloatingPoint;

/// Storage through which the spline kernel reaches the control data of a spline
///
/// The kernel edits the flat [`VectorSpace`] returned by `storage_mut` in lockstep with the
/// parameter space. For rational splines the stored vectors are homogeneous.
pub trait ControlSpace<T: FloatingPoint>: Clone {
    /// Flat storage of the (possibly homogeneous) control vectors
    fn storage(&self) -> &VectorSpace<T>;

    fn storage_mut(&mut self) -> &mut VectorSpace<T>;

    /// Ambient dimensionality of the represented geometry
    fn dimensionality(&self) -> usize;

    fn is_rational(&self) -> bool;

    /// Largest distance of a (projected) control point from the origin
    fn determine_maximum_distance_from_origin(&self) -> T;

    fn len(&self) -> usize {
        self.storage().len()
    }

    fn is_empty(&self) -> bool {
        self.storage().is_empty()
    }
}

/// Ordered control points of a non-rational spline, all of one dimensionality
#[derive(Clone, Debug, PartialEq)]
pub struct VectorSpace<T: FloatingPoint> {
    dimensionality: usize,
    coordinates: Vec<DVector<T>>,
}

impl<T: FloatingPoint> VectorSpace<T> {
    /// Create a vector space
    /// # Failures
    /// - if no coordinate is given
    /// - if the coordinates differ in dimensionality
    ///
    /// # Example
    /// ```
    /// use bsplinekit::prelude::*;
    /// use nalgebra::dvector;
    /// let space = VectorSpace::try_new(vec![dvector![0., 0.], dvector![1., 2.]]).unwrap();
    /// assert_eq!(space.dimensionality(), 2);
    /// assert!(VectorSpace::try_new(vec![dvector![0., 0.], dvector![1.]]).is_err());
    /// ```
    pub fn try_new(coordinates: Vec<DVector<T>>) -> SplineResult<Self> {
        let Some(first) = coordinates.first() else {
            return Err(SplineError::domain("a vector space needs at least one coordinate"));
        };
        let dimensionality = first.len();
        if let Some((i, c)) = coordinates
            .iter()
            .enumerate()
            .find(|(_, c)| c.len() != dimensionality)
        {
            return Err(SplineError::domain(format!(
                "coordinate {} has dimensionality {} but {} was expected",
                i,
                c.len(),
                dimensionality
            )));
        }
        Ok(Self {
            dimensionality,
            coordinates,
        })
    }

    /// Create a vector space from rows of components
    pub fn try_from_rows(rows: Vec<Vec<T>>) -> SplineResult<Self> {
        Self::try_new(rows.into_iter().map(DVector::from_vec).collect())
    }

    pub fn dimensionality(&self) -> usize {
        self.dimensionality
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn coordinates(&self) -> &[DVector<T>] {
        &self.coordinates
    }

    /// Insert `value` at `position` shifting later coordinates back
    pub fn reallocate_insert(&mut self, position: usize, value: DVector<T>) {
        debug_assert_eq!(value.len(), self.dimensionality);
        self.coordinates.insert(position, value);
    }

    /// Overwrite the coordinate at `position`
    pub fn replace(&mut self, position: usize, value: DVector<T>) {
        debug_assert_eq!(value.len(), self.dimensionality);
        self.coordinates[position] = value;
    }

    /// Remove the coordinate at `position` shifting later coordinates forward
    pub fn erase(&mut self, position: usize) -> DVector<T> {
        self.coordinates.remove(position)
    }

    /// Largest euclidean norm among the coordinates
    pub fn determine_maximum_distance_from_origin(&self) -> T {
        self.coordinates
            .iter()
            .map(|c| c.norm())
            .fold(T::zero(), |a, b| a.max(b))
    }

    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> VectorSpace<F> {
        VectorSpace {
            dimensionality: self.dimensionality,
            coordinates: self
                .coordinates
                .iter()
                .map(|c| c.map(|v| convert(v)))
                .collect(),
        }
    }
}

impl<T: FloatingPoint> Index<usize> for VectorSpace<T> {
    type Output = DVector<T>;
    fn index(&self, index: usize) -> &Self::Output {
        &self.coordinates[index]
    }
}

impl<T: FloatingPoint> ControlSpace<T> for VectorSpace<T> {
    fn storage(&self) -> &VectorSpace<T> {
        self
    }

    fn storage_mut(&mut self) -> &mut VectorSpace<T> {
        self
    }

    fn dimensionality(&self) -> usize {
        self.dimensionality
    }

    fn is_rational(&self) -> bool {
        false
    }

    fn determine_maximum_distance_from_origin(&self) -> T {
        VectorSpace::determine_maximum_distance_from_origin(self)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::dvector;

    use super::*;

    #[test]
    fn mutators_keep_order() {
        let mut space =
            VectorSpace::try_from_rows(vec![vec![0., 0.], vec![1., 0.], vec![2., 0.]]).unwrap();
        space.reallocate_insert(1, dvector![0.5, 0.]);
        assert_eq!(space.len(), 4);
        assert_eq!(space[2], dvector![1., 0.]);
        space.replace(0, dvector![-1., 0.]);
        let erased = space.erase(2);
        assert_eq!(erased, dvector![1., 0.]);
        assert_eq!(space.coordinates()[2], dvector![2., 0.]);
        assert_eq!(space[0], dvector![-1., 0.]);
    }

    #[test]
    fn maximum_distance() {
        let space = VectorSpace::try_from_rows(vec![vec![3., 4.], vec![-1., 0.]]).unwrap();
        assert_relative_eq!(space.determine_maximum_distance_from_origin(), 5.);
    }

    #[test]
    fn mixed_dimensionality_is_rejected() {
        let err = VectorSpace::try_from_rows(vec![vec![0., 0.], vec![1.]]).unwrap_err();
        assert!(err.is_domain_error());
        assert!(VectorSpace::<f64>::try_new(vec![]).unwrap_err().is_domain_error());
    }
}
