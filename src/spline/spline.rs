use itertools::Itertools;
use nalgebra::DVector;

use crate::basis::{BezierExtraction, DegreeChange, KnotInsertion};
use crate::error::{ensure_tolerance, SplineError, SplineResult};
use crate::index::{grid_points, Index, IndexLength};
use crate::misc::{from_usize, FloatingPoint};
use crate::parameter_space::ParameterSpace;
use crate::vector_space::{ControlSpace, VectorSpace};

/// Tensor-product spline of arbitrary parametric dimensionality
///
/// A spline owns its parameter space and its control data and keeps the number of control
/// vectors equal to the number of basis functions. The control vectors are stored flat with
/// the first parametric dimension varying fastest.
///
/// Topology edits (knot insertion/removal and degree elevation/reduction) change the
/// parameter space of a single dimension and replay that change on every line of control
/// vectors along the dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct Spline<T: FloatingPoint, V> {
    parameter_space: ParameterSpace<T>,
    vector_space: V,
}

impl<T: FloatingPoint, V> Spline<T, V> {
    /// Assemble a spline from parts that are known to match
    pub(crate) fn from_cast_parts(parameter_space: ParameterSpace<T>, vector_space: V) -> Self {
        Self {
            parameter_space,
            vector_space,
        }
    }
}

impl<T: FloatingPoint, V: ControlSpace<T>> Spline<T, V> {
    /// Create a spline from its parameter space and control data
    /// # Failures
    /// - if the number of control vectors differs from the number of basis functions
    pub fn from_spaces(parameter_space: ParameterSpace<T>, vector_space: V) -> SplineResult<Self> {
        let required = parameter_space.total_number_of_basis_functions();
        if vector_space.len() != required {
            return Err(SplineError::domain(format!(
                "{} coordinates were provided but the parameter space has {} basis functions",
                vector_space.len(),
                required
            )));
        }
        Ok(Self {
            parameter_space,
            vector_space,
        })
    }

    pub fn parameter_space(&self) -> &ParameterSpace<T> {
        &self.parameter_space
    }

    pub fn vector_space(&self) -> &V {
        &self.vector_space
    }

    pub fn parametric_dimensionality(&self) -> usize {
        self.parameter_space.dimensionality()
    }

    /// Ambient dimensionality of the represented geometry
    pub fn dimensionality(&self) -> usize {
        self.vector_space.dimensionality()
    }

    pub fn is_rational(&self) -> bool {
        self.vector_space.is_rational()
    }

    pub fn degrees(&self) -> Vec<usize> {
        self.parameter_space.degrees()
    }

    /// Parametric domain per dimension
    pub fn domain(&self) -> Vec<(T, T)> {
        self.parameter_space.domain()
    }

    /// Evaluate the stored (for rational splines homogeneous) control vectors against the
    /// `orders`-th derivatives of the basis at `u`
    pub(crate) fn evaluate_storage(
        &self,
        u: &[T],
        orders: &[usize],
        tolerance: T,
    ) -> SplineResult<DVector<T>> {
        let values = self
            .parameter_space
            .evaluate_basis_derivative_values_per_dimension(u, orders, tolerance)?;
        let first = self
            .parameter_space
            .find_first_non_zero_basis_function(u, tolerance)?;
        let origin = Index::new(&self.parameter_space.number_of_basis_functions(), &first);
        Ok(self.combine(&values, &origin, self.parametric_dimensionality() - 1))
    }

    /// Contract the basis values of `dimension` and all lower dimensions against the control
    /// window whose higher coordinates are fixed by `origin`
    fn combine(&self, values: &[Vec<T>], origin: &Index, dimension: usize) -> DVector<T> {
        let storage = self.vector_space.storage();
        let start = origin.coordinate(dimension);
        values[dimension].iter().enumerate().fold(
            DVector::zeros(storage.dimensionality()),
            |acc, (j, value)| {
                if *value == T::zero() {
                    return acc;
                }
                let index = origin.with_coordinate(dimension, start + j);
                let term = if dimension == 0 {
                    storage[index.offset()].clone()
                } else {
                    self.combine(values, &index, dimension - 1)
                };
                acc + term * *value
            },
        )
    }

    /// Parametric coordinates of a regular grid over the domain with `counts[d]` samples
    /// along dimension `d`, the first dimension varying fastest
    pub fn sample_parameters(&self, counts: &[usize]) -> SplineResult<Vec<Vec<T>>> {
        if counts.len() != self.parametric_dimensionality() {
            return Err(SplineError::invalid_argument(format!(
                "{} sample counts were provided for {} parametric dimensions",
                counts.len(),
                self.parametric_dimensionality()
            )));
        }
        if counts.iter().any(|c| *c == 0) {
            return Err(SplineError::invalid_argument(
                "every dimension needs at least one sample",
            ));
        }
        let domain = self.domain();
        let extents = IndexLength::new(counts.to_vec());
        Ok(grid_points(&extents)
            .map(|index| {
                index
                    .value()
                    .iter()
                    .zip(domain.iter().zip(counts.iter()))
                    .map(|(i, ((lower, upper), count))| {
                        if *count == 1 {
                            *lower
                        } else {
                            let t = from_usize::<T>(*i) / from_usize::<T>(count - 1);
                            *lower + (*upper - *lower) * t
                        }
                    })
                    .collect()
            })
            .collect())
    }

    fn check_dimension(&self, dimension: usize) -> SplineResult<()> {
        if dimension >= self.parametric_dimensionality() {
            return Err(SplineError::dimension_out_of_range(
                dimension,
                self.parametric_dimensionality(),
            ));
        }
        Ok(())
    }

    fn snapshot(&self) -> (ParameterSpace<T>, V) {
        (self.parameter_space.clone(), self.vector_space.clone())
    }

    fn restore(&mut self, snapshot: (ParameterSpace<T>, V)) {
        self.parameter_space = snapshot.0;
        self.vector_space = snapshot.1;
    }

    /// Insert `knot` `multiplicity` times along `dimension` without changing the geometry
    /// # Failures
    /// - if `dimension` is out of range
    /// - if `multiplicity` is zero or `tolerance` negative
    /// - if `knot` lies outside the domain
    /// - if the multiplicity of `knot` would exceed `degree + 1`
    pub fn insert_knot(
        &mut self,
        dimension: usize,
        knot: T,
        multiplicity: usize,
        tolerance: T,
    ) -> SplineResult<()> {
        let steps = self
            .parameter_space
            .insert_knot(dimension, knot, multiplicity, tolerance)?;
        #[cfg(feature = "log")]
        log::debug!(
            "inserting knot {} {} times along dimension {}",
            knot,
            multiplicity,
            dimension
        );

        let mut extents = self.parameter_space.number_of_basis_functions();
        extents[dimension] -= steps.len();
        for step in steps.iter() {
            extents[dimension] += 1;
            self.apply_insertion(dimension, step, &extents);
        }
        Ok(())
    }

    /// Insert every knot of `knots` once along `dimension`
    /// On failure the spline is left unchanged
    pub fn refine_knots(&mut self, dimension: usize, knots: &[T], tolerance: T) -> SplineResult<()> {
        let snapshot = self.snapshot();
        for knot in knots {
            if let Err(error) = self.insert_knot(dimension, *knot, 1, tolerance) {
                self.restore(snapshot);
                return Err(error);
            }
        }
        Ok(())
    }

    /// Remove `knot` up to `multiplicity` times along `dimension`
    ///
    /// Every single removal is accepted only if the geometry changes by at most
    /// `removal_tolerance` on every line of control vectors; the first rejected removal is
    /// undone and ends the operation. Deviations at the level of floating point rounding
    /// are always tolerated, so a knot added by `insert_knot` can be removed with a
    /// `removal_tolerance` of zero. Returns the number of accepted removals.
    /// # Failures
    /// - if `dimension` is out of range
    /// - if `multiplicity` is zero or a tolerance negative
    /// - if `knot` does not lie strictly inside the domain
    pub fn remove_knot(
        &mut self,
        dimension: usize,
        knot: T,
        removal_tolerance: T,
        multiplicity: usize,
        tolerance: T,
    ) -> SplineResult<usize> {
        self.check_dimension(dimension)?;
        ensure_tolerance(removal_tolerance)?;
        if multiplicity == 0 {
            return Err(SplineError::invalid_argument("multiplicity must be positive"));
        }

        let mut removed = 0;
        for _ in 0..multiplicity {
            let snapshot = self.snapshot();
            let steps = self
                .parameter_space
                .remove_knot(dimension, knot, 1, tolerance)?;
            let Some(step) = steps.first() else {
                break;
            };
            let mut extents = self.parameter_space.number_of_basis_functions();
            extents[dimension] += 1;
            if !self.apply_removal(dimension, step, removal_tolerance, &extents) {
                #[cfg(feature = "log")]
                log::debug!(
                    "knot {} along dimension {} is not removable within {}",
                    knot,
                    dimension,
                    removal_tolerance
                );
                self.restore(snapshot);
                break;
            }
            removed += 1;
        }
        #[cfg(feature = "log")]
        log::debug!(
            "removed knot {} {} of {} times along dimension {}",
            knot,
            removed,
            multiplicity,
            dimension
        );
        Ok(removed)
    }

    /// Remove every knot of `knots` once along `dimension` within `tolerance`
    /// Returns the number of accepted removals
    pub fn coarsen_knots(
        &mut self,
        dimension: usize,
        knots: &[T],
        tolerance: T,
    ) -> SplineResult<usize> {
        knots.iter().try_fold(0, |removed, knot| {
            Ok(removed + self.remove_knot(dimension, *knot, tolerance, 1, tolerance)?)
        })
    }

    /// Insert knots along `dimension` until every interior knot has multiplicity `degree`
    /// Returns the number of Bezier segments and the inserted knots
    /// # Failures
    /// - if the basis of `dimension` is not clamped
    pub fn make_bezier(
        &mut self,
        dimension: usize,
        tolerance: T,
    ) -> SplineResult<BezierExtraction<T>> {
        let extraction = self
            .parameter_space
            .determine_bezier_extraction_knots(dimension, tolerance)?;
        self.refine_knots(dimension, extraction.knots(), tolerance)?;
        Ok(extraction)
    }

    /// Raise the degree along `dimension` by `multiplicity` without changing the geometry
    /// # Failures
    /// - if `dimension` is out of range
    /// - if `multiplicity` is zero or `tolerance` negative
    /// - if the basis of `dimension` is not clamped
    pub fn elevate_degree(
        &mut self,
        dimension: usize,
        multiplicity: usize,
        tolerance: T,
    ) -> SplineResult<()> {
        self.check_dimension(dimension)?;
        ensure_tolerance(tolerance)?;
        if multiplicity == 0 {
            return Err(SplineError::invalid_argument("multiplicity must be positive"));
        }

        let snapshot = self.snapshot();
        let extraction = self.make_bezier(dimension, tolerance)?;
        let change = match self.parameter_space.elevate_degree(dimension, multiplicity) {
            Ok(change) => change,
            Err(error) => {
                self.restore(snapshot);
                return Err(error);
            }
        };
        #[cfg(feature = "log")]
        log::debug!(
            "elevating degree {} -> {} along dimension {} over {} segments",
            change.lower_degree(),
            change.higher_degree(),
            dimension,
            extraction.segments()
        );
        self.apply_elevation(dimension, &change);

        self.coarsen_knots(dimension, extraction.knots(), tolerance)?;
        Ok(())
    }

    /// Lower the degree along `dimension` by `multiplicity`
    ///
    /// The reduction is accepted only if every Bezier segment is reproduced within
    /// `reduction_tolerance`; otherwise the spline is left unchanged and `false` returned.
    /// # Failures
    /// - if `dimension` is out of range
    /// - if `multiplicity` is zero or greater than the degree
    /// - if a tolerance is negative
    /// - if the basis of `dimension` is not clamped
    pub fn reduce_degree(
        &mut self,
        dimension: usize,
        reduction_tolerance: T,
        multiplicity: usize,
        tolerance: T,
    ) -> SplineResult<bool> {
        self.check_dimension(dimension)?;
        ensure_tolerance(reduction_tolerance)?;
        ensure_tolerance(tolerance)?;
        let degree = self.degrees()[dimension];
        if multiplicity == 0 || multiplicity > degree {
            return Err(SplineError::invalid_argument(format!(
                "cannot reduce degree {} by {}",
                degree, multiplicity
            )));
        }

        let snapshot = self.snapshot();
        let extraction = self.make_bezier(dimension, tolerance)?;
        let mut inserted = extraction.knots().to_vec();
        if multiplicity == degree {
            // separate the segments, each one collapses to a single point
            let shared = self
                .parameter_space
                .basis(dimension)?
                .shared_segment_knots();
            if let Err(error) = self.refine_knots(dimension, &shared, tolerance) {
                self.restore(snapshot);
                return Err(error);
            }
            inserted.extend(shared);
        }
        let change = match self.parameter_space.reduce_degree(dimension, multiplicity) {
            Ok(change) => change,
            Err(error) => {
                self.restore(snapshot);
                return Err(error);
            }
        };
        if !self.apply_reduction(dimension, &change, reduction_tolerance) {
            #[cfg(feature = "log")]
            log::debug!(
                "degree {} along dimension {} is not reducible by {} within {}",
                degree,
                dimension,
                multiplicity,
                reduction_tolerance
            );
            self.restore(snapshot);
            return Ok(false);
        }

        self.coarsen_knots(dimension, &inserted, tolerance)?;
        Ok(true)
    }

    /// Upper bound of the distance of any point of the spline from the origin
    pub fn compute_upper_bound_for_maximum_distance_from_origin(
        &self,
        tolerance: T,
    ) -> SplineResult<T> {
        ensure_tolerance(tolerance)?;
        Ok(self.vector_space.determine_maximum_distance_from_origin())
    }

    /// Replay a single knot insertion; `extents` are the extents after the insertion
    fn apply_insertion(&mut self, dimension: usize, step: &KnotInsertion<T>, extents: &IndexLength) {
        let storage = self.vector_space.storage_mut();
        let position = step.position();
        insert_layer(storage, extents, dimension, position);
        for line in lines(extents, dimension) {
            let at = |i: usize| line.with_coordinate(dimension, i).offset();
            let duplicate = storage[at(position + 1)].clone();
            storage.replace(at(position), duplicate);
            for (i, alpha) in step.blends().rev() {
                let blended =
                    &storage[at(i)] * alpha + &storage[at(i - 1)] * (T::one() - alpha);
                storage.replace(at(i), blended);
            }
        }
    }

    /// Undo a single knot insertion if every line stays within `removal_tolerance`;
    /// `extents` are the extents before the removal
    fn apply_removal(
        &mut self,
        dimension: usize,
        step: &KnotInsertion<T>,
        removal_tolerance: T,
        extents: &IndexLength,
    ) -> bool {
        let storage = self.vector_space.storage_mut();
        let position = step.position();
        let starts = lines(extents, dimension);

        let epsilon = T::default_epsilon();
        let safety = from_usize::<T>(ROUNDING_SAFETY_FACTOR);
        let mut updates = Vec::with_capacity(starts.len());
        for line in starts.iter() {
            let at = |i: usize| line.with_coordinate(dimension, i).offset();
            let mut previous = storage[at(step.start() - 1)].clone();
            // bound of the rounding error carried by `previous`
            let mut rounding = epsilon * previous.norm();
            let mut points = Vec::with_capacity(step.alphas().len());
            for (i, alpha) in step.blends() {
                let current = &storage[at(i)];
                let point = (current - &previous * (T::one() - alpha)) / alpha;
                rounding = (epsilon * (current.norm() + previous.norm() + point.norm())
                    + rounding * (T::one() - alpha))
                    / alpha;
                points.push(point.clone());
                previous = point;
            }
            let next = &storage[at(position + 1)];
            let slack = safety * (rounding + epsilon * next.norm());
            if (&previous - next).norm() > removal_tolerance + slack {
                return false;
            }
            updates.push(points);
        }

        for (line, points) in starts.iter().zip(updates) {
            for (k, point) in points.into_iter().enumerate() {
                storage.replace(line.with_coordinate(dimension, step.start() + k).offset(), point);
            }
        }
        erase_layer(storage, extents, dimension, position + 1);
        true
    }

    /// Elevate every Bezier segment along `dimension`
    fn apply_elevation(&mut self, dimension: usize, change: &DegreeChange<T>) {
        let p = change.lower_degree();
        let m = change.multiplicity();
        let coefficients = change.coefficients();
        let mut extents = self.parameter_space.number_of_basis_functions();
        extents[dimension] -= change.segment_starts().len() * m;

        let storage = self.vector_space.storage_mut();
        // degree 0 segments have no trailing point to shift, every new point is filled
        let last = if p == 0 { m } else { p + m - 1 };
        for &first in change.segment_starts().iter().rev() {
            for _ in 0..m {
                extents[dimension] += 1;
                insert_layer(storage, &extents, dimension, first + 1);
            }
            for line in lines(&extents, dimension) {
                let at = |i: usize| line.with_coordinate(dimension, i).offset();
                let lower = (0..=p)
                    .map(|k| storage[at(if k == 0 { first } else { first + m + k })].clone())
                    .collect_vec();
                for i in 1..=last {
                    let point = blend(&coefficients[i], &lower);
                    storage.replace(at(first + i), point);
                }
            }
        }
    }

    /// Reduce every Bezier segment along `dimension`, stopping at the first segment that is
    /// not reproduced within `reduction_tolerance`
    fn apply_reduction(
        &mut self,
        dimension: usize,
        change: &DegreeChange<T>,
        reduction_tolerance: T,
    ) -> bool {
        let q = change.lower_degree();
        let m = change.multiplicity();
        let coefficients = change.coefficients();
        let mut extents = self.parameter_space.number_of_basis_functions();
        extents[dimension] += change.segment_starts().len() * m;

        let storage = self.vector_space.storage_mut();
        for &first in change.segment_starts().iter().rev() {
            let starts = lines(&extents, dimension);
            let mut updates = Vec::with_capacity(starts.len());
            for line in starts.iter() {
                let at = |i: usize| line.with_coordinate(dimension, i).offset();
                let higher = (0..=(q + m))
                    .map(|i| storage[at(first + i)].clone())
                    .collect_vec();
                let Some(lower) = reduce_segment(coefficients, &higher, q, reduction_tolerance)
                else {
                    return false;
                };
                updates.push(lower);
            }

            for (line, lower) in starts.iter().zip(updates) {
                for (k, point) in lower.into_iter().enumerate().take(q).skip(1) {
                    storage.replace(line.with_coordinate(dimension, first + k).offset(), point);
                }
            }
            for _ in 0..m {
                erase_layer(storage, &extents, dimension, first + q);
                extents[dimension] -= 1;
            }
        }
        true
    }
}

/// Multiple of the estimated rounding error a knot removal may deviate by on top of the
/// removal tolerance
const ROUNDING_SAFETY_FACTOR: usize = 32;

/// Flat indices of the first vector of every line along `dimension`
fn lines(extents: &IndexLength, dimension: usize) -> Vec<Index> {
    let slice = extents.slice(dimension);
    grid_points(&slice)
        .map(|index| index.reshaped(extents))
        .collect()
}

/// Insert a layer of zero vectors at `position` along `dimension`
/// `extents` are the extents after the insertion
fn insert_layer<T: FloatingPoint>(
    storage: &mut VectorSpace<T>,
    extents: &IndexLength,
    dimension: usize,
    position: usize,
) {
    let zero = DVector::zeros(storage.dimensionality());
    for line in lines(extents, dimension) {
        let offset = line.with_coordinate(dimension, position).offset();
        storage.reallocate_insert(offset, zero.clone());
    }
}

/// Erase the layer at `position` along `dimension`
/// `extents` are the extents before the erasure
fn erase_layer<T: FloatingPoint>(
    storage: &mut VectorSpace<T>,
    extents: &IndexLength,
    dimension: usize,
    position: usize,
) {
    for line in lines(extents, dimension).iter().rev() {
        storage.erase(line.with_coordinate(dimension, position).offset());
    }
}

fn blend<T: FloatingPoint>(coefficients: &[T], points: &[DVector<T>]) -> DVector<T> {
    points
        .iter()
        .zip(coefficients.iter())
        .fold(DVector::zeros(points[0].len()), |acc, (point, c)| {
            acc + point * *c
        })
}

/// Invert the elevation of a Bezier segment keeping both end points (the last one for
/// degree 0)
/// Returns `None` if the points dropped by the reduction are not reproduced within `tolerance`
fn reduce_segment<T: FloatingPoint>(
    coefficients: &[Vec<T>],
    higher: &[DVector<T>],
    q: usize,
    tolerance: T,
) -> Option<Vec<DVector<T>>> {
    let m = higher.len() - 1 - q;
    let lower = if q == 0 {
        // a constant segment, kept as the point that survives the erasure
        vec![higher[m].clone()]
    } else {
        let mut lower = Vec::with_capacity(q + 1);
        lower.push(higher[0].clone());
        for i in 1..q {
            let known = blend(&coefficients[i][..i], &lower);
            lower.push((&higher[i] - known) / coefficients[i][i]);
        }
        lower.push(higher[q + m].clone());
        lower
    };

    (q..(q + m))
        .all(|i| (blend(&coefficients[i], &lower) - &higher[i]).norm() <= tolerance)
        .then_some(lower)
}
