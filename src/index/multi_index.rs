use std::ops::{Deref, DerefMut};

/// Per-dimension extents of a grid of basis functions or control points
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexLength(Vec<usize>);

impl IndexLength {
    pub fn new(extents: Vec<usize>) -> Self {
        Self(extents)
    }

    /// Total number of grid points
    pub fn product(&self) -> usize {
        self.0.iter().product()
    }

    /// Extents of the slice orthogonal to `dimension`
    /// i.e. every grid point sharing all coordinates except the one along `dimension`
    pub fn slice(&self, dimension: usize) -> Self {
        let mut extents = self.0.clone();
        extents[dimension] = 1;
        Self(extents)
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.0.clone()
    }
}

impl Deref for IndexLength {
    type Target = [usize];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for IndexLength {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<usize>> for IndexLength {
    fn from(value: Vec<usize>) -> Self {
        Self(value)
    }
}

/// Per-dimension coordinates of a grid point
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexValue(Vec<usize>);

impl IndexValue {
    pub fn new(value: Vec<usize>) -> Self {
        Self(value)
    }

    pub fn zeros(dimensionality: usize) -> Self {
        Self(vec![0; dimensionality])
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.0.clone()
    }
}

impl Deref for IndexValue {
    type Target = [usize];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for IndexValue {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<usize>> for IndexValue {
    fn from(value: Vec<usize>) -> Self {
        Self(value)
    }
}

/// Position inside a dynamically shaped multi-dimensional grid
///
/// The flat offset is computed with strides where the first dimension varies fastest.
/// Besides valid positions an index can be one of the sentinels `before` (offset -1) and
/// `behind` (offset == product of extents), which bound loops over the grid.
/// Moving further than the sentinels is a programming error.
///
/// # Example
/// ```
/// use bsplinekit::prelude::*;
/// let extents = IndexLength::new(vec![3, 2]);
/// let mut index = Index::first(&extents);
/// let mut offsets = vec![];
/// while index != Index::behind(&extents) {
///     offsets.push((index.offset(), index.value().to_vec()));
///     index.increment();
/// }
/// assert_eq!(offsets.len(), 6);
/// assert_eq!(offsets[4], (4, vec![1, 1]));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Index {
    extents: IndexLength,
    strides: Vec<usize>,
    offset: isize,
}

impl Index {
    /// Create an index pointing to `value` inside a grid of `extents`
    pub fn new(extents: &IndexLength, value: &[usize]) -> Self {
        debug_assert_eq!(extents.len(), value.len());
        let strides = Self::strides(extents);
        let offset = value
            .iter()
            .zip(strides.iter())
            .zip(extents.iter())
            .map(|((v, s), e)| {
                debug_assert!(v < e, "coordinate {} exceeds extent {}", v, e);
                v * s
            })
            .sum::<usize>();
        Self {
            extents: extents.clone(),
            strides,
            offset: offset as isize,
        }
    }

    /// The first grid point
    pub fn first(extents: &IndexLength) -> Self {
        Self::with_offset(extents, 0)
    }

    /// The last grid point
    pub fn last(extents: &IndexLength) -> Self {
        Self::with_offset(extents, extents.product() as isize - 1)
    }

    /// Sentinel one step behind the last grid point
    pub fn behind(extents: &IndexLength) -> Self {
        Self::with_offset(extents, extents.product() as isize)
    }

    /// Sentinel one step before the first grid point
    pub fn before(extents: &IndexLength) -> Self {
        Self::with_offset(extents, -1)
    }

    fn with_offset(extents: &IndexLength, offset: isize) -> Self {
        Self {
            extents: extents.clone(),
            strides: Self::strides(extents),
            offset,
        }
    }

    fn strides(extents: &IndexLength) -> Vec<usize> {
        let mut stride = 1;
        extents
            .iter()
            .map(|e| {
                let current = stride;
                stride *= e;
                current
            })
            .collect()
    }

    pub fn extents(&self) -> &IndexLength {
        &self.extents
    }

    /// Flat offset into the storage
    pub fn offset(&self) -> usize {
        debug_assert!(self.is_valid(), "sentinel index has no storage offset");
        self.offset as usize
    }

    /// Whether the index addresses a grid point rather than a sentinel
    pub fn is_valid(&self) -> bool {
        self.offset >= 0 && (self.offset as usize) < self.extents.product()
    }

    /// Per-dimension coordinates of the grid point
    pub fn value(&self) -> IndexValue {
        let offset = self.offset();
        IndexValue::new(
            self.strides
                .iter()
                .zip(self.extents.iter())
                .map(|(s, e)| (offset / s) % e)
                .collect(),
        )
    }

    /// Coordinate along a single dimension
    pub fn coordinate(&self, dimension: usize) -> usize {
        (self.offset() / self.strides[dimension]) % self.extents[dimension]
    }

    /// Step to the next grid point in flat order
    pub fn increment(&mut self) -> &mut Self {
        debug_assert!(self.offset < self.extents.product() as isize);
        self.offset += 1;
        self
    }

    /// Step to the previous grid point in flat order
    pub fn decrement(&mut self) -> &mut Self {
        debug_assert!(self.offset >= 0);
        self.offset -= 1;
        self
    }

    /// Step forward along `dimension` only
    pub fn increment_along(&mut self, dimension: usize) -> &mut Self {
        debug_assert!(self.coordinate(dimension) + 1 < self.extents[dimension]);
        self.offset += self.strides[dimension] as isize;
        self
    }

    /// Step backward along `dimension` only
    pub fn decrement_along(&mut self, dimension: usize) -> &mut Self {
        debug_assert!(self.coordinate(dimension) > 0);
        self.offset -= self.strides[dimension] as isize;
        self
    }

    /// Move to `coordinate` along `dimension` keeping all other coordinates
    pub fn with_coordinate(&self, dimension: usize, coordinate: usize) -> Self {
        debug_assert!(coordinate < self.extents[dimension]);
        let current = self.coordinate(dimension) as isize;
        let stride = self.strides[dimension] as isize;
        Self {
            extents: self.extents.clone(),
            strides: self.strides.clone(),
            offset: self.offset + (coordinate as isize - current) * stride,
        }
    }

    /// Re-express the coordinates of this index inside a grid of other extents
    pub fn reshaped(&self, extents: &IndexLength) -> Self {
        Self::new(extents, &self.value())
    }
}

/// Iterate over every grid point of `extents` in flat order
pub fn grid_points(extents: &IndexLength) -> impl Iterator<Item = Index> + '_ {
    let behind = Index::behind(extents);
    let mut current = Index::first(extents);
    std::iter::from_fn(move || {
        if current == behind {
            None
        } else {
            let next = current.clone();
            current.increment();
            Some(next)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_follow_first_dimension_fastest() {
        let extents = IndexLength::new(vec![2, 3, 4]);
        let index = Index::new(&extents, &[1, 2, 3]);
        assert_eq!(index.offset(), 1 + 2 * 2 + 3 * 6);
        assert_eq!(index.value().to_vec(), vec![1, 2, 3]);
        assert_eq!(Index::last(&extents).offset(), 23);
    }

    #[test]
    fn full_order_enumeration_is_bijective() {
        let extents = IndexLength::new(vec![3, 1, 2]);
        let offsets: Vec<_> = grid_points(&extents).map(|i| i.offset()).collect();
        assert_eq!(offsets, (0..6).collect::<Vec<_>>());

        let mut index = Index::last(&extents);
        let mut count = 0;
        while index != Index::before(&extents) {
            let value = index.value();
            assert_eq!(Index::new(&extents, &value).offset(), index.offset());
            index.decrement();
            count += 1;
        }
        assert_eq!(count, 6);
    }

    #[test]
    fn slices_enumerate_lines_along_a_dimension() {
        let extents = IndexLength::new(vec![3, 4]);
        let slice = extents.slice(1);
        assert_eq!(slice.to_vec(), vec![3, 1]);
        let lines: Vec<_> = grid_points(&slice)
            .map(|s| {
                let start = s.reshaped(&extents);
                let mut line = vec![start.offset()];
                let mut current = start.clone();
                for _ in 1..extents[1] {
                    current.increment_along(1);
                    line.push(current.offset());
                }
                line
            })
            .collect();
        assert_eq!(lines[0], vec![0, 3, 6, 9]);
        assert_eq!(lines[2], vec![2, 5, 8, 11]);
    }

    #[test]
    fn stepping_along_an_axis() {
        let extents = IndexLength::new(vec![3, 4]);
        let mut index = Index::new(&extents, &[1, 1]);
        index.increment_along(0).increment_along(1);
        assert_eq!(index.value().to_vec(), vec![2, 2]);
        index.decrement_along(1);
        assert_eq!(index.value().to_vec(), vec![2, 1]);
        assert_eq!(index.with_coordinate(1, 3).value().to_vec(), vec![2, 3]);
        assert_eq!(index.coordinate(0), 2);
    }

    #[test]
    fn sentinels_are_not_valid() {
        let extents = IndexLength::new(vec![2, 2]);
        assert!(!Index::before(&extents).is_valid());
        assert!(!Index::behind(&extents).is_valid());
        let mut index = Index::last(&extents);
        index.increment();
        assert_eq!(index, Index::behind(&extents));
    }
}
