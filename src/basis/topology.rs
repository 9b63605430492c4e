/// Blending coefficients of inserting a single knot (Boehm's algorithm)
///
/// With old control points `P` along the edited dimension, the new points are
/// - `Q[i] = P[i]` for `i < start`
/// - `Q[i] = alphas[i - start] * P[i] + (1 - alphas[i - start]) * P[i - 1]` for `start <= i <= position`
/// - `Q[i] = P[i - 1]` for `i > position`
///
/// i.e. one point is inserted at `position`. When `alphas` is empty the point at `position`
/// is duplicated. Knot removal applies the same record backwards.
#[derive(Clone, Debug, PartialEq)]
pub struct KnotInsertion<T> {
    start: usize,
    alphas: Vec<T>,
}

impl<T: Copy> KnotInsertion<T> {
    pub fn new(start: usize, alphas: Vec<T>) -> Self {
        debug_assert!(start >= 1);
        Self { start, alphas }
    }

    /// Index of the first blended control point
    pub fn start(&self) -> usize {
        self.start
    }

    /// Index at which a control point is added
    pub fn position(&self) -> usize {
        self.start + self.alphas.len() - 1
    }

    pub fn alphas(&self) -> &[T] {
        &self.alphas
    }

    /// Iterate over `(control point index, alpha)` pairs
    pub fn blends(&self) -> impl DoubleEndedIterator<Item = (usize, T)> + '_ {
        self.alphas
            .iter()
            .enumerate()
            .map(move |(i, a)| (self.start + i, *a))
    }
}

/// Knots to insert so that a clamped dimension decomposes into Bezier segments
#[derive(Clone, Debug, PartialEq)]
pub struct BezierExtraction<T> {
    segments: usize,
    knots: Vec<T>,
}

impl<T> BezierExtraction<T> {
    pub fn new(segments: usize, knots: Vec<T>) -> Self {
        Self { segments, knots }
    }

    /// Number of Bezier segments after the insertion
    pub fn segments(&self) -> usize {
        self.segments
    }

    /// Knots to insert, repeated by the missing multiplicity
    pub fn knots(&self) -> &[T] {
        &self.knots
    }

    pub fn into_parts(self) -> (usize, Vec<T>) {
        (self.segments, self.knots)
    }
}

/// Binomial blending table relating Bezier control points of two degrees
///
/// `coefficients[i][j]` is the weight of lower-degree point `j` in higher-degree point `i`
/// of the same Bezier segment. Elevation evaluates the table forwards, reduction inverts it.
#[derive(Clone, Debug, PartialEq)]
pub struct DegreeChange<T> {
    segment_starts: Vec<usize>,
    lower_degree: usize,
    multiplicity: usize,
    coefficients: Vec<Vec<T>>,
}

impl<T> DegreeChange<T> {
    pub fn new(
        segment_starts: Vec<usize>,
        lower_degree: usize,
        multiplicity: usize,
        coefficients: Vec<Vec<T>>,
    ) -> Self {
        Self {
            segment_starts,
            lower_degree,
            multiplicity,
            coefficients,
        }
    }

    /// Index of the first control point of every Bezier segment before the change
    pub fn segment_starts(&self) -> &[usize] {
        &self.segment_starts
    }

    pub fn lower_degree(&self) -> usize {
        self.lower_degree
    }

    pub fn higher_degree(&self) -> usize {
        self.lower_degree + self.multiplicity
    }

    /// Degree difference
    pub fn multiplicity(&self) -> usize {
        self.multiplicity
    }

    pub fn coefficients(&self) -> &[Vec<T>] {
        &self.coefficients
    }
}
