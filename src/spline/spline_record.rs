/// Plain description of a spline as returned by `write`
///
/// `coordinates` hold the projected control points (the first parametric dimension varying
/// fastest) and `weights` is `Some` only for rational splines.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SplineRecord<T> {
    pub degrees: Vec<usize>,
    pub knot_vectors: Vec<Vec<T>>,
    pub coordinates: Vec<Vec<T>>,
    pub weights: Option<Vec<T>>,
}

impl<T> SplineRecord<T> {
    pub fn parametric_dimensionality(&self) -> usize {
        self.degrees.len()
    }

    pub fn is_rational(&self) -> bool {
        self.weights.is_some()
    }
}
