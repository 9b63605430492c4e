/// A distinct knot value together with its multiplicity and the index of its first
/// occurrence in the knot vector
#[derive(Clone, Debug, PartialEq)]
pub struct KnotMultiplicity<T> {
    knot: T,
    first_index: usize,
    multiplicity: usize,
}

impl<T> KnotMultiplicity<T> {
    pub fn new(knot: T, first_index: usize, multiplicity: usize) -> Self {
        Self {
            knot,
            first_index,
            multiplicity,
        }
    }

    pub fn knot(&self) -> &T {
        &self.knot
    }

    pub fn multiplicity(&self) -> usize {
        self.multiplicity
    }

    pub fn first_index(&self) -> usize {
        self.first_index
    }

    /// Index of the last occurrence of the knot
    pub fn last_index(&self) -> usize {
        self.first_index + self.multiplicity - 1
    }

    pub fn increment_multiplicity(&mut self) {
        self.multiplicity += 1;
    }
}
