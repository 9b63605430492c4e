use std::collections::HashMap;

use crate::knot::KnotVector;
use crate::misc::{from_usize, FloatingPoint};

/// Memo of evaluated nodes of a basis function tree keyed by
/// `(start knot index, degree, derivative order)`
pub type BasisEvaluationCache<T> = HashMap<(usize, usize, usize), T>;

/// A single B-spline basis function `N_{start, degree}` of one parametric dimension
///
/// The function is the root of a Cox–de Boor tree: every node of degree `p > 0` blends the
/// two nodes `N_{start, p-1}` and `N_{start+1, p-1}`, and the leaves of degree 0 are
/// indicator functions of single knot spans. Siblings share children, so evaluations are
/// memoized in a cache passed through the recursion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BasisFunction {
    start: usize,
    degree: usize,
}

impl BasisFunction {
    pub fn new(start: usize, degree: usize) -> Self {
        Self { start, degree }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// The knot interval `[knots[start], knots[start + degree + 1]]` outside which the
    /// function vanishes
    pub fn support<T: FloatingPoint>(&self, knots: &KnotVector<T>) -> (T, T) {
        (knots[self.start], knots[self.start + self.degree + 1])
    }

    /// Evaluate the `derivative`-th derivative of the function at `u`
    pub fn evaluate<T: FloatingPoint>(
        &self,
        knots: &KnotVector<T>,
        u: T,
        derivative: usize,
        tolerance: T,
        cache: &mut BasisEvaluationCache<T>,
    ) -> T {
        let u = knots.snap(u, tolerance);
        evaluate_node(knots, self.start, self.degree, u, derivative, cache)
    }
}

fn evaluate_node<T: FloatingPoint>(
    knots: &KnotVector<T>,
    start: usize,
    degree: usize,
    u: T,
    derivative: usize,
    cache: &mut BasisEvaluationCache<T>,
) -> T {
    if let Some(&value) = cache.get(&(start, degree, derivative)) {
        return value;
    }

    let value = if degree == 0 {
        if derivative == 0 {
            indicator(knots, start, u)
        } else {
            T::zero()
        }
    } else if derivative > degree {
        T::zero()
    } else {
        let left_denominator = knots[start + degree] - knots[start];
        let right_denominator = knots[start + degree + 1] - knots[start + 1];
        if derivative == 0 {
            let left = if left_denominator > T::zero() {
                (u - knots[start]) / left_denominator
                    * evaluate_node(knots, start, degree - 1, u, 0, cache)
            } else {
                T::zero()
            };
            let right = if right_denominator > T::zero() {
                (knots[start + degree + 1] - u) / right_denominator
                    * evaluate_node(knots, start + 1, degree - 1, u, 0, cache)
            } else {
                T::zero()
            };
            left + right
        } else {
            let p: T = from_usize(degree);
            let left = if left_denominator > T::zero() {
                p / left_denominator
                    * evaluate_node(knots, start, degree - 1, u, derivative - 1, cache)
            } else {
                T::zero()
            };
            let right = if right_denominator > T::zero() {
                p / right_denominator
                    * evaluate_node(knots, start + 1, degree - 1, u, derivative - 1, cache)
            } else {
                T::zero()
            };
            left - right
        }
    };

    cache.insert((start, degree, derivative), value);
    value
}

/// Degree-0 leaf: 1 on `[knots[i], knots[i+1])`, closed on the right when the span ends
/// at the last knot, 0 on empty spans
fn indicator<T: FloatingPoint>(knots: &KnotVector<T>, i: usize, u: T) -> T {
    let (a, b) = (knots[i], knots[i + 1]);
    if a >= b {
        return T::zero();
    }
    if (a <= u && u < b) || (u == b && b == knots.last()) {
        T::one()
    } else {
        T::zero()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn degree_zero_indicators() {
        let knots = KnotVector::try_new(vec![0., 0., 1., 2., 2.]).unwrap();
        let mut cache = BasisEvaluationCache::new();
        let mut eval = |i: usize, u: f64, d: usize| {
            cache.clear();
            BasisFunction::new(i, 0).evaluate(&knots, u, d, 0., &mut cache)
        };
        assert_eq!((eval(1, 1.5, 0), eval(2, 1.5, 0)), (0., 1.));
        assert_eq!((eval(1, 0.5, 0), eval(2, 0.5, 0)), (1., 0.));
        assert_eq!((eval(1, 1.0, 0), eval(2, 1.0, 0)), (0., 1.));
        assert_eq!((eval(1, 2.0, 0), eval(2, 2.0, 0)), (0., 1.));
        // empty spans
        assert_eq!(eval(0, 0.0, 0), 0.);
        assert_eq!(eval(3, 2.0, 0), 0.);
        for u in [0.0, 0.5, 1.0, 1.5, 2.0] {
            assert_eq!((eval(1, u, 1), eval(2, u, 1)), (0., 0.));
        }
    }

    #[test]
    fn quadratic_bernstein_values() {
        let knots = KnotVector::try_new(vec![0., 0., 0., 1., 1., 1.]).unwrap();
        let mut cache = BasisEvaluationCache::new();
        let u = 0.3;
        let values: Vec<f64> = (0..3)
            .map(|i| BasisFunction::new(i, 2).evaluate(&knots, u, 0, 0., &mut cache))
            .collect();
        assert_relative_eq!(values[0], 0.49, epsilon = 1e-12);
        assert_relative_eq!(values[1], 0.42, epsilon = 1e-12);
        assert_relative_eq!(values[2], 0.09, epsilon = 1e-12);

        let derivative = BasisFunction::new(1, 2).evaluate(&knots, u, 1, 0., &mut cache);
        // d/du 2u(1-u)
        assert_relative_eq!(derivative, 2. - 4. * u, epsilon = 1e-12);
        let second = BasisFunction::new(0, 2).evaluate(&knots, u, 2, 0., &mut cache);
        assert_relative_eq!(second, 2.0, epsilon = 1e-12);
        assert_eq!(
            BasisFunction::new(0, 2).evaluate(&knots, u, 3, 0., &mut cache),
            0.0
        );
    }

    #[test]
    fn cache_is_shared_between_siblings() {
        let knots = KnotVector::try_new(vec![0., 0., 0., 0.5, 1., 1., 1.]).unwrap();
        let mut cache = BasisEvaluationCache::new();
        BasisFunction::new(0, 2).evaluate(&knots, 0.25, 0, 0., &mut cache);
        let after_first = cache.len();
        BasisFunction::new(1, 2).evaluate(&knots, 0.25, 0, 0., &mut cache);
        // N_{1,1} is shared, only N_{1,2}, N_{2,1}, N_{2,0} and N_{3,0} are new
        assert!(cache.len() - after_first <= 4);
        assert_eq!(
            BasisFunction::new(1, 2).support(&knots),
            (0.0, 1.0)
        );
    }
}
