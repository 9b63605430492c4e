use std::collections::HashMap;

use nalgebra::RealField;

/// A memoized binomial coefficient calculator.
/// Pascal's rule is applied recursively and every intermediate coefficient is kept.
#[derive(Clone, Debug, Default)]
pub struct Binomial<T> {
    memo: HashMap<(usize, usize), T>,
}

impl<T: RealField + Copy> Binomial<T> {
    pub fn new() -> Self {
        Self {
            memo: HashMap::new(),
        }
    }

    /// Returns the binomial coefficient of `n` and `k` with memoization.
    pub fn get(&mut self, n: usize, k: usize) -> T {
        if k > n {
            return T::zero();
        } else if k == 0 || k == n {
            return T::one();
        }

        let k = k.min(n - k);
        if let Some(&memoized) = self.memo.get(&(n, k)) {
            return memoized;
        }

        let r = self.get(n - 1, k) + self.get(n - 1, k - 1);
        self.memo.insert((n, k), r);
        r
    }

    /// Ratio of binomial coefficients used to blend Bezier control points when the
    /// degree changes from `degree` to `degree + increment`:
    /// `C(degree, j) * C(increment, i - j) / C(degree + increment, i)`
    pub fn elevation_ratio(&mut self, degree: usize, increment: usize, i: usize, j: usize) -> T {
        if j > i || j > degree || i - j > increment {
            return T::zero();
        }
        self.get(degree, j) * self.get(increment, i - j) / self.get(degree + increment, i)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    #[test]
    fn test_memoized_binomial() {
        let mut binomial = super::Binomial::<f64>::new();
        let row: Vec<f64> = (0..=6).map(|k| binomial.get(5, k)).collect();
        assert_eq!(row, vec![1., 5., 10., 10., 5., 1., 0.]);
        assert_eq!(binomial.get(10, 3), 120.);
        assert_eq!(binomial.get(10, 7), 120.);
    }

    #[test]
    fn elevation_ratios_form_an_affine_combination() {
        let mut binomial = super::Binomial::<f64>::new();
        let (degree, increment) = (3, 2);
        for i in 0..=(degree + increment) {
            let sum: f64 = (0..=degree)
                .map(|j| binomial.elevation_ratio(degree, increment, i, j))
                .sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        }
        assert_eq!(binomial.elevation_ratio(1, 1, 0, 1), 0.0);
        assert_relative_eq!(binomial.elevation_ratio(1, 1, 1, 0), 0.5);
    }
}
