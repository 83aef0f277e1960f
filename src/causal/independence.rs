use std::cell::Cell;
use std::collections::BTreeMap;

use super::Dataset;
use crate::special::chi_square_sf;

/// G² likelihood-ratio test of `x ⊥ y | z`, stratified on the observed
/// configurations of `z`.
#[derive(Debug)]
pub struct GSquareTest<'a> {
    data: &'a Dataset,
    alpha: f64,
    performed: Cell<usize>,
}

impl<'a> GSquareTest<'a> {
    pub fn new(data: &'a Dataset, alpha: f64) -> Self {
        Self {
            data,
            alpha,
            performed: Cell::new(0),
        }
    }

    /// Number of tests run so far.
    pub fn performed(&self) -> usize {
        self.performed.get()
    }

    /// Returns `(statistic, degrees of freedom)`.
    pub fn statistic(&self, x: usize, y: usize, z: &[usize]) -> (f64, f64) {
        let (lx, ly) = (self.data.levels[x], self.data.levels[y]);
        let xs = &self.data.columns[x];
        let ys = &self.data.columns[y];

        let mut strata: BTreeMap<Vec<u32>, Vec<f64>> = BTreeMap::new();
        for row in 0..self.data.len() {
            let key: Vec<u32> = z.iter().map(|v| self.data.columns[*v][row]).collect();
            let counts = strata.entry(key).or_insert_with(|| vec![0.0; lx * ly]);
            counts[xs[row] as usize * ly + ys[row] as usize] += 1.0;
        }

        let mut g2 = 0.0;
        let mut dof = 0.0;
        for counts in strata.values() {
            let row_totals: Vec<f64> = (0..lx)
                .map(|i| counts[i * ly..(i + 1) * ly].iter().sum())
                .collect();
            let col_totals: Vec<f64> = (0..ly)
                .map(|j| (0..lx).map(|i| counts[i * ly + j]).sum())
                .collect();
            let n: f64 = row_totals.iter().sum();

            for i in 0..lx {
                for j in 0..ly {
                    let observed = counts[i * ly + j];
                    if observed > 0.0 {
                        let expected = row_totals[i] * col_totals[j] / n;
                        g2 += 2.0 * observed * (observed / expected).ln();
                    }
                }
            }

            let rows = row_totals.iter().filter(|t| **t > 0.0).count();
            let cols = col_totals.iter().filter(|t| **t > 0.0).count();
            if rows > 1 && cols > 1 {
                dof += ((rows - 1) * (cols - 1)) as f64;
            }
        }
        (g2.max(0.0), dof)
    }

    /// Zero degrees of freedom counts as independence (p = 1).
    pub fn p_value(&self, x: usize, y: usize, z: &[usize]) -> f64 {
        self.performed.set(self.performed.get() + 1);
        let (g2, dof) = self.statistic(x, y, z);
        if dof == 0.0 {
            1.0
        } else {
            chi_square_sf(g2, dof)
        }
    }

    pub fn independent(&self, x: usize, y: usize, z: &[usize]) -> bool {
        self.p_value(x, y, z) > self.alpha
    }
}
