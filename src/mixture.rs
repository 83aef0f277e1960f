//! Two-component univariate Gaussian mixture fitted by expectation-maximisation.
//!
//! Initialisation follows k-means: a seeded D² draw of two centres refined by
//! Lloyd iterations, so the fit is reproducible for a given seed. Components
//! are returned ordered by mean.

use std::f64::consts::PI;

use num::Float;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::MixtureConfig;
use crate::error::{PipelineError, Result};

/// Variance floor added at every M-step.
const REG_VARIANCE: f64 = 1e-6;
const KMEANS_MAX_ITER: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct GaussianMixture {
    pub weights: [f64; 2],
    pub means: [f64; 2],
    pub variances: [f64; 2],
    pub log_likelihood: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl GaussianMixture {
    pub fn fit(values: &[f64], config: &MixtureConfig, seed: u64) -> Result<Self> {
        let values: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if values.len() < 2 {
            return Err(PipelineError::Empty(
                "mixture fit needs at least two finite values".into(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let assignment = kmeans_init(&values, &mut rng)?;

        let mut model = GaussianMixture {
            weights: [0.0; 2],
            means: [0.0; 2],
            variances: [0.0; 2],
            log_likelihood: f64::NEG_INFINITY,
            iterations: 0,
            converged: false,
        };
        let mut resp: Vec<[f64; 2]> = assignment
            .iter()
            .map(|&k| if k == 0 { [1.0, 0.0] } else { [0.0, 1.0] })
            .collect();
        model.m_step(&values, &resp);

        for iteration in 1..=config.max_iter {
            let log_likelihood = model.e_step(&values, &mut resp);
            model.m_step(&values, &resp);
            model.iterations = iteration;
            let change = (log_likelihood - model.log_likelihood).abs();
            model.log_likelihood = log_likelihood;
            if change < config.tolerance {
                model.converged = true;
                break;
            }
        }

        if model.means[0] > model.means[1] {
            model.weights.swap(0, 1);
            model.means.swap(0, 1);
            model.variances.swap(0, 1);
        }
        Ok(model)
    }

    fn log_weighted_density(&self, x: f64, k: usize) -> f64 {
        let var = self.variances[k];
        let diff = x - self.means[k];
        self.weights[k].ln() - 0.5 * (2.0 * PI * var).ln() - diff * diff / (2.0 * var)
    }

    /// Posterior membership probabilities of `x`.
    pub fn posterior(&self, x: f64) -> [f64; 2] {
        let l0 = self.log_weighted_density(x, 0);
        let l1 = self.log_weighted_density(x, 1);
        let max = l0.max(l1);
        let e0 = (l0 - max).exp();
        let e1 = (l1 - max).exp();
        [e0 / (e0 + e1), e1 / (e0 + e1)]
    }

    /// Index of the most probable component; ties go to the lower-mean one.
    pub fn predict(&self, x: f64) -> usize {
        let p = self.posterior(x);
        if p[1] > p[0] {
            1
        } else {
            0
        }
    }

    /// Fills `resp` and returns the mean log-likelihood.
    fn e_step(&self, values: &[f64], resp: &mut [[f64; 2]]) -> f64 {
        let mut total = 0.0;
        for (x, r) in values.iter().zip(resp.iter_mut()) {
            let l0 = self.log_weighted_density(*x, 0);
            let l1 = self.log_weighted_density(*x, 1);
            let max = l0.max(l1);
            let norm = max + ((l0 - max).exp() + (l1 - max).exp()).ln();
            r[0] = (l0 - norm).exp();
            r[1] = (l1 - norm).exp();
            total += norm;
        }
        total / values.len() as f64
    }

    fn m_step(&mut self, values: &[f64], resp: &[[f64; 2]]) {
        let n = values.len() as f64;
        for k in 0..2 {
            let nk: f64 = resp.iter().map(|r| r[k]).sum::<f64>() + 10.0 * f64::EPSILON;
            let mean = values.iter().zip(resp).map(|(x, r)| r[k] * x).sum::<f64>() / nk;
            let var = values
                .iter()
                .zip(resp)
                .map(|(x, r)| r[k] * (x - mean) * (x - mean))
                .sum::<f64>()
                / nk;
            self.weights[k] = nk / n;
            self.means[k] = mean;
            self.variances[k] = var + REG_VARIANCE;
        }
    }
}

fn kmeans_init(values: &[f64], rng: &mut StdRng) -> Result<Vec<usize>> {
    let first = values[rng.gen_range(0..values.len())];
    let distances: Vec<f64> = values.iter().map(|x| (x - first) * (x - first)).collect();
    let total: f64 = distances.iter().sum();
    if total <= 0.0 {
        return Err(PipelineError::Empty(
            "mixture fit needs at least two distinct values".into(),
        ));
    }
    let mut target = rng.gen::<f64>() * total;
    let mut second = values[values.len() - 1];
    for (x, d) in values.iter().zip(&distances) {
        if target < *d {
            second = *x;
            break;
        }
        target -= d;
    }

    let mut centres = [first, second];
    let mut assignment = vec![0usize; values.len()];
    for _ in 0..KMEANS_MAX_ITER {
        let mut changed = false;
        for (x, slot) in values.iter().zip(assignment.iter_mut()) {
            let k = if (x - centres[1]).abs() < (x - centres[0]).abs() {
                1
            } else {
                0
            };
            if *slot != k {
                *slot = k;
                changed = true;
            }
        }
        for (k, centre) in centres.iter_mut().enumerate() {
            let members: Vec<f64> = values
                .iter()
                .zip(&assignment)
                .filter(|(_, a)| **a == k)
                .map(|(x, _)| *x)
                .collect();
            if !members.is_empty() {
                *centre = members.iter().sum::<f64>() / members.len() as f64;
            }
        }
        if !changed {
            break;
        }
    }
    Ok(assignment)
}

/// Linear-interpolation quantile of an ascending slice.
pub fn quantile<T: Float>(sorted: &[T], q: T) -> Option<T> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q * T::from(sorted.len() - 1)?;
    let lower = pos.floor();
    let idx = lower.to_usize()?;
    let low = sorted[idx];
    let high = sorted[(idx + 1).min(sorted.len() - 1)];
    Some(low + (high - low) * (pos - lower))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bimodal() -> Vec<f64> {
        let mut values = Vec::new();
        for i in 0..200 {
            values.push(90.0 + (i % 20) as f64 - 10.0);
        }
        for i in 0..60 {
            values.push(210.0 + (i % 12) as f64 * 2.0 - 12.0);
        }
        values
    }

    #[test]
    fn separates_two_modes() {
        let model = GaussianMixture::fit(&bimodal(), &MixtureConfig::default(), 3).unwrap();
        assert!(model.means[0] < model.means[1]);
        assert!((model.means[0] - 89.5).abs() < 2.0, "low mean {}", model.means[0]);
        assert!((model.means[1] - 209.0).abs() < 3.0, "high mean {}", model.means[1]);
        assert!((model.weights[0] - 200.0 / 260.0).abs() < 0.02);
        assert_eq!(model.predict(85.0), 0);
        assert_eq!(model.predict(215.0), 1);
    }

    #[test]
    fn same_seed_same_fit() {
        let values = bimodal();
        let a = GaussianMixture::fit(&values, &MixtureConfig::default(), 11).unwrap();
        let b = GaussianMixture::fit(&values, &MixtureConfig::default(), 11).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn constant_column_is_rejected() {
        let values = vec![5.0; 10];
        assert!(GaussianMixture::fit(&values, &MixtureConfig::default(), 0).is_err());
    }

    #[test]
    fn quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.25), Some(1.75));
        assert_eq!(quantile(&sorted, 0.5), Some(2.5));
        assert_eq!(quantile(&sorted, 1.0), Some(4.0));
        assert_eq!(quantile::<f64>(&[], 0.5), None);
    }
}
