//! SMOTE for categorical records.
//!
//! Neighbours are found by Hamming distance over level codes. A synthetic
//! record takes each feature from the chosen neighbour with probability
//! `gap` and from the base record otherwise, which is the nominal-feature
//! reading of "interpolate along the segment between two samples".

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SmoteConfig;
use crate::error::{PipelineError, Result};
use crate::table::CategoricalTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleSummary {
    pub minority_before: usize,
    pub majority: usize,
    pub synthesized: usize,
}

fn hamming(a: &[u32], b: &[u32]) -> usize {
    a.iter().zip(b).filter(|(x, y)| x != y).count()
}

/// Indices (into `minority`) of the `k` nearest other minority records.
fn nearest_neighbors(table: &CategoricalTable, minority: &[usize], k: usize) -> Vec<Vec<usize>> {
    minority
        .iter()
        .enumerate()
        .map(|(i, &row)| {
            let mut distances: Vec<(usize, usize)> = minority
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(j, &other)| (hamming(&table.rows[row], &table.rows[other]), j))
                .collect();
            distances.sort_unstable();
            distances.into_iter().take(k).map(|(_, j)| j).collect()
        })
        .collect()
}

/// Append synthetic positive records until positives reach `ratio` of negatives.
pub fn oversample(
    table: &CategoricalTable,
    config: &SmoteConfig,
    seed: u64,
) -> Result<(CategoricalTable, ResampleSummary)> {
    let minority: Vec<usize> = (0..table.len()).filter(|&i| table.labels[i] == 1).collect();
    let majority = table.len() - minority.len();
    let target = (config.ratio * majority as f64).round() as usize;
    let synthesized = target.saturating_sub(minority.len());

    let mut out = table.clone();
    let summary = ResampleSummary {
        minority_before: minority.len(),
        majority,
        synthesized,
    };
    if synthesized == 0 {
        return Ok((out, summary));
    }
    if minority.len() < 2 {
        return Err(PipelineError::Config(format!(
            "SMOTE needs at least two minority records, found {}",
            minority.len()
        )));
    }

    let k = config.k_neighbors.min(minority.len() - 1);
    let neighbors = nearest_neighbors(table, &minority, k);
    debug!(
        "SMOTE: {} minority, {} majority, k = {}, synthesizing {}",
        minority.len(),
        majority,
        k,
        synthesized
    );

    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..synthesized {
        let base = rng.gen_range(0..minority.len());
        let neighbor = neighbors[base][rng.gen_range(0..k)];
        let gap: f64 = rng.gen();
        let base_row = &table.rows[minority[base]];
        let neighbor_row = &table.rows[minority[neighbor]];
        let row: Vec<u32> = base_row
            .iter()
            .zip(neighbor_row)
            .map(|(b, n)| if rng.gen::<f64>() < gap { *n } else { *b })
            .collect();
        out.push(row, 1);
    }

    Ok((out, summary))
}
