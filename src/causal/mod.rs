//! Causal structure learning over categorical data.
//!
//! [`fci::learn`] runs Fast Causal Inference with G² independence tests and
//! returns a partial ancestral graph ([`Pag`]).

mod fci;
mod independence;
mod knowledge;
mod pag;

pub use fci::{learn, FciResult};
pub use independence::GSquareTest;
pub use knowledge::Knowledge;
pub use pag::{Edge, Mark, Pag};

use crate::table::CategoricalTable;

/// Column-major categorical codes, one column per variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub names: Vec<String>,
    /// Number of levels per variable.
    pub levels: Vec<usize>,
    pub columns: Vec<Vec<u32>>,
}

impl Dataset {
    pub fn new(names: Vec<String>, columns: Vec<Vec<u32>>) -> Self {
        let levels = columns
            .iter()
            .map(|c| c.iter().max().map_or(0, |m| *m as usize + 1))
            .collect();
        Self {
            names,
            levels,
            columns,
        }
    }

    /// Table features followed by the label as a two-level variable.
    pub fn from_table(table: &CategoricalTable, label: &str) -> Self {
        let mut names: Vec<String> = table.features.iter().map(|f| f.name.clone()).collect();
        let mut levels: Vec<usize> = table.features.iter().map(|f| f.levels.len()).collect();
        let mut columns: Vec<Vec<u32>> = (0..table.features.len())
            .map(|f| table.rows.iter().map(|row| row[f]).collect())
            .collect();
        names.push(label.to_string());
        levels.push(2);
        columns.push(table.labels.iter().map(|l| u32::from(*l)).collect());
        Self {
            names,
            levels,
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn variables(&self) -> usize {
        self.names.len()
    }
}
