//! Fully categorical modelling table.
//!
//! Every feature is a sorted list of levels and every row stores one level
//! code per feature. Building the table fails on any missing value, so all
//! downstream learners can assume complete data.

use std::collections::BTreeSet;

use polars::prelude::*;
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::model_selection::train_test_split;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub name: String,
    pub levels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalTable {
    pub features: Vec<Feature>,
    pub rows: Vec<Vec<u32>>,
    pub labels: Vec<u8>,
}

impl CategoricalTable {
    /// Encode `features` of `df`; `label` is positive where it reads `"1"`.
    pub fn from_frame(df: &DataFrame, features: &[&str], label: &str) -> Result<Self> {
        let height = df.height();
        let mut rows = vec![Vec::with_capacity(features.len()); height];
        let mut encoded = Vec::with_capacity(features.len());

        for name in features {
            let series = df.column(name)?.cast(&DataType::Utf8)?;
            let values = series.utf8()?;
            let mut raw = Vec::with_capacity(height);
            for (row, value) in values.into_iter().enumerate() {
                match value {
                    Some(v) => raw.push(v),
                    None => {
                        return Err(PipelineError::UnresolvedMissing {
                            column: name.to_string(),
                            row,
                        })
                    }
                }
            }
            let levels: Vec<String> = raw
                .iter()
                .map(|v| v.to_string())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            for (row, value) in raw.iter().enumerate() {
                let code = levels.iter().position(|l| l == value).unwrap_or_default();
                rows[row].push(code as u32);
            }
            encoded.push(Feature {
                name: name.to_string(),
                levels,
            });
        }

        let label_series = df.column(label)?.cast(&DataType::Utf8)?;
        let mut labels = Vec::with_capacity(height);
        for (row, value) in label_series.utf8()?.into_iter().enumerate() {
            match value {
                Some(v) => labels.push(u8::from(v == "1")),
                None => {
                    return Err(PipelineError::UnresolvedMissing {
                        column: label.to_string(),
                        row,
                    })
                }
            }
        }

        Ok(Self {
            features: encoded,
            rows,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|l| **l == 1).count()
    }

    pub fn level(&self, feature: usize, code: u32) -> &str {
        &self.features[feature].levels[code as usize]
    }

    /// Same features, selected rows.
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    pub fn push(&mut self, row: Vec<u32>, label: u8) {
        self.rows.push(row);
        self.labels.push(label);
    }

    /// Item names in `{feature=level}` form, feature-major.
    pub fn item_names(&self) -> Vec<String> {
        self.features
            .iter()
            .flat_map(|f| {
                f.levels
                    .iter()
                    .map(move |level| format!("{{{}={}}}", f.name, level))
            })
            .collect()
    }

    /// Offset of each feature's first column in the one-hot layout.
    pub fn one_hot_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.features.len());
        let mut total = 0;
        for feature in &self.features {
            offsets.push(total);
            total += feature.levels.len();
        }
        offsets
    }

    pub fn one_hot_width(&self) -> usize {
        self.features.iter().map(|f| f.levels.len()).sum()
    }

    pub fn one_hot(&self) -> DenseMatrix<f64> {
        let width = self.one_hot_width();
        let offsets = self.one_hot_offsets();
        let mut values = vec![0.0; self.len() * width];
        for (r, row) in self.rows.iter().enumerate() {
            for (f, code) in row.iter().enumerate() {
                values[r * width + offsets[f] + *code as usize] = 1.0;
            }
        }
        DenseMatrix::new(self.len(), width, values, false)
    }

    pub fn labels_i32(&self) -> Vec<i32> {
        self.labels.iter().map(|l| i32::from(*l)).collect()
    }

    /// Decode back into a frame of level strings plus the label column.
    pub fn to_frame(&self, label: &str) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.features.len() + 1);
        for (f, feature) in self.features.iter().enumerate() {
            let values: Vec<&str> = self.rows.iter().map(|row| self.level(f, row[f])).collect();
            columns.push(Series::new(&feature.name, values));
        }
        let labels: Vec<&str> = self
            .labels
            .iter()
            .map(|l| if *l == 1 { "1" } else { "0" })
            .collect();
        columns.push(Series::new(label, labels));
        Ok(DataFrame::new(columns)?)
    }
}

/// Seeded shuffle split into (train, test).
pub fn split(
    table: &CategoricalTable,
    test_fraction: f32,
    seed: u64,
) -> Result<(CategoricalTable, CategoricalTable)> {
    if table.len() < 2 {
        return Err(PipelineError::Empty(format!(
            "cannot split {} rows into train and test",
            table.len()
        )));
    }
    let index: Vec<f64> = (0..table.len()).map(|i| i as f64).collect();
    let x = DenseMatrix::new(table.len(), 1, index, true);
    let y = table.labels_i32();
    let (x_train, x_test, _, _) = train_test_split(&x, &y, test_fraction, true, Some(seed));

    let rows_of = |m: &DenseMatrix<f64>| -> Vec<usize> {
        (0..m.shape().0).map(|r| *m.get((r, 0)) as usize).collect()
    };
    let train = table.subset(&rows_of(&x_train));
    let test = table.subset(&rows_of(&x_test));
    if train.is_empty() || test.is_empty() {
        return Err(PipelineError::Empty(format!(
            "split of {} rows at test fraction {} left an empty partition",
            table.len(),
            test_fraction
        )));
    }
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!(
            "gender" => &["Male", "Female", "Female", "Male", "Female", "Male"],
            "smoking_status" => &["smokes", "unknown", "smokes", "never smoked", "unknown", "smokes"],
            "stroke" => &[1, 0, 0, 1, 0, 0]
        )
        .unwrap()
    }

    #[test]
    fn encodes_sorted_levels() {
        let table = CategoricalTable::from_frame(&frame(), &["gender", "smoking_status"], "stroke").unwrap();
        assert_eq!(table.features[0].levels, vec!["Female", "Male"]);
        assert_eq!(
            table.features[1].levels,
            vec!["never smoked", "smokes", "unknown"]
        );
        assert_eq!(table.rows[0], vec![1, 1]);
        assert_eq!(table.rows[3], vec![1, 0]);
        assert_eq!(table.labels, vec![1, 0, 0, 1, 0, 0]);
        assert_eq!(table.positives(), 2);
        assert_eq!(table.item_names()[0], "{gender=Female}");
        assert_eq!(table.item_names().len(), 5);
    }

    #[test]
    fn missing_values_are_rejected() {
        let df = df!(
            "gender" => &[Some("Male"), None],
            "stroke" => &[0, 1]
        )
        .unwrap();
        let err = CategoricalTable::from_frame(&df, &["gender"], "stroke").unwrap_err();
        assert!(matches!(err, PipelineError::UnresolvedMissing { row: 1, .. }));
    }

    #[test]
    fn one_hot_sets_one_column_per_feature() {
        let table = CategoricalTable::from_frame(&frame(), &["gender", "smoking_status"], "stroke").unwrap();
        let matrix = table.one_hot();
        assert_eq!(matrix.shape(), (6, 5));
        for r in 0..6 {
            let ones: f64 = (0..5).map(|c| *matrix.get((r, c))).sum();
            assert_eq!(ones, 2.0);
        }
        assert_eq!(*matrix.get((0, 1)), 1.0);
        assert_eq!(*matrix.get((0, 3)), 1.0);
    }

    #[test]
    fn split_partitions_rows() {
        let table = CategoricalTable::from_frame(&frame(), &["gender", "smoking_status"], "stroke").unwrap();
        let (train, test) = split(&table, 0.34, 9).unwrap();
        assert_eq!(train.len() + test.len(), table.len());
        assert!(!test.is_empty());
        let (train_again, _) = split(&table, 0.34, 9).unwrap();
        assert_eq!(train, train_again);
    }

    #[test]
    fn round_trips_through_frame() {
        let table = CategoricalTable::from_frame(&frame(), &["gender", "smoking_status"], "stroke").unwrap();
        let df = table.to_frame("stroke").unwrap();
        let again = CategoricalTable::from_frame(&df, &["gender", "smoking_status"], "stroke").unwrap();
        assert_eq!(table, again);
    }
}
