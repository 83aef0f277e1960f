use polars::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMissingness {
    pub column: String,
    pub missing: usize,
    pub percent: f64,
}

/// Per-column share of missing values, in column order.
pub fn missingness(df: &DataFrame) -> Vec<ColumnMissingness> {
    let rows = df.height();
    df.get_columns()
        .iter()
        .map(|series| {
            let missing = series.null_count();
            let percent = if rows == 0 {
                0.0
            } else {
                missing as f64 * 100.0 / rows as f64
            };
            ColumnMissingness {
                column: series.name().to_string(),
                missing,
                percent,
            }
        })
        .collect()
}
