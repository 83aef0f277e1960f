use polars::prelude::*;

use crate::discretize::AgeBucket;
use crate::error::Result;
use crate::records::{AGE_GROUP, BMI_GROUP, SMOKING_STATUS};

pub const NEVER_SMOKED: &str = "never smoked";
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImputationSummary {
    pub smoking_filled_never: usize,
    pub smoking_filled_unknown: usize,
    pub dropped_missing_bmi: usize,
}

/// Resolve missing smoking status and drop rows without a BMI bucket.
///
/// Children with no recorded smoking status are taken to have never smoked;
/// everyone else becomes `unknown`.
pub fn impute(df: DataFrame) -> Result<(DataFrame, ImputationSummary)> {
    let mut smoking_filled_never = 0;
    let mut smoking_filled_unknown = 0;
    let smoking = df.column(SMOKING_STATUS)?.utf8()?;
    let age_groups = df.column(AGE_GROUP)?.utf8()?;
    for (status, age_group) in smoking.into_iter().zip(age_groups.into_iter()) {
        if status.is_none() {
            if age_group == Some(AgeBucket::Child.label()) {
                smoking_filled_never += 1;
            } else {
                smoking_filled_unknown += 1;
            }
        }
    }
    let before = df.height();

    let out = df
        .lazy()
        .with_column(
            when(
                col(SMOKING_STATUS)
                    .is_null()
                    .and(col(AGE_GROUP).eq(lit(AgeBucket::Child.label()))),
            )
            .then(lit(NEVER_SMOKED))
            .otherwise(
                when(col(SMOKING_STATUS).is_null())
                    .then(lit(UNKNOWN))
                    .otherwise(col(SMOKING_STATUS)),
            )
            .alias(SMOKING_STATUS),
        )
        .filter(col(BMI_GROUP).is_not_null())
        .collect()?;

    let summary = ImputationSummary {
        smoking_filled_never,
        smoking_filled_unknown,
        dropped_missing_bmi: before - out.height(),
    };
    Ok((out, summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df!(
            AGE_GROUP => &["child", "child", "elderly", "teenager", "young_adult"],
            SMOKING_STATUS => &[None, Some("smokes"), None, None, Some("formerly smoked")],
            BMI_GROUP => &[Some("normal"), Some("obese"), None, Some("normal"), None]
        )
        .unwrap()
    }

    #[test]
    fn fills_smoking_by_age_group() {
        let df = df!(
            AGE_GROUP => &["child", "child", "elderly", "teenager"],
            SMOKING_STATUS => &[None, Some("smokes"), None, None],
            BMI_GROUP => &["normal", "obese", "normal", "normal"]
        )
        .unwrap();
        let (out, summary) = impute(df).unwrap();
        let smoking: Vec<Option<&str>> = out
            .column(SMOKING_STATUS)
            .unwrap()
            .utf8()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(
            smoking,
            vec![Some(NEVER_SMOKED), Some("smokes"), Some(UNKNOWN), Some(UNKNOWN)]
        );
        assert_eq!(summary.smoking_filled_never, 1);
        assert_eq!(summary.smoking_filled_unknown, 2);
        assert_eq!(summary.dropped_missing_bmi, 0);
    }

    #[test]
    fn drops_exactly_the_missing_bmi_rows() {
        let df = sample();
        let missing_bmi = df.column(BMI_GROUP).unwrap().null_count();
        let before = df.height();
        let (out, summary) = impute(df).unwrap();
        assert_eq!(out.height(), before - missing_bmi);
        assert_eq!(summary.dropped_missing_bmi, missing_bmi);
        assert_eq!(out.column(BMI_GROUP).unwrap().null_count(), 0);
        assert_eq!(out.column(SMOKING_STATUS).unwrap().null_count(), 0);
    }
}
