//! Continuous columns to ordered categories.
//!
//! Age and BMI use fixed clinical cut points. Glucose is split by a fitted
//! two-component mixture and, inside each component, by its own quartiles.

use std::collections::BTreeMap;

use polars::prelude::*;

use crate::config::MixtureConfig;
use crate::error::{PipelineError, Result};
use crate::mixture::{quantile, GaussianMixture};
use crate::records::{AGE, AGE_GROUP, AVG_GLUCOSE_LEVEL, BMI, BMI_GROUP, GLUCOSE_GROUP};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AgeBucket {
    Child,
    Teenager,
    YoungAdult,
    MiddleAged,
    OlderAdult,
    Elderly,
}

impl AgeBucket {
    pub const ALL: [AgeBucket; 6] = [
        AgeBucket::Child,
        AgeBucket::Teenager,
        AgeBucket::YoungAdult,
        AgeBucket::MiddleAged,
        AgeBucket::OlderAdult,
        AgeBucket::Elderly,
    ];

    /// `None` only for NaN.
    pub fn from_age(age: f64) -> Option<Self> {
        if age.is_nan() {
            None
        } else if age < 12.0 {
            Some(AgeBucket::Child)
        } else if age < 19.0 {
            Some(AgeBucket::Teenager)
        } else if age < 35.0 {
            Some(AgeBucket::YoungAdult)
        } else if age < 55.0 {
            Some(AgeBucket::MiddleAged)
        } else if age < 65.0 {
            Some(AgeBucket::OlderAdult)
        } else {
            Some(AgeBucket::Elderly)
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AgeBucket::Child => "child",
            AgeBucket::Teenager => "teenager",
            AgeBucket::YoungAdult => "young_adult",
            AgeBucket::MiddleAged => "middle_aged",
            AgeBucket::OlderAdult => "older_adult",
            AgeBucket::Elderly => "elderly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BmiBucket {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiBucket {
    pub const ALL: [BmiBucket; 4] = [
        BmiBucket::Underweight,
        BmiBucket::Normal,
        BmiBucket::Overweight,
        BmiBucket::Obese,
    ];

    /// `None` only for NaN.
    pub fn from_bmi(bmi: f64) -> Option<Self> {
        if bmi.is_nan() {
            None
        } else if bmi < 18.5 {
            Some(BmiBucket::Underweight)
        } else if bmi < 25.0 {
            Some(BmiBucket::Normal)
        } else if bmi < 30.0 {
            Some(BmiBucket::Overweight)
        } else {
            Some(BmiBucket::Obese)
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BmiBucket::Underweight => "underweight",
            BmiBucket::Normal => "normal",
            BmiBucket::Overweight => "overweight",
            BmiBucket::Obese => "obese",
        }
    }
}

/// Position of a value relative to its component's interquartile range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QuartilePosition {
    BelowQ1,
    Interquartile,
    AboveQ3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlucoseBucket {
    /// 0 for the lower-mean component, 1 for the higher.
    pub component: usize,
    pub position: QuartilePosition,
}

impl GlucoseBucket {
    pub fn label(self) -> &'static str {
        match (self.component, self.position) {
            (0, QuartilePosition::BelowQ1) => "normal_low",
            (0, QuartilePosition::Interquartile) => "normal_mid",
            (0, QuartilePosition::AboveQ3) => "normal_high",
            (_, QuartilePosition::BelowQ1) => "high_low",
            (_, QuartilePosition::Interquartile) => "high_mid",
            (_, QuartilePosition::AboveQ3) => "high_high",
        }
    }
}

/// Fitted glucose discretizer: mixture plus per-component (Q1, Q3).
#[derive(Debug, Clone)]
pub struct GlucoseBucketer {
    pub mixture: GaussianMixture,
    pub quartiles: [(f64, f64); 2],
}

impl GlucoseBucketer {
    pub fn fit(values: &[f64], config: &MixtureConfig, seed: u64) -> Result<Self> {
        let mixture = GaussianMixture::fit(values, config, seed)?;

        let mut members: [Vec<f64>; 2] = [Vec::new(), Vec::new()];
        for &x in values.iter().filter(|v| v.is_finite()) {
            members[mixture.predict(x)].push(x);
        }

        let mut quartiles = [(0.0, 0.0); 2];
        for (k, component) in members.iter_mut().enumerate() {
            component.sort_by(|a, b| a.total_cmp(b));
            let q1 = quantile(component.as_slice(), 0.25);
            let q3 = quantile(component.as_slice(), 0.75);
            match (q1, q3) {
                (Some(q1), Some(q3)) => quartiles[k] = (q1, q3),
                _ => {
                    return Err(PipelineError::Empty(format!(
                        "glucose mixture component {} has no members",
                        k
                    )))
                }
            }
        }

        Ok(Self { mixture, quartiles })
    }

    pub fn assign(&self, x: f64) -> Option<GlucoseBucket> {
        if !x.is_finite() {
            return None;
        }
        let component = self.mixture.predict(x);
        let (q1, q3) = self.quartiles[component];
        let position = if x < q1 {
            QuartilePosition::BelowQ1
        } else if x > q3 {
            QuartilePosition::AboveQ3
        } else {
            QuartilePosition::Interquartile
        };
        Some(GlucoseBucket {
            component,
            position,
        })
    }

    pub fn bucket_series(&self, column: Series) -> PolarsResult<Option<Series>> {
        let values = column.cast(&DataType::Float64)?;
        let labels: Vec<Option<&str>> = values
            .f64()?
            .into_iter()
            .map(|v| v.and_then(|x| self.assign(x)).map(GlucoseBucket::label))
            .collect();
        Ok(Some(Series::new(column.name(), labels)))
    }
}

fn age_bucket_series(column: Series) -> PolarsResult<Option<Series>> {
    let values = column.cast(&DataType::Float64)?;
    let labels: Vec<Option<&str>> = values
        .f64()?
        .into_iter()
        .map(|v| v.and_then(AgeBucket::from_age).map(AgeBucket::label))
        .collect();
    Ok(Some(Series::new(column.name(), labels)))
}

fn bmi_bucket_series(column: Series) -> PolarsResult<Option<Series>> {
    let values = column.cast(&DataType::Float64)?;
    let labels: Vec<Option<&str>> = values
        .f64()?
        .into_iter()
        .map(|v| v.and_then(BmiBucket::from_bmi).map(BmiBucket::label))
        .collect();
    Ok(Some(Series::new(column.name(), labels)))
}

/// Non-missing values of a numeric column.
pub fn finite_values(df: &DataFrame, column: &str) -> Result<Vec<f64>> {
    let series = df.column(column)?.cast(&DataType::Float64)?;
    let values = series
        .f64()?
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect();
    Ok(values)
}

/// Add `age_group`, `bmi_group` and `glucose_group` next to their sources.
pub fn discretize(df: DataFrame, glucose: GlucoseBucketer) -> Result<DataFrame> {
    let df = df
        .lazy()
        .with_column(
            col(AGE)
                .apply(age_bucket_series, GetOutput::from_type(DataType::Utf8))
                .alias(AGE_GROUP),
        )
        .with_column(
            col(BMI)
                .apply(bmi_bucket_series, GetOutput::from_type(DataType::Utf8))
                .alias(BMI_GROUP),
        )
        .with_column(
            col(AVG_GLUCOSE_LEVEL)
                .apply(
                    move |s| glucose.bucket_series(s),
                    GetOutput::from_type(DataType::Utf8),
                )
                .alias(GLUCOSE_GROUP),
        )
        .collect()?;
    Ok(df)
}

/// Level counts of a categorical column, missing values excluded.
pub fn level_counts(df: &DataFrame, column: &str) -> Result<BTreeMap<String, usize>> {
    let series = df.column(column)?.cast(&DataType::Utf8)?;
    let mut counts = BTreeMap::new();
    for value in series.utf8()?.into_iter().flatten() {
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bmi_boundaries() {
        assert_eq!(BmiBucket::from_bmi(18.4999), Some(BmiBucket::Underweight));
        assert_eq!(BmiBucket::from_bmi(18.5), Some(BmiBucket::Normal));
        assert_eq!(BmiBucket::from_bmi(24.999), Some(BmiBucket::Normal));
        assert_eq!(BmiBucket::from_bmi(25.0), Some(BmiBucket::Overweight));
        assert_eq!(BmiBucket::from_bmi(29.999), Some(BmiBucket::Overweight));
        assert_eq!(BmiBucket::from_bmi(30.0), Some(BmiBucket::Obese));
        assert_eq!(BmiBucket::from_bmi(f64::NAN), None);
    }

    #[test]
    fn bmi_partition_is_total_and_ordered() {
        let mut previous = BmiBucket::Underweight;
        let mut x = -10.0;
        while x < 80.0 {
            let bucket = BmiBucket::from_bmi(x).unwrap();
            assert!(bucket >= previous, "bucket went backwards at {}", x);
            previous = bucket;
            x += 0.01;
        }
        assert_eq!(BmiBucket::from_bmi(f64::INFINITY), Some(BmiBucket::Obese));
        assert_eq!(BmiBucket::from_bmi(f64::NEG_INFINITY), Some(BmiBucket::Underweight));
    }

    #[test]
    fn age_boundaries() {
        assert_eq!(AgeBucket::from_age(0.08), Some(AgeBucket::Child));
        assert_eq!(AgeBucket::from_age(11.0), Some(AgeBucket::Child));
        assert_eq!(AgeBucket::from_age(12.0), Some(AgeBucket::Teenager));
        assert_eq!(AgeBucket::from_age(18.9), Some(AgeBucket::Teenager));
        assert_eq!(AgeBucket::from_age(19.0), Some(AgeBucket::YoungAdult));
        assert_eq!(AgeBucket::from_age(35.0), Some(AgeBucket::MiddleAged));
        assert_eq!(AgeBucket::from_age(55.0), Some(AgeBucket::OlderAdult));
        assert_eq!(AgeBucket::from_age(64.99), Some(AgeBucket::OlderAdult));
        assert_eq!(AgeBucket::from_age(65.0), Some(AgeBucket::Elderly));
        assert_eq!(AgeBucket::from_age(82.0), Some(AgeBucket::Elderly));
    }

    #[test]
    fn labels_are_distinct() {
        let mut labels: Vec<&str> = AgeBucket::ALL.iter().map(|b| b.label()).collect();
        labels.extend(BmiBucket::ALL.iter().map(|b| b.label()));
        let unique: std::collections::HashSet<&str> = labels.iter().copied().collect();
        assert_eq!(unique.len(), 10);
    }

    fn glucose_sample() -> Vec<f64> {
        let mut values: Vec<f64> = (0..300).map(|i| 70.0 + (i % 50) as f64).collect();
        values.extend((0..80).map(|i| 190.0 + (i % 40) as f64 * 1.5));
        values
    }

    #[test]
    fn glucose_buckets_follow_component_quartiles() {
        let values = glucose_sample();
        let bucketer = GlucoseBucketer::fit(&values, &MixtureConfig::default(), 42).unwrap();
        for &x in &values {
            let bucket = bucketer.assign(x).unwrap();
            assert_eq!(bucket.component, bucketer.mixture.predict(x));
            let (q1, q3) = bucketer.quartiles[bucket.component];
            match bucket.position {
                QuartilePosition::BelowQ1 => assert!(x < q1),
                QuartilePosition::Interquartile => assert!(x >= q1 && x <= q3),
                QuartilePosition::AboveQ3 => assert!(x > q3),
            }
        }
        assert_eq!(bucketer.assign(75.0).unwrap().component, 0);
        assert_eq!(bucketer.assign(220.0).unwrap().component, 1);
        assert_eq!(bucketer.assign(f64::NAN), None);
    }

    #[test]
    fn discretize_adds_group_columns() {
        let df = df!(
            AGE => &[5.0, 30.0, 70.0, 45.0],
            BMI => &[Some(17.0), None, Some(31.0), Some(24.0)],
            AVG_GLUCOSE_LEVEL => &[80.0, 95.0, 210.0, 100.0]
        )
        .unwrap();
        let values = glucose_sample();
        let bucketer = GlucoseBucketer::fit(&values, &MixtureConfig::default(), 42).unwrap();
        let out = discretize(df, bucketer).unwrap();

        let ages: Vec<Option<&str>> = out.column(AGE_GROUP).unwrap().utf8().unwrap().into_iter().collect();
        assert_eq!(
            ages,
            vec![Some("child"), Some("young_adult"), Some("elderly"), Some("middle_aged")]
        );
        let bmis: Vec<Option<&str>> = out.column(BMI_GROUP).unwrap().utf8().unwrap().into_iter().collect();
        assert_eq!(bmis, vec![Some("underweight"), None, Some("obese"), Some("normal")]);
        assert_eq!(out.column(GLUCOSE_GROUP).unwrap().null_count(), 0);
        assert_eq!(level_counts(&out, AGE_GROUP).unwrap().len(), 4);
    }
}
