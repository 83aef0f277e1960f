use std::sync::Arc;

use lazy_static::lazy_static;
use polars::prelude::{DataType, Field, NullValues, Schema};

pub const ID: &str = "id";
pub const GENDER: &str = "gender";
pub const AGE: &str = "age";
pub const HYPERTENSION: &str = "hypertension";
pub const HEART_DISEASE: &str = "heart_disease";
pub const EVER_MARRIED: &str = "ever_married";
pub const WORK_TYPE: &str = "work_type";
pub const RESIDENCE_TYPE: &str = "Residence_type";
pub const AVG_GLUCOSE_LEVEL: &str = "avg_glucose_level";
pub const BMI: &str = "bmi";
pub const SMOKING_STATUS: &str = "smoking_status";
pub const STROKE: &str = "stroke";

pub const AGE_GROUP: &str = "age_group";
pub const BMI_GROUP: &str = "bmi_group";
pub const GLUCOSE_GROUP: &str = "glucose_group";

lazy_static! {
    pub static ref RAW_SCHEMA: Arc<Schema> = Arc::new(StrokeRecord::raw_schema());
}

/// Column layout of the stroke dataset at each stage of the pipeline.
pub struct StrokeRecord {}

impl StrokeRecord {
    pub fn raw_schema() -> Schema {
        Schema::from_iter(vec![
            Field::new(ID, DataType::Int32),
            Field::new(GENDER, DataType::Utf8),
            Field::new(AGE, DataType::Float64),
            Field::new(HYPERTENSION, DataType::Int32),
            Field::new(HEART_DISEASE, DataType::Int32),
            Field::new(EVER_MARRIED, DataType::Utf8),
            Field::new(WORK_TYPE, DataType::Utf8),
            Field::new(RESIDENCE_TYPE, DataType::Utf8),
            Field::new(AVG_GLUCOSE_LEVEL, DataType::Float64),
            Field::new(BMI, DataType::Float64),
            Field::new(SMOKING_STATUS, DataType::Utf8),
            Field::new(STROKE, DataType::Int32),
        ])
    }

    /// Placeholders the source file uses for absent values.
    pub fn null_values() -> NullValues {
        NullValues::Named(vec![
            (BMI.to_string(), "N/A".to_string()),
            (SMOKING_STATUS.to_string(), "Unknown".to_string()),
        ])
    }

    /// Integer 0/1 columns that are really categories.
    pub fn binary_coded() -> [&'static str; 3] {
        [HYPERTENSION, HEART_DISEASE, STROKE]
    }

    /// Categorical columns fed to the classifier, in encoding order.
    pub fn feature_columns() -> [&'static str; 10] {
        [
            GENDER,
            AGE_GROUP,
            HYPERTENSION,
            HEART_DISEASE,
            EVER_MARRIED,
            WORK_TYPE,
            RESIDENCE_TYPE,
            GLUCOSE_GROUP,
            BMI_GROUP,
            SMOKING_STATUS,
        ]
    }
}
