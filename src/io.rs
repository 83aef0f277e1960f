use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use polars::prelude::*;
use polars_io::parquet::ParquetWriter;
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::records::{StrokeRecord, RAW_SCHEMA};

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| PipelineError::io(path, e))
}

/// Open a file for writing, creating parent directories first.
pub fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    File::create(path).map_err(|e| PipelineError::io(path, e))
}

pub async fn read_parquet<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let file = open(path.as_ref())?;

    Ok(ParquetReader::new(file).finish()?)
}

/// Read the source dataset with the fixed stroke schema.
pub async fn read_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let file = open(path.as_ref())?;

    Ok(CsvReader::new(file)
        .has_header(true)
        .with_dtypes(Some(Arc::clone(&RAW_SCHEMA)))
        .with_null_values(Some(StrokeRecord::null_values()))
        .finish()?)
}

pub async fn write_csv<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> Result<()> {
    let mut file = create_file(path.as_ref())?;

    CsvWriter::new(&mut file).has_header(true).finish(df)?;

    Ok(())
}

pub async fn write_parquet<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> Result<()> {
    let mut file = create_file(path.as_ref())?;

    ParquetWriter::new(&mut file).finish(df)?;

    Ok(())
}

/// Write serializable rows as a headed CSV file.
pub fn write_records<P, T>(path: P, rows: &[T]) -> Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let file = create_file(path.as_ref())?;
    let mut writer = csv::Writer::from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .map_err(|e| PipelineError::io(path.as_ref(), e))?;
    Ok(())
}

pub fn write_json<P, T>(path: P, value: &T) -> Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let file = create_file(path.as_ref())?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

pub fn write_text<P: AsRef<Path>>(path: P, text: &str) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    fs::write(path, text).map_err(|e| PipelineError::io(path, e))
}
