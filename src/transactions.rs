//! Item/label files in the whitespace-delimited layout rule-list learners read.
//!
//! The data file has one line per item, `{feature=level}` followed by a 0/1
//! flag for every record. The label file has the same shape with the two
//! lines `{label=0}` and `{label=1}`. Spaces inside level names become
//! underscores so every line splits cleanly on whitespace.

use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::io::create_file;
use crate::table::CategoricalTable;

pub fn write_items<W: Write>(table: &CategoricalTable, out: &mut W) -> std::io::Result<()> {
    let offsets = table.one_hot_offsets();
    let names = table.item_names();
    for (f, feature) in table.features.iter().enumerate() {
        for code in 0..feature.levels.len() {
            write!(out, "{}", names[offsets[f] + code].replace(' ', "_"))?;
            for row in &table.rows {
                write!(out, " {}", u8::from(row[f] as usize == code))?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

pub fn write_labels<W: Write>(table: &CategoricalTable, out: &mut W) -> std::io::Result<()> {
    for class in 0..2u8 {
        write!(out, "{{label={}}}", class)?;
        for label in &table.labels {
            write!(out, " {}", u8::from(*label == class))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Write `<stem>.tab` and `<stem>.label` into `dir`.
pub fn export(table: &CategoricalTable, dir: &Path, stem: &str) -> Result<()> {
    let data_path = dir.join(format!("{}.tab", stem));
    let mut data = BufWriter::new(create_file(&data_path)?);
    write_items(table, &mut data)
        .and_then(|_| data.flush())
        .map_err(|e| PipelineError::io(&data_path, e))?;

    let label_path = dir.join(format!("{}.label", stem));
    let mut labels = BufWriter::new(create_file(&label_path)?);
    write_labels(table, &mut labels)
        .and_then(|_| labels.flush())
        .map_err(|e| PipelineError::io(&label_path, e))?;
    Ok(())
}
