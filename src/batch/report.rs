//! Aggregate result table
//!
//! One CSV row per record, columns in [`AnalysisRecord::COLUMNS`] order.
//! The header is always written, so an empty batch still yields a valid file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::{AnalysisError, Result};
use crate::AnalysisRecord;

/// Write `records` as CSV to `path`, creating parent directories
pub fn write_results_csv(path: &Path, records: &[AnalysisRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| AnalysisError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| AnalysisError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write_csv(&mut writer, records).map_err(|e| AnalysisError::io(path, e))?;
    writer.flush().map_err(|e| AnalysisError::io(path, e))?;
    log::info!("Results saved to {} ({} rows)", path.display(), records.len());
    Ok(())
}

/// Write the CSV table to any writer
pub fn write_csv<W: Write>(writer: &mut W, records: &[AnalysisRecord]) -> io::Result<()> {
    writeln!(writer, "{}", AnalysisRecord::COLUMNS.join(","))?;
    for record in records {
        let row: Vec<String> = record.values().iter().map(|v| escape(v)).collect();
        writeln!(writer, "{}", row.join(","))?;
    }
    Ok(())
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
