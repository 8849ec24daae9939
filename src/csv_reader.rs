// CSV ingestion for dashboard datasets

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Raw CSV contents: header row plus untyped records
#[derive(Debug, Clone, PartialEq)]
pub struct CsvData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Read CSV data from any reader
pub fn read_csv<R: Read>(reader: R) -> Result<CsvData> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("Failed to read CSV header row")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.is_empty() {
        anyhow::bail!("CSV input has no header row");
    }

    let mut rows = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        // Line 1 is the header
        let record = record.with_context(|| format!("Malformed CSV record at line {}", idx + 2))?;
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }

    Ok(CsvData { headers, rows })
}

/// Read CSV data from a file on disk
pub fn read_csv_file<P: AsRef<Path>>(path: P) -> Result<CsvData> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file '{}'", path.display()))?;
    read_csv(file).with_context(|| format!("Failed to parse CSV file '{}'", path.display()))
}

/// Read CSV data from stdin
pub fn read_csv_from_stdin() -> Result<CsvData> {
    let stdin = io::stdin();
    read_csv(stdin.lock())
}
