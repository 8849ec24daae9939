use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;
use std::io::Write;
use tracing::{debug, warn};

use crate::csv_reader::CsvData;
use crate::schema::{
    infer_column_type, is_missing, parse_date, parse_number, ColumnSchema, ColumnType, Schema, SchemaOverrides,
};

/// Typed cell storage for one column. `None` is a null (empty cell).
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
    Temporal(Vec<Option<NaiveDate>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
            ColumnData::Temporal(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Numeric(_) => ColumnType::Numeric,
            ColumnData::Categorical(_) => ColumnType::Categorical,
            ColumnData::Temporal(_) => ColumnType::Temporal,
        }
    }

    /// Render a cell back to text (used for raw export)
    fn cell_text(&self, row: usize) -> String {
        match self {
            ColumnData::Numeric(v) => v[row].map(|n| n.to_string()).unwrap_or_default(),
            ColumnData::Categorical(v) => v[row].clone().unwrap_or_default(),
            ColumnData::Temporal(v) => v[row]
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }

    fn select(&self, keep: &[usize]) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(keep.iter().map(|&i| v[i]).collect()),
            ColumnData::Categorical(v) => {
                ColumnData::Categorical(keep.iter().map(|&i| v[i].clone()).collect())
            }
            ColumnData::Temporal(v) => ColumnData::Temporal(keep.iter().map(|&i| v[i]).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// Immutable, typed in-memory table. The schema is computed once when the
/// dataset is built and travels with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    schema: Schema,
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Build a typed dataset from raw CSV records
    pub fn from_csv(csv: CsvData, overrides: &SchemaOverrides) -> Result<Self> {
        Self::from_records(csv.headers, csv.rows, overrides)
    }

    /// Build a typed dataset from headers and string rows, inferring each
    /// column's semantic type once.
    pub fn from_records(
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
        overrides: &SchemaOverrides,
    ) -> Result<Self> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                anyhow::bail!(
                    "Row {} has {} fields, expected {}",
                    idx + 1,
                    row.len(),
                    headers.len()
                );
            }
        }

        for name in overrides.names() {
            if !headers.iter().any(|h| h.eq_ignore_ascii_case(name)) {
                warn!(column = %name, "categorical override names a column not in the dataset");
            }
        }

        let mut columns = Vec::with_capacity(headers.len());
        let mut schema_columns = Vec::with_capacity(headers.len());

        for (col_idx, name) in headers.iter().enumerate() {
            let cells = rows.iter().map(|r| r[col_idx].as_str());
            let column_type = if overrides.forces_categorical(name) {
                ColumnType::Categorical
            } else {
                infer_column_type(cells.clone())
            };

            let data = match column_type {
                ColumnType::Numeric => ColumnData::Numeric(cells.map(parse_number).collect()),
                ColumnType::Temporal => ColumnData::Temporal(cells.map(parse_date).collect()),
                ColumnType::Categorical => ColumnData::Categorical(
                    cells
                        .map(|c| if is_missing(c) { None } else { Some(c.trim().to_string()) })
                        .collect(),
                ),
            };

            debug!(column = %name, %column_type, "inferred column type");
            schema_columns.push(ColumnSchema {
                name: name.clone(),
                column_type,
            });
            columns.push(Column {
                name: name.clone(),
                data,
            });
        }

        Ok(Self {
            schema: Schema::new(schema_columns),
            columns,
            row_count: rows.len(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.schema.index_of(name).map(|idx| &self.columns[idx])
    }

    pub fn numeric(&self, name: &str) -> Option<&[Option<f64>]> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Numeric(v)) => Some(v),
            _ => None,
        }
    }

    pub fn categorical(&self, name: &str) -> Option<&[Option<String>]> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Categorical(v)) => Some(v),
            _ => None,
        }
    }

    pub fn temporal(&self, name: &str) -> Option<&[Option<NaiveDate>]> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Temporal(v)) => Some(v),
            _ => None,
        }
    }

    /// New dataset holding only the rows accepted by `keep`. The schema is
    /// carried over unchanged.
    pub fn filter_rows<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(usize) -> bool,
    {
        let kept: Vec<usize> = (0..self.row_count).filter(|&i| keep(i)).collect();
        Self {
            schema: self.schema.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    data: c.data.select(&kept),
                })
                .collect(),
            row_count: kept.len(),
        }
    }

    /// Rows whose date in `date_column` falls in `year`
    pub fn filter_year(&self, date_column: &str, year: i32) -> Result<Self> {
        let dates = self
            .temporal(date_column)
            .ok_or_else(|| anyhow!("Column '{}' is not a temporal column", date_column))?;
        Ok(self.filter_rows(|i| dates[i].map(|d| d.year() == year).unwrap_or(false)))
    }

    /// Distinct years present in a temporal column, ascending
    pub fn years(&self, date_column: &str) -> Result<Vec<i32>> {
        let dates = self
            .temporal(date_column)
            .ok_or_else(|| anyhow!("Column '{}' is not a temporal column", date_column))?;
        let years: BTreeSet<i32> = dates.iter().flatten().map(|d| d.year()).collect();
        Ok(years.into_iter().collect())
    }

    /// Write the dataset back out as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.columns.iter().map(|c| c.name.as_str()))
            .context("Failed to write CSV header")?;
        for row in 0..self.row_count {
            wtr.write_record(self.columns.iter().map(|c| c.data.cell_text(row)))
                .context("Failed to write CSV record")?;
        }
        wtr.flush().context("Failed to flush CSV output")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_csv(headers: Vec<&str>, rows: Vec<Vec<&str>>) -> CsvData {
        CsvData {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    fn make_dataset() -> Dataset {
        let csv = make_csv(
            vec!["dteday", "season", "cnt"],
            vec![
                vec!["2011-01-01", "1", "985"],
                vec!["2011-06-01", "2", "4000"],
                vec!["2012-01-01", "1", "2294"],
                vec!["2012-07-01", "3", ""],
            ],
        );
        Dataset::from_csv(csv, &SchemaOverrides::categorical(["season"])).unwrap()
    }

    #[test]
    fn test_typed_columns() {
        let ds = make_dataset();
        assert_eq!(ds.row_count(), 4);
        assert_eq!(ds.schema().column_type("dteday"), Some(ColumnType::Temporal));
        assert_eq!(ds.schema().column_type("season"), Some(ColumnType::Categorical));
        assert_eq!(ds.schema().column_type("cnt"), Some(ColumnType::Numeric));
        assert_eq!(ds.numeric("cnt").unwrap()[3], None);
        assert_eq!(ds.categorical("season").unwrap()[2], Some("1".to_string()));
        assert!(ds.numeric("season").is_none());
    }

    #[test]
    fn test_filter_year() {
        let ds = make_dataset();
        let y2012 = ds.filter_year("dteday", 2012).unwrap();
        assert_eq!(y2012.row_count(), 2);
        assert_eq!(y2012.schema(), ds.schema());
        assert_eq!(y2012.numeric("cnt").unwrap()[0], Some(2294.0));
    }

    #[test]
    fn test_filter_year_requires_temporal() {
        let ds = make_dataset();
        assert!(ds.filter_year("cnt", 2011).is_err());
    }

    #[test]
    fn test_years() {
        let ds = make_dataset();
        assert_eq!(ds.years("dteday").unwrap(), vec![2011, 2012]);
    }

    #[test]
    fn test_ragged_records_rejected() {
        let result = Dataset::from_records(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into()]],
            &SchemaOverrides::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_write_csv() {
        let ds = make_dataset().filter_year("dteday", 2011).unwrap();
        let mut out = Vec::new();
        ds.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "dteday,season,cnt\n2011-01-01,1,985\n2011-06-01,2,4000\n");
    }
}
