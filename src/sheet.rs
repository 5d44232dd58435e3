//! Spreadsheet input and output.
//!
//! Recipient data lives in a single worksheet whose first row holds the
//! column names. Cells are carried as JSON values so a record hashes the
//! same whether it came from a workbook, a CSV file or the remote sheet.

use crate::error::{ReceiptError, Result, ResultExt as _};
use crate::record::{RecipientRecord, display_value};
use calamine::{Data, DataType as _, Reader as _, open_workbook_auto};
use rust_xlsxwriter::{Format, Workbook};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Largest float that is still an exact integer.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// A header row and the data rows below it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { headers, rows }
    }

    /// Index of the first row whose width differs from the header.
    pub fn ragged_row(&self) -> Option<usize> {
        self.rows.iter().position(|row| row.len() != self.headers.len())
    }

    /// One record per row, skipping rows where every cell is empty.
    pub fn records(&self) -> Vec<RecipientRecord> {
        self.rows
            .iter()
            .filter(|row| !is_blank_row(row))
            .map(|row| RecipientRecord::from_row(&self.headers, row))
            .collect()
    }
}

fn is_blank_row(row: &[Value]) -> bool {
    row.iter().all(|cell| display_value(cell).trim().is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetFormat {
    Workbook,
    Csv,
}

fn sheet_format(path: &Path) -> Result<SheetFormat> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(SheetFormat::Workbook),
        "csv" => Ok(SheetFormat::Csv),
        _ => Err(ReceiptError::Spreadsheet(format!(
            "Unsupported spreadsheet extension: {}",
            path.display()
        ))),
    }
}

/// Load the first worksheet of `path`.
///
/// # Errors
///
/// Returns error if the file is missing, unreadable or of an unsupported type.
pub fn load_table(path: &Path) -> Result<Table> {
    let table = match sheet_format(path)? {
        SheetFormat::Workbook => load_workbook(path)?,
        SheetFormat::Csv => load_csv(path)?,
    };

    tracing::info!(
        rows = table.rows.len(),
        columns = table.headers.len(),
        "Loaded {}",
        path.display()
    );
    Ok(table)
}

fn load_workbook(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ReceiptError::Spreadsheet(format!("No worksheet in {}", path.display())))??;

    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|header| header.iter().map(|cell| display_value(&cell_value(cell))).collect())
        .unwrap_or_default();
    let rows = rows.map(|row| row.iter().map(cell_value).collect()).collect();

    Ok(Table { headers, rows })
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_INT => Value::from(*f as i64),
        Data::Float(f) => Value::from(*f),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) if dt.time() == chrono::NaiveTime::MIN => {
                Value::String(dt.format("%Y-%m-%d").to_string())
            }
            Some(dt) => Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Value::String(cell.to_string()),
        },
    }
}

fn load_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let headers = reader.headers()?.iter().map(str::to_owned).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        Value::Null
                    } else {
                        Value::String(cell.to_owned())
                    }
                })
                .collect(),
        );
    }

    Ok(Table { headers, rows })
}

/// Write `table` to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns error if a row's width differs from the header, the extension is
/// unsupported, or the file cannot be written. Nothing is written on error.
pub fn save_table(table: &Table, path: &Path) -> Result<()> {
    if let Some(idx) = table.ragged_row() {
        return Err(ReceiptError::Spreadsheet(format!(
            "Row {} has {} cells, expected {}",
            idx + 1,
            table.rows.get(idx).map_or(0, Vec::len),
            table.headers.len()
        )));
    }

    match sheet_format(path)? {
        SheetFormat::Workbook => save_workbook(table, path),
        SheetFormat::Csv => save_csv(table, path),
    }
}

fn save_workbook(table: &Table, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let bold = Format::new().set_bold();

    for (col, header) in (0u16..).zip(&table.headers) {
        worksheet.write_string_with_format(0, col, header, &bold)?;
    }

    for (row, cells) in (1u32..).zip(&table.rows) {
        for (col, cell) in (0u16..).zip(cells) {
            match cell {
                Value::Null => {}
                Value::Bool(b) => {
                    worksheet.write_boolean(row, col, *b)?;
                }
                Value::Number(n) => {
                    worksheet.write_number(row, col, n.as_f64().unwrap_or_default())?;
                }
                Value::String(s) => {
                    worksheet.write_string(row, col, s)?;
                }
                Value::Array(_) | Value::Object(_) => {
                    worksheet.write_string(row, col, cell.to_string())?;
                }
            }
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to write workbook {}", path.display()))?;
    Ok(())
}

fn save_csv(table: &Table, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(display_value))?;
    }
    writer.flush()?;
    Ok(())
}

/// The synced spreadsheet when it exists, otherwise the fallback.
pub fn resolve_recipient_source(primary: &Path, fallback: &Path) -> PathBuf {
    if primary.exists() {
        primary.to_path_buf()
    } else {
        tracing::debug!(
            "{} not found, using {}",
            primary.display(),
            fallback.display()
        );
        fallback.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn sample() -> Table {
        Table::new(
            vec![
                "Name".to_owned(),
                "Amount".to_owned(),
                "Due Amount".to_owned(),
                "Paid".to_owned(),
            ],
            vec![
                vec![json!("Alice"), json!(5000), json!(0), json!(true)],
                vec![json!("Bob"), json!(1200.5), Value::Null, json!(false)],
            ],
        )
    }

    #[test]
    fn test_xlsx_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("recipients.xlsx");

        save_table(&sample(), &path).unwrap();
        let loaded = load_table(&path).unwrap();

        assert_eq!(loaded.headers, sample().headers);
        assert_eq!(loaded.rows.len(), 2);
        assert_eq!(loaded.rows[0][0], json!("Alice"));
        assert_eq!(loaded.rows[0][1], json!(5000));
        assert_eq!(loaded.rows[0][3], json!(true));
        assert_eq!(loaded.rows[1][1], json!(1200.5));
        assert_eq!(loaded.rows[1][2], Value::Null);
    }

    #[test]
    fn test_csv_round_trip_keeps_text() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("recipients.csv");

        save_table(&sample(), &path).unwrap();
        let loaded = load_table(&path).unwrap();

        assert_eq!(loaded.headers, sample().headers);
        assert_eq!(loaded.rows[0][1], json!("5000"));
        assert_eq!(loaded.rows[1][1], json!("1200.5"));
        assert_eq!(loaded.rows[1][2], Value::Null);
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.xlsx");
        let table = Table::new(
            vec!["Name".to_owned(), "Amount".to_owned()],
            vec![vec![json!("Alice")]],
        );

        let err = save_table(&table, &path).unwrap_err();
        assert!(matches!(err, ReceiptError::Spreadsheet(_)));
        assert!(!path.exists());
    }

    #[test]
    fn test_unsupported_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("recipients.txt");
        fs::write(&path, "Name\nAlice\n").unwrap();

        assert!(load_table(&path).is_err());
        assert!(save_table(&sample(), &path).is_err());
    }

    #[test]
    fn test_records_skip_blank_rows() {
        let table = Table::new(
            vec!["Name".to_owned(), "Amount".to_owned()],
            vec![
                vec![json!("Alice"), json!("5000")],
                vec![Value::Null, json!("")],
                vec![json!("Bob"), Value::Null],
            ],
        );

        let records = table.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text("Name"), "Alice");
        assert_eq!(records[1].get("Amount"), Some(&Value::Null));
    }

    #[test]
    fn test_resolve_recipient_source() {
        let temp_dir = TempDir::new().unwrap();
        let primary = temp_dir.path().join("recipients_data.xlsx");
        let fallback = temp_dir.path().join("recipients.xlsx");

        assert_eq!(resolve_recipient_source(&primary, &fallback), fallback);
        fs::write(&primary, b"").unwrap();
        assert_eq!(resolve_recipient_source(&primary, &fallback), primary);
    }
}
