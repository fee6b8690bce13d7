//! Tabular data parsing: spreadsheets via calamine, CSV via the csv crate.
//!
//! The first row is the header; every following row becomes one
//! [`Record`], in sheet order. Only the first worksheet of a workbook is read.
//! Cells are coerced to text, and empty cells become empty strings.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use docfill_core::backend::TabularParser;
use docfill_core::error::{DocfillError, Result};
use docfill_core::record::Record;

const WORKBOOK_FORMATS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parses `.xlsx`/`.xlsm`/`.xlsb`/`.xls`/`.ods` workbooks and `.csv` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpreadsheetParser;

impl TabularParser for SpreadsheetParser {
    fn formats(&self) -> &'static [&'static str] {
        &["xlsx", "xlsm", "xlsb", "xls", "ods", "csv"]
    }

    fn parse(&self, bytes: &[u8], format: &str) -> Result<Vec<Record>> {
        let format = format.to_ascii_lowercase();
        if format == "csv" {
            parse_csv(bytes)
        } else if WORKBOOK_FORMATS.contains(&format.as_str()) {
            parse_workbook(bytes)
        } else {
            Err(DocfillError::UnsupportedFormat {
                format,
                supported: self.formats().join(", "),
            })
        }
    }
}

fn parse_workbook(bytes: &[u8]) -> Result<Vec<Record>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| DocfillError::TabularParse(format!("cannot open workbook: {e}")))?;

    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| DocfillError::TabularParse(format!("cannot read sheet '{sheet}': {e}")))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let header: Vec<String> = header_row
        .iter()
        .map(|cell| cell_text(cell).trim().to_string())
        .collect();

    tracing::debug!(sheet = %sheet, columns = header.len(), "reading worksheet");
    Ok(rows.map(|row| to_record(&header, row.iter().map(cell_text))).collect())
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<Record>> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| DocfillError::TabularParse(format!("cannot read CSV header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|e| {
            DocfillError::TabularParse(format!("CSV row {}: {e}", index + 2))
        })?;
        records.push(to_record(&header, row.iter().map(str::to_string)));
    }
    Ok(records)
}

/// Pair cells with header names. Unnamed columns are dropped; short rows simply
/// omit the trailing fields.
fn to_record(header: &[String], cells: impl Iterator<Item = String>) -> Record {
    header
        .iter()
        .zip(cells)
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.clone(), value))
        .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}
