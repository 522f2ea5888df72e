use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{NaiveDateTime, NaiveTime};

use crate::error::ImportError;

/// Uploads are rejected above this size before any parsing happens.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// One worksheet flattened to trimmed cell text. `rows` starts at the
/// first data row; spreadsheet row numbers for reporting are therefore
/// `index + 2` (row 1 is the header).
#[derive(Debug)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    /// 1-based spreadsheet row number for a data row index.
    pub fn row_number(idx: usize) -> usize {
        idx + 2
    }
}

/// Decode an upload into ordered sheets. The declared extension decides
/// the decoder; xlsx/xls go through calamine, csv through the csv crate
/// as a single unnamed sheet.
pub fn parse_file(bytes: &[u8], extension: &str) -> Result<Vec<Sheet>, ImportError> {
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ImportError::Format(
            "file exceeds the 10 MB upload limit".to_string(),
        ));
    }
    match extension.to_ascii_lowercase().as_str() {
        "xlsx" | "xls" => parse_workbook(bytes),
        "csv" => parse_csv(bytes),
        other => Err(ImportError::Format(format!(
            "unsupported file type: .{} (expected .xlsx, .xls or .csv)",
            other
        ))),
    }
}

fn parse_workbook(bytes: &[u8]) -> Result<Vec<Sheet>, ImportError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| ImportError::Format(format!("could not read workbook: {}", e)))?;

    let mut sheets = Vec::new();
    for (name, range) in workbook.worksheets() {
        let mut rows_iter = range.rows();
        let Some(header_row) = rows_iter.next() else {
            continue;
        };
        let headers = header_row.iter().map(cell_text).collect::<Vec<_>>();
        let rows = rows_iter
            .map(|r| r.iter().map(cell_text).collect::<Vec<_>>())
            .filter(|r: &Vec<String>| r.iter().any(|c| !c.is_empty()))
            .collect();
        sheets.push(Sheet {
            name,
            headers,
            rows,
        });
    }

    if sheets.is_empty() {
        return Err(ImportError::Format(
            "workbook contains no sheets".to_string(),
        ));
    }
    Ok(sheets)
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<Sheet>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| ImportError::Format(format!("could not read csv: {}", e)))?;
        records.push(
            record
                .iter()
                .map(|c| c.trim().to_string())
                .collect::<Vec<_>>(),
        );
    }

    let mut iter = records.into_iter();
    let Some(headers) = iter.next() else {
        return Err(ImportError::Format("file contains no rows".to_string()));
    };
    let rows = iter
        .filter(|r| r.iter().any(|c| !c.is_empty()))
        .collect::<Vec<_>>();

    Ok(vec![Sheet {
        name: "Sheet1".to_string(),
        headers,
        rows,
    }])
}

/// Stringify one cell. Native date/time values become 24-hour "HH:MM"
/// using the cell's own calendar time; floats print without a trailing
/// ".0"; everything else is trimmed text. Empty cells become "".
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => format!("{}", n),
        Data::Bool(b) => {
            if *b {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        Data::Error(e) => format!("#{:?}", e),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => naive.format("%H:%M").to_string(),
            None => format!("{}", dt.as_f64()),
        },
        Data::DateTimeIso(s) => iso_to_hhmm(s),
        Data::DurationIso(s) => s.trim().to_string(),
    }
}

fn iso_to_hhmm(s: &str) -> String {
    let t = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S") {
        return dt.format("%H:%M").to_string();
    }
    if let Ok(time) = NaiveTime::parse_from_str(t, "%H:%M:%S") {
        return time.format("%H:%M").to_string();
    }
    t.to_string()
}
