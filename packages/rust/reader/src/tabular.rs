//! CSV and spreadsheet parsing into [`Table`].

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use docsmith_shared::{DocsmithError, Result, Table};
use tracing::debug;

/// Parse a CSV file. The first record is the header; ragged rows are allowed.
pub(crate) fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;

    let headers = reader
        .headers()
        .map_err(|e| csv_error(path, e))?
        .iter()
        .map(str::to_string)
        .collect();
    let mut table = Table::new(headers);

    for record in reader.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        table.push_row(record.iter().map(str::to_string).collect());
    }

    debug!(rows = table.rows.len(), columns = table.headers.len(), "parsed CSV");
    Ok(table)
}

fn csv_error(path: &Path, err: csv::Error) -> DocsmithError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(io) => DocsmithError::io(path, io),
        _ => DocsmithError::parse(message),
    }
}

/// Parse the first worksheet of a spreadsheet. The first row is the header.
pub(crate) fn read_spreadsheet(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| DocsmithError::parse(format!("cannot open workbook: {e}")))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| DocsmithError::parse(format!("cannot read sheet: {e}")))?,
        None => return Err(DocsmithError::parse("workbook contains no worksheets")),
    };

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Table::default());
    };

    let headers = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            Data::Empty => format!("Unnamed: {i}"),
            other => cell_to_string(other),
        })
        .collect();
    let mut table = Table::new(headers);

    for row in rows {
        table.push_row(row.iter().map(cell_to_string).collect());
    }

    debug!(rows = table.rows.len(), columns = table.headers.len(), "parsed worksheet");
    Ok(table)
}

/// Convert one cell to display text.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        // Whole numbers read back from Excel as floats print without ".0".
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => {
                let mut text = value.format("%Y-%m-%d %H:%M:%S").to_string();
                // Midnight timestamps are plain dates.
                if text.ends_with(" 00:00:00") {
                    text.truncate("YYYY-MM-DD".len());
                }
                text
            }
            None => cell.to_string(),
        },
        Data::Error(e) => format!("#ERR:{e:?}"),
        other => other.to_string(),
    }
}
