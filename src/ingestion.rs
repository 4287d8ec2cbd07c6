use crate::error::{PnlError, Result};
use crate::schema::{Dataset, Dimension, LineColumn, Measures, RawRecord};
use calamine::{open_workbook_auto, Data, Reader};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Sheet read when present; otherwise the workbook's first sheet is used.
pub const DEFAULT_SHEET: &str = "datos";

/// A single cell as read from the source, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

/// Header row plus data rows of one sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MeasureField {
    Actual,
    PriorYear,
    Budget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Account,
    SubAccount,
    Line(LineColumn),
    Dimension(Dimension),
    Measure(MeasureField),
}

fn field_for_header(header: &str) -> Option<Field> {
    let field = match header.trim().to_lowercase().as_str() {
        "cuentas" | "cuenta" | "account" => Field::Account,
        "subcuenta" | "subaccount" | "sub account" => Field::SubAccount,
        "linea" | "línea" | "line" => Field::Line(LineColumn::Linea),
        "tipo" | "type" => Field::Line(LineColumn::Tipo),
        "detalle" | "detail" => Field::Line(LineColumn::Detalle),
        "subsubcuenta" => Field::Line(LineColumn::SubSubCuenta),
        "anual" | "year" => Field::Dimension(Dimension::Year),
        "periodo" | "period" => Field::Dimension(Dimension::Period),
        "fecha" | "month" => Field::Dimension(Dimension::Month),
        "sucursal" | "branch" => Field::Dimension(Dimension::Branch),
        "act" | "actual" => Field::Measure(MeasureField::Actual),
        "aa" | "prioryear" | "prior year" => Field::Measure(MeasureField::PriorYear),
        "ppto" | "budget" => Field::Measure(MeasureField::Budget),
        _ => return None,
    };
    Some(field)
}

/// Loads and normalizes a ledger source. Workbooks go through calamine, `.csv` through csv.
pub fn load_dataset(path: &Path, preferred_sheet: &str) -> Result<Dataset> {
    if !path.exists() {
        return Err(PnlError::data_unavailable(path, "file not found"));
    }

    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    let table = if is_csv {
        read_csv(path)?
    } else {
        read_workbook(path, preferred_sheet)?
    };

    let dataset = normalize(&table);
    info!(
        "Loaded {} records from {} ({} dimension columns, {} line columns)",
        dataset.len(),
        path.display(),
        dataset.dimensions.len(),
        dataset.line_columns.len()
    );
    Ok(dataset)
}

pub fn read_workbook(path: &Path, preferred_sheet: &str) -> Result<RawTable> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| PnlError::data_unavailable(path, e))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let sheet = if sheet_names.iter().any(|s| s == preferred_sheet) {
        preferred_sheet.to_string()
    } else {
        match sheet_names.first() {
            Some(first) => {
                debug!(
                    "Sheet '{}' not found in {}, falling back to '{}'",
                    preferred_sheet,
                    path.display(),
                    first
                );
                first.clone()
            }
            None => return Err(PnlError::data_unavailable(path, "workbook has no sheets")),
        }
    };

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| PnlError::data_unavailable(path, e))?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => header_row.iter().map(header_text).collect(),
        None => return Ok(RawTable::default()),
    };

    let rows = rows
        .map(|row| row.iter().map(cell_from_data).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|c| *c != Cell::Empty))
        .collect();

    Ok(RawTable { headers, rows })
}

pub fn read_csv(path: &Path) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| PnlError::data_unavailable(path, e))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PnlError::data_unavailable(path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| PnlError::data_unavailable(path, e))?;
        let row: Vec<Cell> = record
            .iter()
            .map(|value| {
                if value.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(value.to_string())
                }
            })
            .collect();
        if row.iter().any(|c| *c != Cell::Empty) {
            rows.push(row);
        }
    }

    Ok(RawTable { headers, rows })
}

fn header_text(cell: &Data) -> String {
    match cell_from_data(cell) {
        Cell::Empty => String::new(),
        Cell::Number(n) => format_number_text(n),
        Cell::Text(s) => s.trim().to_string(),
    }
}

fn cell_from_data(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Text(b.to_string()),
    }
}

/// Normalizes a raw table into records, filling absent columns with blanks or zeros.
pub fn normalize(table: &RawTable) -> Dataset {
    let mut columns: BTreeMap<usize, Field> = BTreeMap::new();
    let mut seen: Vec<Field> = Vec::new();
    for (idx, header) in table.headers.iter().enumerate() {
        if let Some(field) = field_for_header(header) {
            // First column wins when a header repeats.
            if !seen.contains(&field) {
                seen.push(field);
                columns.insert(idx, field);
            }
        }
    }

    if !seen.contains(&Field::Account) {
        warn!("Source has no account column; every record is filed under an empty account");
    }
    if !seen.contains(&Field::SubAccount) {
        warn!("Source has no sub-account column; level 1 will be empty");
    }
    for (measure, name) in [
        (MeasureField::Actual, "ACT"),
        (MeasureField::PriorYear, "AA"),
        (MeasureField::Budget, "PPTO"),
    ] {
        if !seen.contains(&Field::Measure(measure)) {
            warn!("Source has no {} column; treating it as zero", name);
        }
    }

    let dimensions: BTreeSet<Dimension> = seen
        .iter()
        .filter_map(|f| match f {
            Field::Dimension(d) => Some(*d),
            _ => None,
        })
        .collect();
    let line_columns: BTreeSet<LineColumn> = seen
        .iter()
        .filter_map(|f| match f {
            Field::Line(c) => Some(*c),
            _ => None,
        })
        .collect();

    let mut malformed = 0usize;
    let records = table
        .rows
        .iter()
        .map(|row| {
            let mut record = RawRecord::new(String::new(), String::new(), Measures::default());
            for (&idx, field) in &columns {
                let cell = row.get(idx).unwrap_or(&Cell::Empty);
                match field {
                    Field::Account => record.account = cell_text(cell).unwrap_or_default(),
                    Field::SubAccount => record.sub_account = cell_text(cell).unwrap_or_default(),
                    Field::Line(column) => {
                        record
                            .lines
                            .insert(*column, cell_text(cell).unwrap_or_default());
                    }
                    Field::Dimension(dimension) => {
                        if let Some(value) = cell_text(cell) {
                            record.dimensions.insert(*dimension, value.trim().to_string());
                        }
                    }
                    Field::Measure(measure) => {
                        let value = parse_measure(cell).unwrap_or_else(|| {
                            if *cell != Cell::Empty {
                                malformed += 1;
                            }
                            0.0
                        });
                        match measure {
                            MeasureField::Actual => record.measures.actual = value,
                            MeasureField::PriorYear => record.measures.prior_year = value,
                            MeasureField::Budget => record.measures.budget = value,
                        }
                    }
                }
            }
            record
        })
        .collect();

    if malformed > 0 {
        debug!("Coerced {} unparseable measure cells to zero", malformed);
    }

    Dataset::new(records, dimensions, line_columns)
}

/// Numeric value of a measure cell; `None` for blanks and anything unparseable.
pub fn parse_measure(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Empty => None,
        Cell::Number(n) => n.is_finite().then_some(*n),
        Cell::Text(s) => parse_locale_number(s),
    }
}

/// Parses text using "." as thousands separator and "," as decimal point.
///
/// `"1.234,56"` becomes `1234.56`.
pub fn parse_locale_number(text: &str) -> Option<f64> {
    let cleaned = text.trim().replace('.', "").replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn cell_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        Cell::Number(n) => Some(format_number_text(*n)),
        Cell::Text(s) if s.trim().is_empty() => None,
        Cell::Text(s) => Some(s.clone()),
    }
}

/// Whole numbers render without a fraction so `2024.0` reads as `"2024"`.
fn format_number_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
