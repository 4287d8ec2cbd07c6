use crate::error::{PnlError, Result};
use crate::view::ViewRow;

/// Placeholder shown for a ratio whose denominator was zero.
pub const NULL_RATIO: &str = "—";

/// Whole units with "." grouping, rounding toward negative infinity.
pub fn format_amount(value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }
    let whole = value.floor();
    let digits = format!("{:.0}", whole.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if whole < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Percentage with one decimal, e.g. `0.1234` → `"12.3 %"`.
pub fn format_ratio(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.1} %", v * 100.0),
        _ => NULL_RATIO.to_string(),
    }
}

const HEADERS: [&str; 10] = [
    "Cuenta", "ACT", "%", "AA", "%", "VS AA", "%P", "PPTO", "%", "ALC",
];

fn row_cells(row: &ViewRow) -> [String; 10] {
    [
        row.label.clone(),
        format_amount(row.actual),
        format_ratio(Some(row.pct_act)),
        format_amount(row.prior_year),
        format_ratio(Some(row.pct_aa)),
        format_ratio(row.vs_aa),
        format_ratio(row.pct_p),
        format_amount(row.budget),
        format_ratio(Some(row.pct_ppto)),
        format_ratio(row.alc),
    ]
}

/// Raw view rows as CSV, one column per field; null ratios are empty cells.
pub fn rows_to_csv(rows: &[ViewRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "label", "level", "node", "depth", "expandable", "expanded", "actual", "pct_act",
            "prior_year", "pct_aa", "vs_aa", "pct_p", "budget", "pct_ppto", "alc",
        ])
        .map_err(|e| PnlError::Export(e.to_string()))?;

    let opt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    for row in rows {
        writer
            .write_record([
                row.label.clone(),
                row.level.tag().to_string(),
                row.node.to_string(),
                row.depth.to_string(),
                row.expandable.to_string(),
                row.expanded.to_string(),
                row.actual.to_string(),
                row.pct_act.to_string(),
                row.prior_year.to_string(),
                row.pct_aa.to_string(),
                opt(row.vs_aa),
                opt(row.pct_p),
                row.budget.to_string(),
                row.pct_ppto.to_string(),
                opt(row.alc),
            ])
            .map_err(|e| PnlError::Export(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| PnlError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| PnlError::Export(e.to_string()))
}

/// Fixed-width text rendering of the statement; total rows are marked with `*`.
pub fn rows_to_text_table(rows: &[ViewRow]) -> String {
    let body: Vec<[String; 10]> = rows.iter().map(row_cells).collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for cells in &body {
        for (w, cell) in widths.iter_mut().zip(cells.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let render = |cells: &[String], marker: char| {
        let mut line = String::new();
        line.push(marker);
        for (i, (cell, width)) in cells.iter().zip(widths.iter()).enumerate() {
            let pad = width - cell.chars().count();
            line.push(' ');
            if i == 0 {
                line.push_str(cell);
                line.push_str(&" ".repeat(pad));
            } else {
                line.push_str(&" ".repeat(pad));
                line.push_str(cell);
            }
        }
        line.trim_end().to_string()
    };

    let header: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    let mut output = render(&header, ' ');
    output.push('\n');
    for (row, cells) in rows.iter().zip(body.iter()) {
        output.push_str(&render(cells, if row.total_row { '*' } else { ' ' }));
        output.push('\n');
    }
    output
}
