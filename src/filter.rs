use crate::schema::{Dataset, Dimension};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Spanish month names in calendar order, as they appear in the `Fecha` column.
pub const MONTH_ORDER: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// Allowed values for one dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "values")]
pub enum Selection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl Selection {
    pub fn only<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Only(values.into_iter().map(Into::into).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }
}

/// Per-session filter state: one selection per dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    #[serde(default)]
    pub year: Selection,
    #[serde(default)]
    pub period: Selection,
    #[serde(default)]
    pub month: Selection,
    #[serde(default)]
    pub branch: Selection,
}

impl FilterSelection {
    pub fn get(&self, dimension: Dimension) -> &Selection {
        match dimension {
            Dimension::Year => &self.year,
            Dimension::Period => &self.period,
            Dimension::Month => &self.month,
            Dimension::Branch => &self.branch,
        }
    }

    pub fn set(&mut self, dimension: Dimension, selection: Selection) {
        match dimension {
            Dimension::Year => self.year = selection,
            Dimension::Period => self.period = selection,
            Dimension::Month => self.month = selection,
            Dimension::Branch => self.branch = selection,
        }
    }
}

/// Restricts a dataset to the records matching every active dimension filter.
///
/// A dimension only filters when its column exists and the selection covers
/// fewer values than the dimension's domain in `dataset`, so selecting
/// everything never narrows the result. An empty explicit selection is inert.
pub fn apply_filters(dataset: &Dataset, selection: &FilterSelection) -> Dataset {
    let active: Vec<(Dimension, &BTreeSet<String>)> = Dimension::ALL
        .iter()
        .filter_map(|&dimension| {
            active_values(dataset, dimension, selection.get(dimension)).map(|v| (dimension, v))
        })
        .collect();

    if active.is_empty() {
        return dataset.clone();
    }

    let records = dataset
        .records
        .iter()
        .filter(|record| {
            active.iter().all(|(dimension, allowed)| {
                record
                    .dimension(*dimension)
                    .map(|value| allowed.contains(value))
                    .unwrap_or(false)
            })
        })
        .cloned()
        .collect::<Vec<_>>();

    debug!(
        "Filters on {:?} kept {} of {} records",
        active.iter().map(|(d, _)| *d).collect::<Vec<_>>(),
        records.len(),
        dataset.len()
    );

    dataset.with_records(records)
}

fn active_values<'a>(
    dataset: &Dataset,
    dimension: Dimension,
    selection: &'a Selection,
) -> Option<&'a BTreeSet<String>> {
    let values = match selection {
        Selection::All => return None,
        Selection::Only(values) if values.is_empty() => return None,
        Selection::Only(values) => values,
    };

    if !dataset.has_dimension(dimension) {
        return None;
    }

    let domain = dataset.distinct_values(dimension);
    let covered = domain.iter().filter(|v| values.contains(**v)).count();
    (covered < domain.len()).then_some(values)
}

/// Values a presentation layer offers for each dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub years: Vec<String>,
    pub periods: Vec<String>,
    pub months: Vec<String>,
    pub branches: Vec<String>,
}

impl FilterOptions {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let sorted = |dimension: Dimension| -> Vec<String> {
            if !dataset.has_dimension(dimension) {
                return Vec::new();
            }
            let mut values: Vec<String> = dataset
                .distinct_values(dimension)
                .into_iter()
                .map(String::from)
                .collect();
            values.sort_by(|a, b| compare_values(a, b));
            values
        };

        Self {
            years: sorted(Dimension::Year),
            periods: sorted(Dimension::Period),
            months: months_in_calendar_order(dataset),
            branches: sorted(Dimension::Branch),
        }
    }

    pub fn values(&self, dimension: Dimension) -> &[String] {
        match dimension {
            Dimension::Year => &self.years,
            Dimension::Period => &self.periods,
            Dimension::Month => &self.months,
            Dimension::Branch => &self.branches,
        }
    }
}

fn months_in_calendar_order(dataset: &Dataset) -> Vec<String> {
    if !dataset.has_dimension(Dimension::Month) {
        return Vec::new();
    }
    let present = dataset.distinct_values(Dimension::Month);

    let mut months: Vec<String> = MONTH_ORDER
        .iter()
        .filter(|m| present.contains(**m))
        .map(|m| m.to_string())
        .collect();

    // Unrecognized labels stay selectable, after the calendar months.
    months.extend(
        present
            .iter()
            .filter(|m| !MONTH_ORDER.contains(*m))
            .map(|m| m.to_string()),
    );
    months
}

/// Numeric when both sides parse, lexicographic otherwise.
fn compare_values(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
