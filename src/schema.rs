use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::AddAssign;

/// The four dimensions a statement can be filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Dimension {
    /// Fiscal year of the ledger line (source column 'Anual' / 'Year')
    Year,

    /// Reporting period (source column 'Periodo' / 'Period')
    Period,

    /// Month name (source column 'Fecha' / 'Month')
    Month,

    /// Branch or store (source column 'Sucursal' / 'Branch')
    Branch,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Year,
        Dimension::Period,
        Dimension::Month,
        Dimension::Branch,
    ];

    /// Canonical (Spanish) header of the source column.
    pub fn header(&self) -> &'static str {
        match self {
            Dimension::Year => "Anual",
            Dimension::Period => "Periodo",
            Dimension::Month => "Fecha",
            Dimension::Branch => "Sucursal",
        }
    }
}

/// Candidate columns for the third hierarchy level, in detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LineColumn {
    Linea,
    Tipo,
    Detalle,
    SubSubCuenta,
}

impl LineColumn {
    pub const PRIORITY: [LineColumn; 4] = [
        LineColumn::Linea,
        LineColumn::Tipo,
        LineColumn::Detalle,
        LineColumn::SubSubCuenta,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            LineColumn::Linea => "Linea",
            LineColumn::Tipo => "Tipo",
            LineColumn::Detalle => "Detalle",
            LineColumn::SubSubCuenta => "SubSubCuenta",
        }
    }
}

/// Actual, prior-year and budget amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Measures {
    pub actual: f64,
    pub prior_year: f64,
    pub budget: f64,
}

impl Measures {
    pub fn new(actual: f64, prior_year: f64, budget: f64) -> Self {
        Self {
            actual,
            prior_year,
            budget,
        }
    }
}

impl AddAssign for Measures {
    fn add_assign(&mut self, rhs: Self) {
        self.actual += rhs.actual;
        self.prior_year += rhs.prior_year;
        self.budget += rhs.budget;
    }
}

/// One normalized ledger line of the source sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub account: String,
    /// Empty when the line has no second level.
    pub sub_account: String,
    /// Values of the third-level candidate columns present in the source.
    pub lines: BTreeMap<LineColumn, String>,
    /// Dimension values; a missing entry means the cell was blank.
    pub dimensions: BTreeMap<Dimension, String>,
    pub measures: Measures,
}

impl RawRecord {
    pub fn new(account: impl Into<String>, sub_account: impl Into<String>, measures: Measures) -> Self {
        Self {
            account: account.into(),
            sub_account: sub_account.into(),
            lines: BTreeMap::new(),
            dimensions: BTreeMap::new(),
            measures,
        }
    }

    pub fn with_line(mut self, column: LineColumn, value: impl Into<String>) -> Self {
        self.lines.insert(column, value.into());
        self
    }

    pub fn with_dimension(mut self, dimension: Dimension, value: impl Into<String>) -> Self {
        self.dimensions.insert(dimension, value.into());
        self
    }

    pub fn dimension(&self, dimension: Dimension) -> Option<&str> {
        self.dimensions.get(&dimension).map(String::as_str)
    }

    pub fn line(&self, column: LineColumn) -> Option<&str> {
        self.lines.get(&column).map(String::as_str)
    }
}

/// The normalized record set plus which optional columns the source carried.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub records: Vec<RawRecord>,
    pub dimensions: BTreeSet<Dimension>,
    pub line_columns: BTreeSet<LineColumn>,
}

impl Dataset {
    pub fn new(
        records: Vec<RawRecord>,
        dimensions: BTreeSet<Dimension>,
        line_columns: BTreeSet<LineColumn>,
    ) -> Self {
        Self {
            records,
            dimensions,
            line_columns,
        }
    }

    /// Builds a dataset whose column set is whatever the records mention.
    pub fn from_records(records: Vec<RawRecord>) -> Self {
        let dimensions = records
            .iter()
            .flat_map(|r| r.dimensions.keys().copied())
            .collect();
        let line_columns = records
            .iter()
            .flat_map(|r| r.lines.keys().copied())
            .collect();
        Self::new(records, dimensions, line_columns)
    }

    /// A copy carrying the same column set but a different record subset.
    pub fn with_records(&self, records: Vec<RawRecord>) -> Self {
        Self::new(records, self.dimensions.clone(), self.line_columns.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_dimension(&self, dimension: Dimension) -> bool {
        self.dimensions.contains(&dimension)
    }

    /// Distinct non-missing values of a dimension.
    pub fn distinct_values(&self, dimension: Dimension) -> BTreeSet<&str> {
        self.records
            .iter()
            .filter_map(|r| r.dimension(dimension))
            .collect()
    }
}

/// Aggregation tier of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    #[serde(rename = "n0")]
    Account,
    #[serde(rename = "n1")]
    SubAccount,
    #[serde(rename = "n2")]
    Line,
}

impl Level {
    pub fn tag(&self) -> &'static str {
        match self {
            Level::Account => "n0",
            Level::SubAccount => "n1",
            Level::Line => "n2",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "n0" => Some(Level::Account),
            "n1" => Some(Level::SubAccount),
            "n2" => Some(Level::Line),
            _ => None,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Level::Account => 0,
            Level::SubAccount => 1,
            Level::Line => 2,
        }
    }
}

/// Stable identity of a node across render cycles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "level")]
pub enum NodeId {
    #[serde(rename = "n0")]
    Account { account: String },
    #[serde(rename = "n1")]
    SubAccount { account: String, sub_account: String },
    #[serde(rename = "n2")]
    Line {
        account: String,
        sub_account: String,
        line: String,
    },
}

impl NodeId {
    pub fn account(account: impl Into<String>) -> Self {
        NodeId::Account {
            account: account.into(),
        }
    }

    pub fn sub_account(account: impl Into<String>, sub_account: impl Into<String>) -> Self {
        NodeId::SubAccount {
            account: account.into(),
            sub_account: sub_account.into(),
        }
    }

    pub fn line(
        account: impl Into<String>,
        sub_account: impl Into<String>,
        line: impl Into<String>,
    ) -> Self {
        NodeId::Line {
            account: account.into(),
            sub_account: sub_account.into(),
            line: line.into(),
        }
    }

    pub fn level(&self) -> Level {
        match self {
            NodeId::Account { .. } => Level::Account,
            NodeId::SubAccount { .. } => Level::SubAccount,
            NodeId::Line { .. } => Level::Line,
        }
    }

    pub fn account_name(&self) -> &str {
        match self {
            NodeId::Account { account }
            | NodeId::SubAccount { account, .. }
            | NodeId::Line { account, .. } => account,
        }
    }

    pub fn sub_account_name(&self) -> &str {
        match self {
            NodeId::Account { .. } => "",
            NodeId::SubAccount { sub_account, .. } | NodeId::Line { sub_account, .. } => {
                sub_account
            }
        }
    }

    pub fn line_name(&self) -> &str {
        match self {
            NodeId::Line { line, .. } => line,
            _ => "",
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Account { account } => write!(f, "n0:{}", account),
            NodeId::SubAccount {
                account,
                sub_account,
            } => write!(f, "n1:{}/{}", account, sub_account),
            NodeId::Line {
                account,
                sub_account,
                line,
            } => write!(f, "n2:{}/{}/{}", account, sub_account, line),
        }
    }
}
