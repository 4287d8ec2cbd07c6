use crate::policy::ExpansionPolicy;
use crate::schema::{Dataset, Level, LineColumn, Measures, NodeId};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Account whose figures are the denominator of the percentage-of-sales ratios.
pub const SALES_ACCOUNT: &str = "Ventas";

/// Denominators for the percentage-of-total ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrandTotals {
    pub actual: f64,
    pub prior_year: f64,
    pub budget: f64,
}

impl GrandTotals {
    /// Takes each measure from the sales account, falling back to the sum of
    /// all accounts when that is zero, and to 1 when the sum is zero too.
    pub fn from_accounts<'a, I>(accounts: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Measures)>,
    {
        let mut sales = Measures::default();
        let mut all = Measures::default();
        for (account, measures) in accounts {
            if account == SALES_ACCOUNT {
                sales += *measures;
            }
            all += *measures;
        }

        let pick = |sales: f64, all: f64| {
            if sales != 0.0 {
                sales
            } else if all != 0.0 {
                all
            } else {
                1.0
            }
        };

        Self {
            actual: pick(sales.actual, all.actual),
            prior_year: pick(sales.prior_year, all.prior_year),
            budget: pick(sales.budget, all.budget),
        }
    }
}

/// Derived ratios of a node. `None` marks a zero denominator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ratios {
    pub pct_act: f64,
    pub pct_aa: f64,
    pub vs_aa: Option<f64>,
    pub pct_p: Option<f64>,
    pub pct_ppto: f64,
    pub alc: Option<f64>,
}

impl Ratios {
    pub fn compute(measures: &Measures, totals: &GrandTotals) -> Self {
        Self {
            pct_act: measures.actual / totals.actual,
            pct_aa: measures.prior_year / totals.prior_year,
            vs_aa: divide(measures.actual, measures.prior_year).map(|r| r - 1.0),
            pct_p: divide(measures.actual - measures.budget, measures.budget),
            pct_ppto: measures.budget / totals.budget,
            alc: divide(measures.actual, measures.budget),
        }
    }
}

fn divide(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// One row of a level table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedNode {
    pub id: NodeId,
    pub measures: Measures,
    pub ratios: Ratios,
}

impl AggregatedNode {
    pub fn level(&self) -> Level {
        self.id.level()
    }

    pub fn account(&self) -> &str {
        self.id.account_name()
    }

    pub fn sub_account(&self) -> &str {
        self.id.sub_account_name()
    }

    pub fn line(&self) -> &str {
        self.id.line_name()
    }
}

/// The three aggregation levels of one filtered dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelTables {
    /// Level 0, in canonical account order.
    pub accounts: Vec<AggregatedNode>,
    /// Level 1, in (account, sub-account) key order.
    pub sub_accounts: Vec<AggregatedNode>,
    /// Level 2, in (account, sub-account, line) key order.
    pub lines: Vec<AggregatedNode>,
    pub totals: GrandTotals,
    pub line_column: Option<LineColumn>,
}

impl LevelTables {
    pub fn sub_accounts_of<'a>(&'a self, account: &'a str) -> impl Iterator<Item = &'a AggregatedNode> {
        self.sub_accounts
            .iter()
            .filter(move |n| n.account() == account)
    }

    pub fn lines_of<'a>(
        &'a self,
        account: &'a str,
        sub_account: &'a str,
    ) -> impl Iterator<Item = &'a AggregatedNode> {
        self.lines
            .iter()
            .filter(move |n| n.account() == account && n.sub_account() == sub_account)
    }

    pub fn find(&self, id: &NodeId) -> Option<&AggregatedNode> {
        let table = match id.level() {
            Level::Account => &self.accounts,
            Level::SubAccount => &self.sub_accounts,
            Level::Line => &self.lines,
        };
        table.iter().find(|n| &n.id == id)
    }
}

/// First candidate column, in priority order, that carries any non-blank value.
pub fn third_level_column(dataset: &Dataset) -> Option<LineColumn> {
    LineColumn::PRIORITY.into_iter().find(|column| {
        dataset.line_columns.contains(column)
            && dataset
                .records
                .iter()
                .any(|r| r.line(*column).is_some_and(|v| !v.trim().is_empty()))
    })
}

/// Groups a filtered dataset into account, sub-account and line-item totals.
///
/// Each level is summed straight from the records, so a parent's figures are
/// not required to equal the sum of its children.
pub fn aggregate(dataset: &Dataset, policy: &ExpansionPolicy) -> LevelTables {
    let line_column = third_level_column(dataset);

    let mut level0: BTreeMap<String, Measures> = BTreeMap::new();
    let mut level1: BTreeMap<(String, String), Measures> = BTreeMap::new();
    let mut level2: BTreeMap<(String, String, String), Measures> = BTreeMap::new();

    for record in &dataset.records {
        let account = record.account.trim();
        let sub_account = record.sub_account.trim();

        *level0.entry(account.to_string()).or_default() += record.measures;

        if sub_account.is_empty() {
            continue;
        }
        *level1
            .entry((account.to_string(), sub_account.to_string()))
            .or_default() += record.measures;

        let line = line_column
            .and_then(|column| record.line(column))
            .map(str::trim)
            .unwrap_or_default();
        if !line.is_empty() {
            *level2
                .entry((account.to_string(), sub_account.to_string(), line.to_string()))
                .or_default() += record.measures;
        }
    }

    let totals = GrandTotals::from_accounts(level0.iter().map(|(a, m)| (a.as_str(), m)));

    let mut accounts: Vec<AggregatedNode> = level0
        .into_iter()
        .map(|(account, measures)| node(NodeId::account(account), measures, &totals))
        .collect();
    accounts.sort_by(|a, b| {
        policy
            .account_rank(a.account())
            .cmp(&policy.account_rank(b.account()))
            .then_with(|| a.account().cmp(b.account()))
    });

    let sub_accounts: Vec<AggregatedNode> = level1
        .into_iter()
        .map(|((account, sub_account), measures)| {
            node(NodeId::sub_account(account, sub_account), measures, &totals)
        })
        .collect();

    let lines: Vec<AggregatedNode> = level2
        .into_iter()
        .map(|((account, sub_account, line), measures)| {
            node(NodeId::line(account, sub_account, line), measures, &totals)
        })
        .collect();

    debug!(
        "Aggregated {} records into {} accounts, {} sub-accounts, {} lines (third level: {:?})",
        dataset.len(),
        accounts.len(),
        sub_accounts.len(),
        lines.len(),
        line_column
    );

    LevelTables {
        accounts,
        sub_accounts,
        lines,
        totals,
        line_column,
    }
}

fn node(id: NodeId, measures: Measures, totals: &GrandTotals) -> AggregatedNode {
    AggregatedNode {
        ratios: Ratios::compute(&measures, totals),
        id,
        measures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RawRecord;

    fn rec(account: &str, sub: &str, actual: f64, prior: f64, budget: f64) -> RawRecord {
        RawRecord::new(account, sub, Measures::new(actual, prior, budget))
    }

    #[test]
    fn test_single_sales_record() {
        let dataset = Dataset::from_records(vec![rec("Ventas", "", 1000.0, 800.0, 900.0)]);
        let tables = aggregate(&dataset, &ExpansionPolicy::default());

        assert_eq!(tables.accounts.len(), 1);
        assert!(tables.sub_accounts.is_empty());
        let ventas = &tables.accounts[0].ratios;
        assert_eq!(ventas.pct_act, 1.0);
        assert_eq!(ventas.pct_aa, 1.0);
        assert_eq!(ventas.pct_ppto, 1.0);
        assert!((ventas.vs_aa.unwrap() - 0.25).abs() < 1e-12);
        assert!((ventas.pct_p.unwrap() - 100.0 / 900.0).abs() < 1e-12);
        assert!((ventas.alc.unwrap() - 1000.0 / 900.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_budget_yields_null_ratios() {
        let dataset = Dataset::from_records(vec![
            rec("Ventas", "", 1000.0, 800.0, 900.0),
            rec("Marketing", "Digital", 50.0, 40.0, 0.0),
        ]);
        let tables = aggregate(&dataset, &ExpansionPolicy::default());

        let marketing = tables.find(&NodeId::account("Marketing")).unwrap();
        assert_eq!(marketing.measures, Measures::new(50.0, 40.0, 0.0));
        assert_eq!(marketing.ratios.pct_p, None);
        assert_eq!(marketing.ratios.alc, None);
        assert_eq!(marketing.ratios.pct_ppto, 0.0);
        assert!((marketing.ratios.vs_aa.unwrap() - 0.25).abs() < 1e-12);
        assert!((marketing.ratios.pct_act - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_alc_is_null_iff_budget_is_zero() {
        let dataset = Dataset::from_records(vec![
            rec("Ventas", "", 300.0, 0.0, 200.0),
            rec("Costo", "A", 10.0, 0.0, 0.0),
            rec("Costo", "B", -7.0, 0.0, -3.5),
        ]);
        let tables = aggregate(&dataset, &ExpansionPolicy::default());

        for node in tables
            .accounts
            .iter()
            .chain(&tables.sub_accounts)
            .chain(&tables.lines)
        {
            if node.measures.budget == 0.0 {
                assert_eq!(node.ratios.alc, None, "{}", node.id);
            } else {
                assert_eq!(
                    node.ratios.alc,
                    Some(node.measures.actual / node.measures.budget)
                );
            }
            assert_eq!(node.ratios.vs_aa, None);
        }
    }

    #[test]
    fn test_grand_totals_fallbacks() {
        let dataset = Dataset::from_records(vec![
            rec("Costo", "", 40.0, 0.0, 0.0),
            rec("Marketing", "", 60.0, 0.0, 0.0),
        ]);
        let tables = aggregate(&dataset, &ExpansionPolicy::default());

        assert_eq!(tables.totals.actual, 100.0);
        assert_eq!(tables.totals.prior_year, 1.0);
        assert_eq!(tables.totals.budget, 1.0);
        let costo = tables.find(&NodeId::account("Costo")).unwrap();
        assert!((costo.ratios.pct_act - 0.4).abs() < 1e-12);
        assert_eq!(costo.ratios.pct_aa, 0.0);
    }

    #[test]
    fn test_sales_with_zero_measure_falls_back_per_measure() {
        let dataset = Dataset::from_records(vec![
            rec("Ventas", "", 500.0, 0.0, 400.0),
            rec("Costo", "", 100.0, 50.0, 100.0),
        ]);
        let totals = aggregate(&dataset, &ExpansionPolicy::default()).totals;

        assert_eq!(totals.actual, 500.0);
        assert_eq!(totals.prior_year, 50.0);
        assert_eq!(totals.budget, 400.0);
    }

    #[test]
    fn test_canonical_account_order() {
        let dataset = Dataset::from_records(vec![
            rec("Zeta", "", 1.0, 0.0, 0.0),
            rec("Resultado Neto", "", 1.0, 0.0, 0.0),
            rec("Alfa", "", 1.0, 0.0, 0.0),
            rec("Costo", "", 1.0, 0.0, 0.0),
            rec("Ventas", "", 1.0, 0.0, 0.0),
        ]);
        let tables = aggregate(&dataset, &ExpansionPolicy::default());
        let order: Vec<&str> = tables.accounts.iter().map(|n| n.account()).collect();

        assert_eq!(order, vec!["Ventas", "Costo", "Resultado Neto", "Alfa", "Zeta"]);
    }

    #[test]
    fn test_levels_respect_blank_keys_and_trim() {
        let dataset = Dataset::from_records(vec![
            rec(" Gastos Operativos ", " Gastos Personal ", 50.0, 0.0, 0.0)
                .with_line(LineColumn::Tipo, "Sueldos"),
            rec("Gastos Operativos", "Gastos Personal", 30.0, 0.0, 0.0)
                .with_line(LineColumn::Tipo, "  "),
            rec("Gastos Operativos", "", 5.0, 0.0, 0.0).with_line(LineColumn::Tipo, "Huérfano"),
        ]);
        let tables = aggregate(&dataset, &ExpansionPolicy::default());

        assert_eq!(tables.line_column, Some(LineColumn::Tipo));
        assert_eq!(tables.accounts.len(), 1);
        assert_eq!(tables.accounts[0].measures.actual, 85.0);
        assert_eq!(tables.sub_accounts.len(), 1);
        assert_eq!(tables.sub_accounts[0].measures.actual, 80.0);
        assert_eq!(tables.lines.len(), 1);
        assert_eq!(
            tables.lines[0].id,
            NodeId::line("Gastos Operativos", "Gastos Personal", "Sueldos")
        );
    }

    #[test]
    fn test_parent_totals_are_not_reconciled_with_children() {
        // The account-level ledger line has no sub-account; children cover only part of it.
        let dataset = Dataset::from_records(vec![
            rec("Costo", "", 1000.0, 0.0, 0.0),
            rec("Costo", "Materiales", 200.0, 0.0, 0.0),
        ]);
        let tables = aggregate(&dataset, &ExpansionPolicy::default());

        assert_eq!(tables.accounts[0].measures.actual, 1200.0);
        let children: f64 = tables
            .sub_accounts_of("Costo")
            .map(|n| n.measures.actual)
            .sum();
        assert_eq!(children, 200.0);
    }

    #[test]
    fn test_third_level_column_priority() {
        let dataset = Dataset::from_records(vec![RawRecord::new("A", "B", Measures::default())
            .with_line(LineColumn::Linea, "")
            .with_line(LineColumn::Tipo, "t")
            .with_line(LineColumn::Detalle, "d")]);
        assert_eq!(third_level_column(&dataset), Some(LineColumn::Tipo));

        let empty = Dataset::from_records(vec![RawRecord::new("A", "B", Measures::default())]);
        assert_eq!(third_level_column(&empty), None);
    }
}
