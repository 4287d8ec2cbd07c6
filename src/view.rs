use crate::aggregation::{AggregatedNode, LevelTables};
use crate::expansion::ExpansionState;
use crate::policy::ExpansionPolicy;
use crate::schema::{Level, NodeId};
use serde::{Deserialize, Serialize};

/// A display-ready statement row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRow {
    /// Name indented by level: `"Ventas"`, `"  • Sub"`, `"    · Line"`.
    pub label: String,
    pub level: Level,
    pub node: NodeId,
    pub depth: usize,
    /// Whether a click on this row may expand or collapse it.
    pub expandable: bool,
    pub expanded: bool,
    /// Highlighted subtotal row (Ventas, Margen, ...).
    pub total_row: bool,
    pub actual: f64,
    pub pct_act: f64,
    pub prior_year: f64,
    pub pct_aa: f64,
    pub vs_aa: Option<f64>,
    pub pct_p: Option<f64>,
    pub budget: f64,
    pub pct_ppto: f64,
    pub alc: Option<f64>,
}

impl ViewRow {
    fn from_node(node: &AggregatedNode, expandable: bool, expanded: bool, total_row: bool) -> Self {
        let level = node.level();
        let label = match level {
            Level::Account => node.account().to_string(),
            Level::SubAccount => format!("  • {}", node.sub_account()),
            Level::Line => format!("    · {}", node.line()),
        };

        Self {
            label,
            level,
            node: node.id.clone(),
            depth: level.depth(),
            expandable,
            expanded,
            total_row,
            actual: node.measures.actual,
            pct_act: node.ratios.pct_act,
            prior_year: node.measures.prior_year,
            pct_aa: node.ratios.pct_aa,
            vs_aa: node.ratios.vs_aa,
            pct_p: node.ratios.pct_p,
            budget: node.measures.budget,
            pct_ppto: node.ratios.pct_ppto,
            alc: node.ratios.alc,
        }
    }
}

/// Flattens the level tables into display rows, descending only into expanded nodes.
///
/// Accounts the policy never expands stay closed even if their identity is in
/// `expansion`; sub-accounts open only when the policy allows line items for them.
pub fn materialize(
    tables: &LevelTables,
    expansion: &ExpansionState,
    policy: &ExpansionPolicy,
) -> Vec<ViewRow> {
    let mut rows = Vec::new();

    for account in &tables.accounts {
        let name = account.account();
        let expandable = policy.can_expand_account(name);
        let expanded = expandable && expansion.contains(&account.id);
        rows.push(ViewRow::from_node(
            account,
            expandable,
            expanded,
            policy.is_total_account(name),
        ));

        if !expanded {
            continue;
        }

        for sub in tables.sub_accounts_of(name) {
            let expandable = policy.can_expand_sub_account(name, sub.sub_account());
            let expanded = expandable && expansion.contains(&sub.id);
            rows.push(ViewRow::from_node(sub, expandable, expanded, false));

            if !expanded {
                continue;
            }

            let mut lines: Vec<&AggregatedNode> =
                tables.lines_of(name, sub.sub_account()).collect();
            if policy.sorts_lines_by_actual(sub.sub_account()) {
                lines.sort_by(|a, b| a.measures.actual.total_cmp(&b.measures.actual));
            }
            rows.extend(
                lines
                    .into_iter()
                    .map(|line| ViewRow::from_node(line, false, false, false)),
            );
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::aggregate;
    use crate::schema::{Dataset, LineColumn, Measures, RawRecord};

    fn tables() -> LevelTables {
        let rec = |a: &str, s: &str, l: &str, actual: f64| {
            RawRecord::new(a, s, Measures::new(actual, actual, actual))
                .with_line(LineColumn::Linea, l)
        };
        let dataset = Dataset::from_records(vec![
            rec("Ventas", "Local", "", 1000.0),
            rec("Costo", "Materiales", "Madera", 200.0),
            rec("Gastos Operativos", "Gastos Personal", "Sueldos", 50.0),
            rec("Gastos Operativos", "Gastos Personal", "Cargas", 30.0),
            rec("Gastos Operativos", "Viaticos", "Taxi", 5.0),
            rec("Gastos Operativos", "Gastos Varios", "Zinc", 1.0),
            rec("Gastos Operativos", "Gastos Varios", "Agua", 9.0),
        ]);
        aggregate(&dataset, &ExpansionPolicy::default())
    }

    fn labels(rows: &[ViewRow]) -> Vec<&str> {
        rows.iter().map(|r| r.label.as_str()).collect()
    }

    #[test]
    fn test_collapsed_view_lists_accounts_only() {
        let rows = materialize(&tables(), &ExpansionState::new(), &ExpansionPolicy::default());

        assert_eq!(labels(&rows), vec!["Ventas", "Costo", "Gastos Operativos"]);
        assert!(rows.iter().all(|r| r.depth == 0 && !r.expanded));
        assert!(!rows[0].expandable);
        assert!(rows[0].total_row);
        assert!(rows[1].expandable);
    }

    #[test]
    fn test_never_expand_holds_regardless_of_state() {
        let state: ExpansionState = [NodeId::account("Ventas")].into_iter().collect();
        let rows = materialize(&tables(), &state, &ExpansionPolicy::default());

        assert_eq!(rows.len(), 3);
        assert!(!rows[0].expanded);
    }

    #[test]
    fn test_one_level_only_account_never_shows_lines() {
        let state: ExpansionState = [
            NodeId::account("Costo"),
            NodeId::sub_account("Costo", "Materiales"),
        ]
        .into_iter()
        .collect();
        let rows = materialize(&tables(), &state, &ExpansionPolicy::default());

        assert_eq!(
            labels(&rows),
            vec!["Ventas", "Costo", "  • Materiales", "Gastos Operativos"]
        );
        assert!(!rows[2].expandable);
        assert!(rows.iter().all(|r| r.level != Level::Line));
    }

    #[test]
    fn test_allowed_sub_account_lists_lines_by_actual() {
        let state: ExpansionState = [
            NodeId::account("Gastos Operativos"),
            NodeId::sub_account("Gastos Operativos", "Gastos Personal"),
            NodeId::sub_account("Gastos Operativos", "Viaticos"),
        ]
        .into_iter()
        .collect();
        let rows = materialize(&tables(), &state, &ExpansionPolicy::default());

        assert_eq!(
            labels(&rows),
            vec![
                "Ventas",
                "Costo",
                "Gastos Operativos",
                "  • Gastos Personal",
                "    · Cargas",
                "    · Sueldos",
                "  • Gastos Varios",
                "  • Viaticos",
            ]
        );
        let sueldos = &rows[5];
        assert_eq!(sueldos.depth, 2);
        assert_eq!(
            sueldos.node,
            NodeId::line("Gastos Operativos", "Gastos Personal", "Sueldos")
        );
        assert!(!sueldos.expandable);
    }

    #[test]
    fn test_unsorted_line_groups_keep_key_order() {
        let mut policy = ExpansionPolicy::default();
        policy.line_item_parents.insert((
            "Gastos Operativos".to_string(),
            "Gastos Varios".to_string(),
        ));
        let state: ExpansionState = [
            NodeId::account("Gastos Operativos"),
            NodeId::sub_account("Gastos Operativos", "Gastos Varios"),
        ]
        .into_iter()
        .collect();
        let rows = materialize(&tables(), &state, &policy);

        let lines: Vec<&str> = rows
            .iter()
            .filter(|r| r.level == Level::Line)
            .map(|r| r.label.as_str())
            .collect();
        assert_eq!(lines, vec!["    · Agua", "    · Zinc"]);
    }

    #[test]
    fn test_materialize_is_deterministic_and_leaves_state_alone() {
        let tables = tables();
        let state: ExpansionState = [NodeId::account("Gastos Operativos")].into_iter().collect();
        let before = state.clone();

        let first = materialize(&tables, &state, &ExpansionPolicy::default());
        let second = materialize(&tables, &state, &ExpansionPolicy::default());

        assert_eq!(first, second);
        assert_eq!(state, before);
    }
}
