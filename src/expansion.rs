use crate::policy::ExpansionPolicy;
use crate::schema::{Level, NodeId};
use crate::view::ViewRow;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Node identities currently expanded in one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpansionState {
    expanded: BTreeSet<NodeId>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.expanded.contains(id)
    }

    /// Flips membership of `id`; returns whether it is now expanded.
    pub fn toggle(&mut self, id: NodeId) -> bool {
        if self.expanded.remove(&id) {
            false
        } else {
            self.expanded.insert(id);
            true
        }
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.expanded.iter()
    }
}

impl FromIterator<NodeId> for ExpansionState {
    fn from_iter<T: IntoIterator<Item = NodeId>>(iter: T) -> Self {
        Self {
            expanded: iter.into_iter().collect(),
        }
    }
}

/// A row-click event as reported by the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSelection {
    /// Level tag of the clicked row: `n0`, `n1` or `n2`.
    pub node: String,
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub sub_account: String,
    #[serde(default)]
    pub line: String,
    /// Display label, used to recover the sub-account when its key is blank.
    #[serde(default)]
    pub label: String,
}

impl RowSelection {
    pub fn account(account: impl Into<String>) -> Self {
        Self {
            node: Level::Account.tag().to_string(),
            account: account.into(),
            ..Self::default()
        }
    }

    pub fn sub_account(account: impl Into<String>, sub_account: impl Into<String>) -> Self {
        Self {
            node: Level::SubAccount.tag().to_string(),
            account: account.into(),
            sub_account: sub_account.into(),
            ..Self::default()
        }
    }

    fn resolved_sub_account(&self) -> String {
        let sub = self.sub_account.trim();
        if sub.is_empty() {
            sub_account_from_label(&self.label)
        } else {
            sub.to_string()
        }
    }
}

impl From<&ViewRow> for RowSelection {
    fn from(row: &ViewRow) -> Self {
        Self {
            node: row.level.tag().to_string(),
            account: row.node.account_name().to_string(),
            sub_account: row.node.sub_account_name().to_string(),
            line: row.node.line_name().to_string(),
            label: row.label.clone(),
        }
    }
}

/// Strips the bullets and dash prefix a rendered label carries.
pub fn sub_account_from_label(label: &str) -> String {
    let stripped = label.replace(['•', '·'], "");
    let trimmed = stripped.trim();
    trimmed
        .strip_prefix("- ")
        .map(str::trim)
        .unwrap_or(trimmed)
        .to_string()
}

/// Whether the caller should run the pipeline again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recompute {
    Requested,
    No,
}

impl Recompute {
    pub fn is_requested(&self) -> bool {
        matches!(self, Recompute::Requested)
    }
}

/// Applies row-selection events to an expansion state under a policy.
pub struct ExpansionController<'a> {
    policy: &'a ExpansionPolicy,
}

impl<'a> ExpansionController<'a> {
    pub fn new(policy: &'a ExpansionPolicy) -> Self {
        Self { policy }
    }

    /// Toggles the selected node when the policy lets it expand.
    ///
    /// Ineligible clicks (total rows, leaf sub-accounts, line items, no
    /// selection at all) leave `state` untouched and return [`Recompute::No`].
    pub fn handle(&self, selection: Option<&RowSelection>, state: &mut ExpansionState) -> Recompute {
        let Some(selection) = selection else {
            return Recompute::No;
        };

        let id = match self.eligible_node(selection) {
            Some(id) => id,
            None => {
                debug!("Ignoring selection of non-expandable row {:?}", selection);
                return Recompute::No;
            }
        };

        let expanded = state.toggle(id.clone());
        debug!(
            "{} {}",
            if expanded { "Expanded" } else { "Collapsed" },
            id
        );
        Recompute::Requested
    }

    fn eligible_node(&self, selection: &RowSelection) -> Option<NodeId> {
        let account = selection.account.trim();
        match Level::from_tag(&selection.node)? {
            Level::Account => self
                .policy
                .can_expand_account(account)
                .then(|| NodeId::account(account)),
            Level::SubAccount => {
                let sub_account = selection.resolved_sub_account();
                self.policy
                    .can_expand_sub_account(account, &sub_account)
                    .then(|| NodeId::sub_account(account, sub_account))
            }
            Level::Line => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_selection_is_no_op() {
        let policy = ExpansionPolicy::default();
        let mut state = ExpansionState::new();

        let signal = ExpansionController::new(&policy).handle(None, &mut state);
        assert_eq!(signal, Recompute::No);
        assert!(state.is_empty());
    }

    #[test]
    fn test_never_expand_account_is_ignored() {
        let policy = ExpansionPolicy::default();
        let mut state = ExpansionState::new();

        let signal = ExpansionController::new(&policy)
            .handle(Some(&RowSelection::account("Ventas")), &mut state);
        assert_eq!(signal, Recompute::No);
        assert!(state.is_empty());
    }

    #[test]
    fn test_toggle_twice_restores_state() {
        let policy = ExpansionPolicy::default();
        let controller = ExpansionController::new(&policy);
        let mut state: ExpansionState = [NodeId::account("Marketing")].into_iter().collect();
        let original = state.clone();

        let selection = RowSelection::account("Costo");
        assert!(controller.handle(Some(&selection), &mut state).is_requested());
        assert!(state.contains(&NodeId::account("Costo")));
        assert!(controller.handle(Some(&selection), &mut state).is_requested());
        assert_eq!(state, original);
    }

    #[test]
    fn test_sub_account_rules() {
        let policy = ExpansionPolicy::default();
        let controller = ExpansionController::new(&policy);
        let mut state = ExpansionState::new();

        let one_level = RowSelection::sub_account("Costo", "Materiales");
        assert_eq!(controller.handle(Some(&one_level), &mut state), Recompute::No);

        let leaf = RowSelection::sub_account("Gastos Operativos", "Viaticos");
        assert_eq!(controller.handle(Some(&leaf), &mut state), Recompute::No);

        let allowed = RowSelection::sub_account("Gastos Operativos", "Gastos Personal");
        assert_eq!(controller.handle(Some(&allowed), &mut state), Recompute::Requested);
        assert!(state.contains(&NodeId::sub_account("Gastos Operativos", "Gastos Personal")));
    }

    #[test]
    fn test_sub_account_recovered_from_label() {
        let policy = ExpansionPolicy::default();
        let mut state = ExpansionState::new();
        let selection = RowSelection {
            node: "n1".to_string(),
            account: "Gastos Operativos".to_string(),
            label: "  • Gastos Generales".to_string(),
            ..RowSelection::default()
        };

        let signal = ExpansionController::new(&policy).handle(Some(&selection), &mut state);
        assert!(signal.is_requested());
        assert!(state.contains(&NodeId::sub_account("Gastos Operativos", "Gastos Generales")));
    }

    #[test]
    fn test_line_and_unknown_rows_are_ignored() {
        let policy = ExpansionPolicy::default();
        let controller = ExpansionController::new(&policy);
        let mut state = ExpansionState::new();

        let line = RowSelection {
            node: "n2".to_string(),
            account: "Gastos Operativos".to_string(),
            sub_account: "Gastos Personal".to_string(),
            line: "Sueldos".to_string(),
            ..RowSelection::default()
        };
        assert_eq!(controller.handle(Some(&line), &mut state), Recompute::No);

        let unknown = RowSelection {
            node: "total".to_string(),
            account: "Costo".to_string(),
            ..RowSelection::default()
        };
        assert_eq!(controller.handle(Some(&unknown), &mut state), Recompute::No);
        assert!(state.is_empty());
    }

    #[test]
    fn test_sub_account_from_label() {
        assert_eq!(sub_account_from_label("  • Gastos Personal"), "Gastos Personal");
        assert_eq!(sub_account_from_label("    · Sueldos"), "Sueldos");
        assert_eq!(sub_account_from_label("- Alquileres "), "Alquileres");
        assert_eq!(sub_account_from_label(""), "");
    }
}
