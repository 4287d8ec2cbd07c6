use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const NEVER_EXPAND: [&str; 11] = [
    "Ventas",
    "Margen",
    "Contribucion",
    "Administracion Central",
    "Royaltie",
    "Resultado Operativo",
    "Impuesto a la Renta",
    "Diferencia Cambiaria",
    "Resultado Neto",
    "Flujo",
    "EBITAD",
];

const ONE_LEVEL_ONLY: [&str; 7] = [
    "Costo",
    "Marketing",
    "Alquiler",
    "Mantenimiento",
    "Depresiacion",
    "Extraordinario Cash",
    "Extraordinario No Cash",
];

const LINE_ITEM_PARENTS: [(&str, &str); 2] = [
    ("Gastos Operativos", "Gastos Generales"),
    ("Gastos Operativos", "Gastos Personal"),
];

const SORT_LINES_BY_ACTUAL: [&str; 2] = ["gastos generales", "gastos personal"];

const ACCOUNT_ORDER: [&str; 21] = [
    "Ventas",
    "Costo",
    "Margen",
    "Marketing",
    "Contribucion",
    "Gastos Operativos",
    "Alquiler",
    "Mantenimiento",
    "Administracion Central",
    "Royaltie",
    "Depreciacion",
    "Resultado Operativo",
    "Impuestos a la Renta",
    "Extraordinário Cash",
    "Extraordinário No Cash",
    "Diferencia Cambiaria",
    "Provisiones",
    "Resultado Neto",
    "Flujo",
    "EBITDA",
    "F-Flujo",
];

const TOTAL_ACCOUNTS: [&str; 6] = [
    "ventas",
    "margen",
    "contribucion",
    "resultado operativo",
    "resultado neto",
    "flujo",
];

/// Business rules deciding which rows may drill down and how accounts are ordered.
///
/// Account names are matched exactly; the two sets holding lowercase names
/// (`sort_lines_by_actual`, `total_accounts`) are matched after trimming and
/// lowercasing the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ExpansionPolicy {
    #[schemars(description = "Level-0 accounts that are totals and can never be expanded")]
    pub never_expand: BTreeSet<String>,

    #[schemars(
        description = "Level-0 accounts that expand into sub-accounts but never further, whatever the data holds"
    )]
    pub one_level_only: BTreeSet<String>,

    #[schemars(
        description = "(account, sub-account) pairs whose sub-account may expand into line items"
    )]
    pub line_item_parents: BTreeSet<(String, String)>,

    #[schemars(
        description = "Lowercase sub-account names whose line items are listed by ascending actual amount"
    )]
    pub sort_lines_by_actual: BTreeSet<String>,

    #[schemars(
        description = "Canonical display order of level-0 accounts. Unlisted accounts follow, alphabetically"
    )]
    pub account_order: Vec<String>,

    #[schemars(description = "Lowercase level-0 account names highlighted as subtotal rows")]
    pub total_accounts: BTreeSet<String>,
}

impl Default for ExpansionPolicy {
    fn default() -> Self {
        Self {
            never_expand: NEVER_EXPAND.iter().map(|s| s.to_string()).collect(),
            one_level_only: ONE_LEVEL_ONLY.iter().map(|s| s.to_string()).collect(),
            line_item_parents: LINE_ITEM_PARENTS
                .iter()
                .map(|(a, s)| (a.to_string(), s.to_string()))
                .collect(),
            sort_lines_by_actual: SORT_LINES_BY_ACTUAL.iter().map(|s| s.to_string()).collect(),
            account_order: ACCOUNT_ORDER.iter().map(|s| s.to_string()).collect(),
            total_accounts: TOTAL_ACCOUNTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ExpansionPolicy {
    pub fn can_expand_account(&self, account: &str) -> bool {
        !self.never_expand.contains(account)
    }

    pub fn can_expand_sub_account(&self, account: &str, sub_account: &str) -> bool {
        !self.one_level_only.contains(account)
            && self
                .line_item_parents
                .contains(&(account.to_string(), sub_account.to_string()))
    }

    pub fn sorts_lines_by_actual(&self, sub_account: &str) -> bool {
        self.sort_lines_by_actual.contains(&normalize(sub_account))
    }

    pub fn is_total_account(&self, account: &str) -> bool {
        self.total_accounts.contains(&normalize(account))
    }

    /// Position in the canonical order; unlisted accounts share the rank past the end.
    pub fn account_rank(&self, account: &str) -> usize {
        self.account_order
            .iter()
            .position(|a| a == account)
            .unwrap_or(self.account_order.len() + 1)
    }
}

pub(crate) fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
