use crate::expansion::{ExpansionController, ExpansionState, Recompute, RowSelection};
use crate::filter::{FilterOptions, FilterSelection, Selection};
use crate::policy::ExpansionPolicy;
use crate::schema::Dimension;
use log::debug;
use std::collections::HashMap;

/// UI state of one user session: filter choices and expanded rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSession {
    id: String,
    pub filters: FilterSelection,
    pub expansion: ExpansionState,
    options_snapshot: Option<FilterOptions>,
}

impl ReportSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_filter(&mut self, dimension: Dimension, selection: Selection) {
        self.filters.set(dimension, selection);
    }

    /// Resets the filter of every dimension whose option list changed since
    /// the last sync. Returns whether anything was reset.
    pub fn sync_options(&mut self, options: &FilterOptions) -> bool {
        let mut reset = false;
        if let Some(previous) = &self.options_snapshot {
            for dimension in Dimension::ALL {
                if previous.values(dimension) != options.values(dimension)
                    && !self.filters.get(dimension).is_all()
                {
                    debug!(
                        "Session {}: options for {:?} changed, selecting all",
                        self.id, dimension
                    );
                    self.filters.set(dimension, Selection::All);
                    reset = true;
                }
            }
        }
        self.options_snapshot = Some(options.clone());
        reset
    }

    pub fn select_row(
        &mut self,
        selection: Option<&RowSelection>,
        policy: &ExpansionPolicy,
    ) -> Recompute {
        ExpansionController::new(policy).handle(selection, &mut self.expansion)
    }
}

/// Sessions addressed by an explicit identifier.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, ReportSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes the session with `id`, creating an empty one on first use.
    pub fn session_mut(&mut self, id: &str) -> &mut ReportSession {
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| ReportSession::new(id))
    }

    pub fn get(&self, id: &str) -> Option<&ReportSession> {
        self.sessions.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<ReportSession> {
        self.sessions.remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NodeId;

    fn options(years: &[&str]) -> FilterOptions {
        FilterOptions {
            years: years.iter().map(|s| s.to_string()).collect(),
            ..FilterOptions::default()
        }
    }

    #[test]
    fn test_sync_options_resets_changed_dimensions() {
        let mut session = ReportSession::new("a");
        assert!(!session.sync_options(&options(&["2023", "2024"])));

        session.set_filter(Dimension::Year, Selection::only(["2024"]));
        assert!(!session.sync_options(&options(&["2023", "2024"])));
        assert!(!session.filters.year.is_all());

        assert!(session.sync_options(&options(&["2023", "2024", "2025"])));
        assert!(session.filters.year.is_all());
    }

    #[test]
    fn test_sessions_are_isolated() {
        let policy = ExpansionPolicy::default();
        let mut store = SessionStore::new();

        let signal = store
            .session_mut("alice")
            .select_row(Some(&RowSelection::account("Costo")), &policy);
        assert!(signal.is_requested());
        store.session_mut("bob");

        assert_eq!(store.len(), 2);
        assert!(store
            .get("alice")
            .unwrap()
            .expansion
            .contains(&NodeId::account("Costo")));
        assert!(store.get("bob").unwrap().expansion.is_empty());
        assert_eq!(store.session_mut("alice").id(), "alice");

        assert!(store.remove("bob").is_some());
        assert!(store.get("bob").is_none());
    }
}
