//! # P&L Drill-down
//!
//! A library for turning a flat ledger spreadsheet into a drill-down Profit &
//! Loss statement: accounts that expand into sub-accounts and line items, with
//! stable row identities so a UI can keep track of what is open.
//!
//! ## Core Concepts
//!
//! - **Dataset**: normalized ledger lines loaded from a workbook or CSV, memoized by modification time
//! - **Filters**: per-session year/period/month/branch selections; selecting everything is a no-op
//! - **Level tables**: account, sub-account and line-item totals with ratios against sales
//! - **View rows**: the flattened statement, descending only into expanded nodes
//! - **Expansion state**: the set of expanded node identities, changed only by row clicks the policy allows
//!
//! ## Example
//!
//! ```rust,ignore
//! use pnl_drilldown::*;
//!
//! let config = ReportConfig::new("base.xlsx");
//! let mut pipeline = StatementPipeline::new(config)?;
//! let mut session = ReportSession::new("session-1");
//!
//! let view = pipeline.render(&mut session)?;
//! let costo = view.rows.iter().find(|r| r.label == "Costo").unwrap();
//! if pipeline.select_row(&mut session, Some(&RowSelection::from(costo))).is_requested() {
//!     let view = pipeline.render(&mut session)?;
//!     println!("{}", rows_to_text_table(&view.rows));
//! }
//! ```

pub mod aggregation;
pub mod cache;
pub mod config;
pub mod error;
pub mod expansion;
pub mod filter;
pub mod format;
pub mod ingestion;
pub mod policy;
pub mod schema;
pub mod session;
pub mod view;

pub use aggregation::{aggregate, third_level_column, AggregatedNode, GrandTotals, LevelTables, Ratios};
pub use cache::DatasetCache;
pub use config::ReportConfig;
pub use error::{PnlError, Result};
pub use expansion::{ExpansionController, ExpansionState, Recompute, RowSelection};
pub use filter::{apply_filters, FilterOptions, FilterSelection, Selection};
pub use format::{format_amount, format_ratio, rows_to_csv, rows_to_text_table};
pub use ingestion::{load_dataset, parse_locale_number};
pub use policy::ExpansionPolicy;
pub use schema::*;
pub use session::{ReportSession, SessionStore};
pub use view::{materialize, ViewRow};

use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Output of one render cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementView {
    pub rows: Vec<ViewRow>,
    pub options: FilterOptions,
}

/// Filters, aggregates and materializes a dataset in one pass.
pub fn build_statement(
    dataset: &Dataset,
    filters: &FilterSelection,
    expansion: &ExpansionState,
    policy: &ExpansionPolicy,
) -> Vec<ViewRow> {
    let filtered = apply_filters(dataset, filters);
    let tables = aggregate(&filtered, policy);
    materialize(&tables, expansion, policy)
}

/// Owns the configuration and dataset cache; sessions are passed in per call.
pub struct StatementPipeline {
    config: ReportConfig,
    cache: DatasetCache,
}

impl StatementPipeline {
    pub fn new(config: ReportConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "Statement pipeline for {} (sheet '{}')",
            config.source.display(),
            config.sheet
        );
        let cache = DatasetCache::new(config.sheet.clone());
        Ok(Self { config, cache })
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub fn cache(&self) -> &DatasetCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut DatasetCache {
        &mut self.cache
    }

    /// Runs one full cycle for `session`. Fails with
    /// [`PnlError::DataUnavailable`] when the source cannot be read.
    pub fn render(&mut self, session: &mut ReportSession) -> Result<StatementView> {
        let dataset = self.cache.get_or_load(&self.config.source)?;

        let options = FilterOptions::from_dataset(&dataset);
        session.sync_options(&options);

        let rows = build_statement(
            &dataset,
            &session.filters,
            &session.expansion,
            &self.config.policy,
        );
        debug!(
            "Session {} rendered {} rows ({} expanded nodes)",
            session.id(),
            rows.len(),
            session.expansion.len()
        );

        Ok(StatementView { rows, options })
    }

    pub fn select_row(
        &self,
        session: &mut ReportSession,
        selection: Option<&RowSelection>,
    ) -> Recompute {
        session.select_row(selection, &self.config.policy)
    }
}
