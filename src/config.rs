use crate::error::{PnlError, Result};
use crate::ingestion::DEFAULT_SHEET;
use crate::policy::ExpansionPolicy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_sheet() -> String {
    DEFAULT_SHEET.to_string()
}

/// Where the ledger lives and which business rules drive the statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportConfig {
    #[schemars(
        description = "Path of the ledger source (.xlsx/.xls/.ods workbook or .csv). Relative paths resolve against the config file's directory when loaded from disk."
    )]
    pub source: PathBuf,

    #[serde(default = "default_sheet")]
    #[schemars(description = "Sheet to read; the first sheet is used when it is missing. Defaults to 'datos'.")]
    pub sheet: String,

    #[serde(default)]
    #[schemars(description = "Expansion rules and account ordering. Omitted fields keep their defaults.")]
    pub policy: ExpansionPolicy,
}

impl ReportConfig {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            sheet: default_sheet(),
            policy: ExpansionPolicy::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let mut config = Self::from_json_str(&json)?;
        if config.source.is_relative() {
            if let Some(dir) = path.parent() {
                config.source = dir.join(&config.source);
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.as_os_str().is_empty() {
            return Err(PnlError::InvalidConfig("source path is empty".to_string()));
        }
        if self.sheet.trim().is_empty() {
            return Err(PnlError::InvalidConfig("sheet name is empty".to_string()));
        }

        if let Some(account) = self
            .policy
            .never_expand
            .intersection(&self.policy.one_level_only)
            .next()
        {
            return Err(PnlError::InvalidConfig(format!(
                "account '{}' is both never-expand and one-level-only",
                account
            )));
        }

        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self
            .policy
            .account_order
            .iter()
            .find(|a| !seen.insert(a.as_str()))
        {
            return Err(PnlError::InvalidConfig(format!(
                "account '{}' appears twice in account_order",
                dup
            )));
        }

        Ok(())
    }

    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ReportConfig)
    }

    pub fn schema_as_json() -> Result<String> {
        Ok(serde_json::to_string_pretty(&Self::json_schema())?)
    }
}
