//! Runtime configuration.

use serde::Deserialize;

/// Settings shared by the reconciler, the coercion layer and index naming.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Emit `DROP COLUMN` for live columns the record no longer declares.
    /// When false the orphans are only logged.
    pub prune_orphan_columns: bool,
    /// chrono format used as the last-chance timestamp parse, read as UTC.
    pub time_format: String,
    /// Prefix of derived index names.
    pub index_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prune_orphan_columns: false,
            time_format: "%Y-%m-%d %H:%M:%S%.f".to_string(),
            index_prefix: "idx".to_string(),
        }
    }
}

impl Config {
    /// Enables or disables dropping orphaned columns.
    #[must_use]
    pub const fn prune_orphan_columns(mut self, prune: bool) -> Self {
        self.prune_orphan_columns = prune;
        self
    }

    /// Sets the fallback timestamp format.
    #[must_use]
    pub fn time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = format.into();
        self
    }

    /// Sets the index name prefix.
    #[must_use]
    pub fn index_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.index_prefix = prefix.into();
        self
    }
}
