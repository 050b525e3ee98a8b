//! Statistics export.
//!
//! One tab-separated file per resource, listing every entry registered with
//! the resource's estimator (retired ones included) in registration order.
//!
//! # File Format
//!
//! ```text
//! created<TAB>minTTL<TAB>maxTTL<TAB>EstimatedTTL
//! 1476194400123<TAB>5012<TAB>0<TAB>10024
//! 1476194390001<TAB>4000<TAB>9000<TAB>6500
//! ```
//!
//! `created` is Unix time in milliseconds; the other columns are milliseconds.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use searsia_core::error::{Result, SearsiaError};

use crate::entry::EntrySnapshot;
use crate::store::CacheStore;

/// Header line of every statistics file.
pub const STATISTICS_HEADER: &str = "created\tminTTL\tmaxTTL\tEstimatedTTL";

/// Extension of statistics files. The content is tab-separated regardless.
pub const STATISTICS_EXTENSION: &str = "csv";

/// Renders rows as a statistics table, header first.
pub fn render_table(rows: &[EntrySnapshot]) -> String {
    let mut table = String::with_capacity(STATISTICS_HEADER.len() + 1 + rows.len() * 40);
    table.push_str(STATISTICS_HEADER);
    table.push('\n');
    for row in rows {
        let _ = writeln!(
            table,
            "{}\t{}\t{}\t{}",
            row.created_at_ms, row.min_ttl_ms, row.max_ttl_ms, row.estimated_ttl_ms
        );
    }
    table
}

/// Checks that `resource_id` can be used as a file stem.
pub fn validate_resource_id(resource_id: &str) -> Result<()> {
    let invalid = resource_id.is_empty()
        || resource_id == "."
        || resource_id == ".."
        || resource_id
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control());
    if invalid {
        return Err(SearsiaError::InvalidResourceId(resource_id.to_owned()));
    }
    Ok(())
}

/// Files written and resources skipped by one export.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Files written, one per exported resource
    pub written: Vec<PathBuf>,
    /// Resources whose file could not be written
    pub failed: Vec<String>,
}

/// Writes per-resource statistics files into a directory.
#[derive(Clone, Debug)]
pub struct StatisticsExporter {
    dir: PathBuf,
}

impl StatisticsExporter {
    /// Creates an exporter targeting `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the statistics file for `resource_id`.
    pub fn path_for(&self, resource_id: &str) -> Result<PathBuf> {
        validate_resource_id(resource_id)?;
        Ok(self.dir.join(format!("{resource_id}.{STATISTICS_EXTENSION}")))
    }

    /// Exports every resource that has registered entries.
    ///
    /// Failing to create the directory is an error. A file that cannot be
    /// written is logged and reported in [`ExportReport::failed`]; the other
    /// resources are still exported.
    #[instrument(skip_all, fields(dir = ?self.dir))]
    pub async fn export(&self, store: &CacheStore) -> Result<ExportReport> {
        fs::create_dir_all(&self.dir).await?;

        let mut report = ExportReport::default();
        for slot in store.slots() {
            let rows = slot.estimator().registered();
            if rows.is_empty() {
                debug!(resource = slot.resource_id(), "No measured entries, skipping");
                continue;
            }

            match self.write_resource(slot.resource_id(), &rows).await {
                Ok(path) => report.written.push(path),
                Err(e) => {
                    warn!(resource = slot.resource_id(), error = %e, "Failed to export statistics");
                    report.failed.push(slot.resource_id().to_owned());
                }
            }
        }

        info!(
            written = report.written.len(),
            failed = report.failed.len(),
            "Exported statistics"
        );
        Ok(report)
    }

    async fn write_resource(&self, resource_id: &str, rows: &[EntrySnapshot]) -> Result<PathBuf> {
        let path = self.path_for(resource_id)?;
        let contents = render_table(rows);

        // Write atomically (write to temp, then rename)
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        debug!(resource = resource_id, rows = rows.len(), path = ?path, "Wrote statistics");
        Ok(path)
    }
}
