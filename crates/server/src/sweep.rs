//! Orphan sweep: reconciles the blob store against the catalog.
//!
//! A blob with no catalog row is left behind when compensation after a failed
//! catalog insert itself fails, or when the process dies between the write and
//! the insert. A request dropped while the final rename is still running on
//! the blocking pool can also race the drop guard's delete; the guard logs
//! the storage name either way. The sweep removes such blobs once they are
//! older than the grace period, so uploads still in flight are never touched.

use crate::metrics;
use serde::Serialize;
use stash_core::config::SweepConfig;
use stash_metadata::{FileRepo, MetadataStore};
use stash_storage::{BlobStore, StorageResult};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

/// Counters from one sweep run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    /// Blobs listed from storage.
    pub scanned: u64,
    /// Blobs too young (or of unknown age) to judge.
    pub skipped_recent: u64,
    /// Blobs with no catalog row.
    pub orphans_found: u64,
    /// Orphans actually removed (zero in dry-run mode).
    pub orphans_deleted: u64,
    /// Lookups or deletions that failed; the blob is left in place.
    pub errors: u64,
}

/// Run one sweep.
///
/// Fails only when the blob store cannot be listed; per-blob failures are
/// logged and counted in [`SweepStats::errors`].
pub async fn sweep_orphans(
    storage: &dyn BlobStore,
    metadata: &dyn MetadataStore,
    config: &SweepConfig,
) -> StorageResult<SweepStats> {
    let cutoff = OffsetDateTime::now_utc() - config.grace_period();
    let mut stats = SweepStats::default();

    if config.dry_run {
        tracing::warn!("Sweep running in dry-run mode; orphans will only be reported");
    }

    for entry in storage.list().await? {
        stats.scanned += 1;

        match entry.last_modified {
            Some(modified) if modified <= cutoff => {}
            _ => {
                stats.skipped_recent += 1;
                continue;
            }
        }

        match metadata.get_file_by_storage_name(&entry.name).await {
            Ok(Some(_)) => continue,
            Ok(None) => {}
            Err(e) => {
                stats.errors += 1;
                tracing::warn!(
                    storage_name = %entry.name,
                    error = %e,
                    "Catalog lookup failed during sweep; keeping blob"
                );
                continue;
            }
        }

        stats.orphans_found += 1;
        if config.dry_run {
            tracing::info!(
                storage_name = %entry.name,
                size_bytes = entry.size,
                "Orphan blob found (dry run)"
            );
            continue;
        }

        match storage.delete(&entry.name).await {
            Ok(()) => {
                stats.orphans_deleted += 1;
                metrics::SWEEP_BLOBS_DELETED.inc();
                tracing::info!(
                    storage_name = %entry.name,
                    size_bytes = entry.size,
                    "Deleted orphan blob"
                );
            }
            Err(e) => {
                stats.errors += 1;
                metrics::record_cleanup_failure(metrics::CLEANUP_ORPHAN_BLOB);
                tracing::warn!(
                    storage_name = %entry.name,
                    error = %e,
                    "Failed to delete orphan blob"
                );
            }
        }
    }

    metrics::SWEEP_RUNS.inc();
    tracing::info!(
        scanned = stats.scanned,
        skipped_recent = stats.skipped_recent,
        orphans_found = stats.orphans_found,
        orphans_deleted = stats.orphans_deleted,
        errors = stats.errors,
        dry_run = config.dry_run,
        "Orphan sweep finished"
    );
    Ok(stats)
}

/// Spawn the periodic sweep. The first run happens one interval after start.
pub fn spawn_sweeper(
    storage: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    config: SweepConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = config.interval();
        tracing::info!(
            interval_secs = interval.as_secs(),
            grace_period_secs = config.grace_period_secs,
            dry_run = config.dry_run,
            "Orphan sweep scheduler enabled"
        );

        loop {
            tokio::time::sleep(interval).await;
            if let Err(e) = sweep_orphans(storage.as_ref(), metadata.as_ref(), &config).await {
                tracing::error!(error = %e, "Orphan sweep failed");
            }
        }
    })
}
