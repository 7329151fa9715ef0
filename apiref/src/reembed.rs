//! Recompute stored embeddings from descriptions only.

use crate::embed::Embedder;
use crate::store::SqliteStore;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Requests per minute allowed by the embedding API.
pub const REQUESTS_PER_MINUTE: u32 = 60;
/// Extra pause after every full batch.
pub const BATCH_PAUSE: Duration = Duration::from_secs(2);

/// Enforces a minimum delay between consecutive requests.
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    last: Option<Instant>,
}

impl RateLimiter {
    pub fn per_minute(requests: u32) -> Self {
        RateLimiter {
            min_delay: Duration::from_secs(60) / requests.max(1),
            last: None,
        }
    }

    pub fn unlimited() -> Self {
        RateLimiter {
            min_delay: Duration::ZERO,
            last: None,
        }
    }

    pub fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                thread::sleep(self.min_delay - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

#[derive(Debug, Clone)]
pub struct ReembedOptions {
    pub dry_run: bool,
    pub batch_size: usize,
    pub start_from: Option<i64>,
    pub test_run: Option<usize>,
    pub batch_pause: Duration,
}

impl Default for ReembedOptions {
    fn default() -> Self {
        ReembedOptions {
            dry_run: false,
            batch_size: 10,
            start_from: None,
            test_run: None,
            batch_pause: BATCH_PAUSE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReembedStats {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub updated: usize,
    /// Id of the last row attempted, for resuming with `--start-from`
    pub last_id: Option<i64>,
}

#[derive(Serialize)]
struct Backup<'a> {
    timestamp: u64,
    total_functions: usize,
    functions: Vec<BackupEntry<'a>>,
    note: &'static str,
}

#[derive(Serialize)]
struct BackupEntry<'a> {
    id: i64,
    name: &'a str,
}

/// Write `{id, name}` of every row of `language` to a timestamped JSON file in `dir`.
pub fn write_backup(store: &SqliteStore, language: &str, dir: &Path) -> Result<Option<PathBuf>> {
    let rows = store.list_from(language, None)?;
    if rows.is_empty() {
        tracing::info!("no rows to back up");
        return Ok(None);
    }

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let backup = Backup {
        timestamp,
        total_functions: rows.len(),
        functions: rows
            .iter()
            .map(|r| BackupEntry {
                id: r.id,
                name: &r.name,
            })
            .collect(),
        note: "Embeddings are not included; they can be regenerated with `apiref process`.",
    };

    fs::create_dir_all(dir).with_context(|| format!("failed to create backup directory: {}", dir.display()))?;
    let path = dir.join(format!("api_reference_embeddings_{}.json", timestamp));
    fs::write(&path, serde_json::to_string_pretty(&backup)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(Some(path))
}

/// Replace the embedding of each row with one computed from its description.
pub fn reembed(
    store: &SqliteStore,
    embedder: &dyn Embedder,
    limiter: &mut RateLimiter,
    language: &str,
    options: &ReembedOptions,
) -> Result<ReembedStats> {
    let mut rows = store.list_from(language, options.start_from)?;
    if let Some(limit) = options.test_run {
        tracing::info!("test run: {} of {} rows", limit.min(rows.len()), rows.len());
        rows.truncate(limit);
    }

    let mut stats = ReembedStats {
        total: rows.len(),
        ..Default::default()
    };
    let batch_size = options.batch_size.max(1);

    for (i, row) in rows.iter().enumerate() {
        stats.last_id = Some(row.id);
        if row.description.trim().is_empty() {
            tracing::warn!(name = %row.name, "skipping: no description");
            stats.skipped += 1;
            continue;
        }

        limiter.wait();
        match embedder.embed(&row.description, None) {
            Ok(vector) if options.dry_run => {
                tracing::info!(id = row.id, dims = vector.len(), "dry run: would update {}", row.name);
                stats.processed += 1;
                stats.updated += 1;
            }
            Ok(vector) => match store.update_embedding(row.id, &vector) {
                Ok(()) => {
                    stats.processed += 1;
                    stats.updated += 1;
                }
                Err(e) => {
                    tracing::error!(name = %row.name, "failed to update: {:#}", e);
                    stats.failed += 1;
                }
            },
            Err(e) => {
                tracing::error!(name = %row.name, "failed to embed: {:#}", e);
                stats.failed += 1;
            }
        }

        if (i + 1) % batch_size == 0 && i + 1 < rows.len() {
            tracing::info!("processed {}/{}, pausing", i + 1, rows.len());
            thread::sleep(options.batch_pause);
        }
    }

    Ok(stats)
}
