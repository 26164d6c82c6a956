use crate::classify::{classify, stats, verify_current_invariant};
use crate::constants::HISTORY_START;
use crate::error::{LakeError, Result};
use crate::filter::filter_for_update;
use crate::normalize::normalize;
use crate::storage::FactStore;
use crate::types::{SeriesMeta, VintageProvider};
use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Options for one ingestion run, translated from CLI flags by the caller.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Incremental mode: filter against the per-series watermark. The default
    /// (full mode) bypasses the filter and rewrites everything fetched.
    pub update_only: bool,
    /// Explicit fetch range override; a start date forces full persistence.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Abort the run on the first series failure instead of continuing.
    pub fail_fast: bool,
}

/// Outcome for one series within a run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum SeriesOutcome {
    Inserted { rows: usize },
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesReport {
    pub series_id: String,
    pub table: String,
    pub outcome: SeriesOutcome,
}

/// Per-run summary: which series succeeded, which were skipped or failed and
/// why, and how many rows landed.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub reports: Vec<SeriesReport>,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            reports: Vec::new(),
        }
    }

    pub fn rows_inserted(&self) -> usize {
        self.reports
            .iter()
            .map(|r| match r.outcome {
                SeriesOutcome::Inserted { rows } => rows,
                _ => 0,
            })
            .sum()
    }

    pub fn failed(&self) -> Vec<&SeriesReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, SeriesOutcome::Failed { .. }))
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed().is_empty()
    }
}

/// Drives fetch -> normalize -> classify -> filter -> persist for each series
/// in turn. Series are independent end-to-end; one series failing is recorded
/// and the run moves on, unless fail-fast is requested.
pub struct IngestionEngine {
    provider: Arc<dyn VintageProvider>,
    store: Arc<dyn FactStore>,
    // Advisory per-series lock: the classifier needs the complete existing
    // vintage history (the watermark) read before writing, so two writers on
    // the same series must never overlap.
    in_flight: Mutex<HashSet<String>>,
}

impl IngestionEngine {
    pub fn new(provider: Arc<dyn VintageProvider>, store: Arc<dyn FactStore>) -> Self {
        Self {
            provider,
            store,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    #[instrument(skip(self, series, opts), fields(series_count = series.len()))]
    pub async fn run(&self, series: &[SeriesMeta], opts: &IngestOptions) -> Result<RunSummary> {
        let mut summary = RunSummary::new();
        info!(run_id = %summary.run_id, "Starting ingestion run over {} series", series.len());

        for meta in series {
            let outcome = match self.process_series(meta, opts).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Series {} failed: {}", meta.series_id, e);
                    counter!("macrolake_series_failed_total", "table" => meta.table.clone())
                        .increment(1);
                    if opts.fail_fast {
                        return Err(e);
                    }
                    SeriesOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            summary.reports.push(SeriesReport {
                series_id: meta.series_id.clone(),
                table: meta.table.clone(),
                outcome,
            });
        }

        summary.finished_at = Some(Utc::now());
        info!(
            run_id = %summary.run_id,
            "Finished ingestion run: {} rows inserted, {} series failed",
            summary.rows_inserted(),
            summary.failed().len()
        );
        Ok(summary)
    }

    #[instrument(skip(self, meta, opts), fields(series_id = %meta.series_id, table = %meta.table))]
    async fn process_series(&self, meta: &SeriesMeta, opts: &IngestOptions) -> Result<SeriesOutcome> {
        let _guard = self.lock_series(&meta.series_id)?;

        info!("Fetching {} data for {}...",
            if meta.fetch_vintages { "vintage" } else { "latest" },
            meta.indicator
        );
        let t_fetch = std::time::Instant::now();
        let raw_rows = if meta.fetch_vintages {
            self.provider.fetch_all_vintages(&meta.series_id).await?
        } else {
            let (start, end) = fetch_range(opts);
            self.provider.fetch_latest(&meta.series_id, start, end).await?
        };
        histogram!("macrolake_fetch_duration_seconds", "table" => meta.table.clone())
            .record(t_fetch.elapsed().as_secs_f64());

        let normalized = normalize(&raw_rows, meta, self.provider.provider_name());
        if normalized.is_empty() {
            warn!("No usable rows after normalization for {}", meta.series_id);
            return Ok(SeriesOutcome::Skipped {
                reason: "no usable rows after normalization".to_string(),
            });
        }

        let classified = classify(normalized);
        let series_stats = stats(&classified);
        info!("  - {} unique periods", series_stats.periods);
        info!(
            "  - {} periods with revisions ({:.1}%)",
            series_stats.revised_periods,
            100.0 * series_stats.revised_periods as f64 / series_stats.periods.max(1) as f64
        );
        info!("  - {:.1} avg vintages per period", series_stats.avg_vintages_per_period());

        // A bad classification must abort before anything is written.
        verify_current_invariant(&classified)?;

        let force_full = !opts.update_only || opts.start_date.is_some();
        let watermark = if force_full {
            None
        } else {
            self.store
                .query_watermark(&meta.table, &meta.series_id)
                .await?
        };

        let selected = filter_for_update(classified, watermark, force_full);
        if selected.is_empty() {
            info!("No new data for {}", meta.series_id);
            return Ok(SeriesOutcome::Skipped {
                reason: "no new data past watermark".to_string(),
            });
        }

        // Upsert keyed on (series_id, period_start, vintage_date): re-emitted
        // history for a revised period overwrites the rows a prior run left,
        // demoting its stale is_current vintage rather than duplicating it.
        let inserted = self
            .store
            .upsert_batch(&meta.table, &selected)
            .await
            .map_err(|e| LakeError::Persistence {
                message: format!("{}: {e}", meta.series_id),
            })?;
        counter!("macrolake_rows_inserted_total", "table" => meta.table.clone())
            .increment(inserted as u64);
        info!("Inserted {} records for {}", inserted, meta.series_id);

        Ok(SeriesOutcome::Inserted { rows: inserted })
    }

    fn lock_series(&self, series_id: &str) -> Result<SeriesGuard<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap();
        if !in_flight.insert(series_id.to_string()) {
            return Err(LakeError::Persistence {
                message: format!("series {series_id} is already being ingested"),
            });
        }
        Ok(SeriesGuard {
            engine: self,
            series_id: series_id.to_string(),
        })
    }
}

struct SeriesGuard<'a> {
    engine: &'a IngestionEngine,
    series_id: String,
}

impl Drop for SeriesGuard<'_> {
    fn drop(&mut self) {
        self.engine
            .in_flight
            .lock()
            .unwrap()
            .remove(&self.series_id);
    }
}

fn fetch_range(opts: &IngestOptions) -> (NaiveDate, NaiveDate) {
    let start = opts.start_date.unwrap_or_else(|| {
        // Sentinel predating every FRED observation.
        NaiveDate::parse_from_str(HISTORY_START, "%Y-%m-%d").unwrap_or_default()
    });
    let end = opts.end_date.unwrap_or_else(|| Utc::now().date_naive());
    (start, end)
}
