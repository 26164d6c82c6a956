use crate::error::Result;
use crate::types::VintageObservation;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Columnar store capability for persisting vintage facts. Table naming and
/// physical layout are the store's concern, not the engine's. `upsert_batch`
/// is expected to be transactional per call: a series' batch lands whole or
/// not at all.
#[async_trait]
pub trait FactStore: Send + Sync {
    /// Latest persisted `period_start` for a series, if any.
    async fn query_watermark(&self, table: &str, series_id: &str) -> Result<Option<NaiveDate>>;

    /// Writes all rows for one series in one transaction; returns row count.
    /// A row replaces any stored row with the same
    /// (series_id, period_start, vintage_date), so re-emitting a revised
    /// period's history demotes the previously current vintage in place
    /// instead of leaving a second is_current row behind.
    async fn upsert_batch(&self, table: &str, rows: &[VintageObservation]) -> Result<usize>;

    /// Reads back rows, optionally restricted to one series.
    async fn read_all(&self, table: &str, series_id: Option<&str>) -> Result<Vec<VintageObservation>>;
}

/// In-memory store implementation for development/testing.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<HashMap<String, Vec<VintageObservation>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FactStore for InMemoryStore {
    async fn query_watermark(&self, table: &str, series_id: &str) -> Result<Option<NaiveDate>> {
        let tables = self.tables.lock().unwrap();
        let watermark = tables
            .get(table)
            .into_iter()
            .flatten()
            .filter(|row| row.series_id == series_id)
            .map(|row| row.period.period_start)
            .max();
        Ok(watermark)
    }

    async fn upsert_batch(&self, table: &str, rows: &[VintageObservation]) -> Result<usize> {
        let mut tables = self.tables.lock().unwrap();
        let stored = tables.entry(table.to_string()).or_default();
        for obs in rows {
            let existing = stored.iter().position(|row| {
                row.series_id == obs.series_id
                    && row.period.period_start == obs.period.period_start
                    && row.vintage_date == obs.vintage_date
            });
            match existing {
                Some(idx) => stored[idx] = obs.clone(),
                None => stored.push(obs.clone()),
            }
        }

        debug!("Upserted {} rows into {}", rows.len(), table);
        Ok(rows.len())
    }

    async fn read_all(&self, table: &str, series_id: Option<&str>) -> Result<Vec<VintageObservation>> {
        let tables = self.tables.lock().unwrap();
        let rows = tables
            .get(table)
            .into_iter()
            .flatten()
            .filter(|row| series_id.map_or(true, |id| row.series_id == id))
            .cloned()
            .collect();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::period_for;
    use crate::types::{Frequency, RevisionType};
    use chrono::Utc;

    fn obs(series_id: &str, period_date: &str) -> VintageObservation {
        let date = NaiveDate::parse_from_str(period_date, "%Y-%m-%d").unwrap();
        VintageObservation {
            series_id: series_id.to_string(),
            indicator: series_id.to_string(),
            unit: "INDEX".to_string(),
            category: "PRICES".to_string(),
            subcategory: None,
            period: period_for(date, Frequency::Monthly),
            frequency: Frequency::Monthly,
            value: 1.0,
            vintage_date: date,
            vintage_end: date,
            is_revised: false,
            revision_type: RevisionType::Final,
            is_current: true,
            source: "FRED".to_string(),
            loaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn watermark_is_the_max_period_start_per_series() {
        let store = InMemoryStore::new();
        store
            .upsert_batch("economic_indicators", &[obs("CPIAUCSL", "2024-01-15"), obs("CPIAUCSL", "2024-03-15")])
            .await
            .unwrap();
        store
            .upsert_batch("economic_indicators", &[obs("UNRATE", "2023-06-15")])
            .await
            .unwrap();

        let wm = store.query_watermark("economic_indicators", "CPIAUCSL").await.unwrap();
        assert_eq!(wm.unwrap().to_string(), "2024-03-01");
        assert!(store.query_watermark("economic_indicators", "GDP").await.unwrap().is_none());
        assert!(store.query_watermark("missing_table", "CPIAUCSL").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_rows_with_the_same_period_and_vintage() {
        let store = InMemoryStore::new();
        store
            .upsert_batch("economic_indicators", &[obs("CPIAUCSL", "2024-01-15")])
            .await
            .unwrap();

        // Same (series, period, vintage) written again, now demoted.
        let mut demoted = obs("CPIAUCSL", "2024-01-15");
        demoted.is_current = false;
        demoted.is_revised = true;
        demoted.revision_type = RevisionType::Preliminary;
        let mut later = obs("CPIAUCSL", "2024-02-20");
        later.period = demoted.period.clone();
        later.is_revised = true;
        store
            .upsert_batch("economic_indicators", &[demoted, later])
            .await
            .unwrap();

        let rows = store.read_all("economic_indicators", None).await.unwrap();
        assert_eq!(rows.len(), 2);
        let current: Vec<_> = rows.iter().filter(|r| r.is_current).collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].vintage_date.to_string(), "2024-02-20");
    }

    #[tokio::test]
    async fn read_all_filters_by_series() {
        let store = InMemoryStore::new();
        store
            .upsert_batch("economic_indicators", &[obs("CPIAUCSL", "2024-01-15"), obs("UNRATE", "2024-01-15")])
            .await
            .unwrap();
        assert_eq!(store.read_all("economic_indicators", None).await.unwrap().len(), 2);
        assert_eq!(
            store.read_all("economic_indicators", Some("UNRATE")).await.unwrap().len(),
            1
        );
    }
}
