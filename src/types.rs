use crate::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Reporting frequency of a series. Catalog strings parse permissively:
/// anything unrecognized falls back to daily semantics rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Daily,
    Monthly,
    Quarterly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Quarterly => "QUARTERLY",
        }
    }

    pub fn from_catalog(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "QUARTERLY" => Frequency::Quarterly,
            "MONTHLY" => Frequency::Monthly,
            _ => Frequency::Daily,
        }
    }
}

/// The business-time interval a value describes: a calendar quarter, month,
/// or single day, with a canonical label ("2024-Q1", "2024-03", "2024-03-15").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub period_label: String,
}

/// Static metadata for one series, loaded from the reference catalog.
/// Created once; never mutated by the ingestion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesMeta {
    pub series_id: String,
    pub indicator: String,
    pub frequency: Frequency,
    pub unit: String,
    pub category: String,
    pub subcategory: Option<String>,
    /// Target fact table for this series.
    pub table: String,
    /// Fetch every historical vintage (ALFRED) instead of latest values only.
    pub fetch_vintages: bool,
}

/// One observation as it arrives off the provider wire. Dates and values stay
/// string-typed here; the normalizer parses them and drops what it cannot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVintageRow {
    pub observation_date: String,
    pub vintage_start: String,
    pub vintage_end: Option<String>,
    pub value: String,
}

/// How a published value relates to the other vintages of its period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RevisionType {
    Final,
    Preliminary,
    Revised,
}

impl RevisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevisionType::Final => "FINAL",
            RevisionType::Preliminary => "PRELIMINARY",
            RevisionType::Revised => "REVISED",
        }
    }
}

/// One published data point on the bitemporal axis: `period` is business
/// time (what the value describes), `vintage_date` is system time (when the
/// value became publicly available). A later vintage of the same period is a
/// new row, never a mutation of an old one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VintageObservation {
    pub series_id: String,
    pub indicator: String,
    pub unit: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub period: Period,
    pub frequency: Frequency,
    pub value: f64,
    pub vintage_date: NaiveDate,
    pub vintage_end: NaiveDate,
    pub is_revised: bool,
    pub revision_type: RevisionType,
    pub is_current: bool,
    pub source: String,
    pub loaded_at: DateTime<Utc>,
}

/// Upstream data provider capability. Implementations fetch raw
/// vintage-indexed observations; transport failures surface as recoverable
/// per-series errors at the orchestrator.
#[async_trait::async_trait]
pub trait VintageProvider: Send + Sync {
    /// Identifier recorded as the `source` of every persisted row.
    fn provider_name(&self) -> &'static str;

    /// All historically published vintages for a series.
    async fn fetch_all_vintages(&self, series_id: &str) -> Result<Vec<RawVintageRow>>;

    /// Latest published values only, bounded to a date range.
    async fn fetch_latest(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawVintageRow>>;
}
