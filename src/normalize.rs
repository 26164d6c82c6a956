use crate::constants::MISSING_VALUE_MARKER;
use crate::period::period_for;
use crate::types::{RawVintageRow, RevisionType, SeriesMeta, VintageObservation};
use chrono::{NaiveDate, Utc};
use tracing::{debug, instrument, warn};

/// Converts raw provider rows into the uniform fact shape, pre-classification.
///
/// Rows that carry no information are dropped rather than failing the series:
/// missing or non-numeric values, and dates that do not parse. A missing
/// `vintage_end` defaults to the vintage's own start date (a vintage with no
/// recorded expiry is still valid from its publish date). Output order is
/// unspecified; the classifier re-sorts per period.
#[instrument(skip(raw_rows, meta), fields(series_id = %meta.series_id))]
pub fn normalize(
    raw_rows: &[RawVintageRow],
    meta: &SeriesMeta,
    source: &str,
) -> Vec<VintageObservation> {
    let loaded_at = Utc::now();
    let mut observations = Vec::with_capacity(raw_rows.len());
    let mut dropped = 0usize;

    for row in raw_rows {
        let value = match parse_value(&row.value) {
            Some(v) => v,
            None => {
                debug!(
                    "Dropping row for {} at {}: missing or non-numeric value {:?}",
                    meta.series_id, row.observation_date, row.value
                );
                dropped += 1;
                continue;
            }
        };

        let observation_date = match parse_date(&row.observation_date) {
            Some(d) => d,
            None => {
                warn!(
                    "Dropping row for {}: unparseable observation date {:?}",
                    meta.series_id, row.observation_date
                );
                dropped += 1;
                continue;
            }
        };

        let vintage_date = match parse_date(&row.vintage_start) {
            Some(d) => d,
            None => {
                warn!(
                    "Dropping row for {}: unparseable vintage date {:?}",
                    meta.series_id, row.vintage_start
                );
                dropped += 1;
                continue;
            }
        };

        // Absent or null vintage_end means the vintage is still in effect.
        let vintage_end = row
            .vintage_end
            .as_deref()
            .and_then(parse_date)
            .unwrap_or(vintage_date);

        observations.push(VintageObservation {
            series_id: meta.series_id.clone(),
            indicator: meta.indicator.clone(),
            unit: meta.unit.clone(),
            category: meta.category.clone(),
            subcategory: meta.subcategory.clone(),
            period: period_for(observation_date, meta.frequency),
            frequency: meta.frequency,
            value,
            vintage_date,
            vintage_end,
            is_revised: false,
            revision_type: RevisionType::Final,
            is_current: false,
            source: source.to_string(),
            loaded_at,
        });
    }

    if dropped > 0 {
        debug!("Dropped {} uninformative rows for {}", dropped, meta.series_id);
    }

    observations
}

fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == MISSING_VALUE_MARKER {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}
