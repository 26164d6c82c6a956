use crate::error::{LakeError, Result};
use crate::types::{RevisionType, VintageObservation};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Statistics for one classified series, logged after classification.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClassificationStats {
    pub periods: usize,
    pub vintages: usize,
    pub revised_periods: usize,
}

impl ClassificationStats {
    pub fn avg_vintages_per_period(&self) -> f64 {
        if self.periods == 0 {
            0.0
        } else {
            self.vintages as f64 / self.periods as f64
        }
    }
}

/// Orders and classifies every vintage of every period in the batch.
///
/// Per period (grouped on `period_start`): vintages sort ascending by
/// `vintage_date`, ties keeping fetch order; only the last one is current.
/// A single vintage, or several vintages all carrying the same value, is
/// FINAL with no revision. Differing values mark the whole period revised:
/// earliest PRELIMINARY, latest FINAL, the rest REVISED.
///
/// The pass runs over the entire vintage history of each period and carries
/// no hidden state, so re-running it over the same input is idempotent.
#[instrument(skip(observations))]
pub fn classify(mut observations: Vec<VintageObservation>) -> Vec<VintageObservation> {
    // Group indices by business time, preserving fetch order within a group.
    let mut groups: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (idx, obs) in observations.iter().enumerate() {
        groups.entry(obs.period.period_start).or_default().push(idx);
    }

    for indices in groups.values_mut() {
        // Stable: equal vintage dates keep their original fetch order.
        indices.sort_by_key(|&i| observations[i].vintage_date);

        let revised = distinct_value_count(indices.iter().map(|&i| observations[i].value)) > 1;
        let last = indices.len() - 1;

        for (pos, &i) in indices.iter().enumerate() {
            let obs = &mut observations[i];
            obs.is_current = pos == last;
            obs.is_revised = revised;
            obs.revision_type = if !revised {
                RevisionType::Final
            } else if pos == 0 {
                RevisionType::Preliminary
            } else if pos == last {
                RevisionType::Final
            } else {
                RevisionType::Revised
            };
        }
    }

    // Emit in (period, vintage) order for deterministic downstream handling.
    let order: Vec<usize> = groups.into_values().flatten().collect();
    let mut out: Vec<Option<VintageObservation>> = observations.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| out[i].take())
        .collect()
}

/// Summarizes a classified batch the way the run log reports it.
pub fn stats(observations: &[VintageObservation]) -> ClassificationStats {
    let mut periods: BTreeMap<NaiveDate, bool> = BTreeMap::new();
    for obs in observations {
        let revised = periods.entry(obs.period.period_start).or_insert(false);
        *revised |= obs.is_revised;
    }
    ClassificationStats {
        periods: periods.len(),
        vintages: observations.len(),
        revised_periods: periods.values().filter(|r| **r).count(),
    }
}

/// Confirms the classified batch is safe to persist: every period has exactly
/// one current row and it carries the period's maximum vintage date. A
/// violation is an internal bug and must abort the batch write.
pub fn verify_current_invariant(observations: &[VintageObservation]) -> Result<()> {
    let mut groups: BTreeMap<(&str, NaiveDate), Vec<&VintageObservation>> = BTreeMap::new();
    for obs in observations {
        groups
            .entry((obs.series_id.as_str(), obs.period.period_start))
            .or_default()
            .push(obs);
    }

    for ((series_id, period_start), group) in groups {
        let current: Vec<&&VintageObservation> = group.iter().filter(|o| o.is_current).collect();
        if current.len() != 1 {
            return Err(LakeError::Invariant(format!(
                "{series_id} period {period_start} has {} current rows, expected 1",
                current.len()
            )));
        }
        let max_vintage = group.iter().map(|o| o.vintage_date).max().unwrap_or_default();
        if current[0].vintage_date != max_vintage {
            return Err(LakeError::Invariant(format!(
                "{series_id} period {period_start}: current row dated {} but latest vintage is {}",
                current[0].vintage_date, max_vintage
            )));
        }
    }

    debug!("Current-row invariant holds for {} rows", observations.len());
    Ok(())
}

fn distinct_value_count(values: impl Iterator<Item = f64>) -> usize {
    let mut sorted: Vec<f64> = values.collect();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::period_for;
    use crate::types::{Frequency, SeriesMeta};
    use chrono::{NaiveDate, Utc};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn obs(period_date: &str, vintage: &str, value: f64) -> VintageObservation {
        let meta = SeriesMeta {
            series_id: "GDP".to_string(),
            indicator: "GDP".to_string(),
            frequency: Frequency::Quarterly,
            unit: "BILLIONS".to_string(),
            category: "NATIONAL_ACCOUNTS".to_string(),
            subcategory: None,
            table: "economic_indicators".to_string(),
            fetch_vintages: true,
        };
        VintageObservation {
            series_id: meta.series_id.clone(),
            indicator: meta.indicator.clone(),
            unit: meta.unit.clone(),
            category: meta.category.clone(),
            subcategory: None,
            period: period_for(d(period_date), meta.frequency),
            frequency: meta.frequency,
            value,
            vintage_date: d(vintage),
            vintage_end: d(vintage),
            is_revised: false,
            revision_type: RevisionType::Final,
            is_current: false,
            source: "FRED".to_string(),
            loaded_at: Utc::now(),
        }
    }

    #[test]
    fn single_vintage_is_final_and_current() {
        let out = classify(vec![obs("2024-01-01", "2024-04-25", 5.0)]);
        assert_eq!(out[0].revision_type, RevisionType::Final);
        assert!(!out[0].is_revised);
        assert!(out[0].is_current);
    }

    #[test]
    fn differing_values_classify_preliminary_revised_final() {
        let out = classify(vec![
            obs("2024-01-01", "2024-04-25", 5.0),
            obs("2024-01-01", "2024-05-30", 5.2),
            obs("2024-01-01", "2024-06-27", 5.2),
        ]);
        assert_eq!(out[0].revision_type, RevisionType::Preliminary);
        assert_eq!(out[1].revision_type, RevisionType::Revised);
        assert_eq!(out[2].revision_type, RevisionType::Final);
        assert!(out.iter().all(|o| o.is_revised));
        assert_eq!(
            out.iter().filter(|o| o.is_current).count(),
            1,
            "only the latest vintage is current"
        );
        assert!(out[2].is_current);
    }

    #[test]
    fn identical_values_across_vintages_stay_final() {
        let out = classify(vec![
            obs("2024-01-01", "2024-04-25", 3.0),
            obs("2024-01-01", "2024-05-30", 3.0),
            obs("2024-01-01", "2024-06-27", 3.0),
        ]);
        assert!(out.iter().all(|o| o.revision_type == RevisionType::Final));
        assert!(out.iter().all(|o| !o.is_revised));
        assert!(out[2].is_current && !out[0].is_current && !out[1].is_current);
    }

    #[test]
    fn vintage_date_ties_keep_fetch_order() {
        let mut a = obs("2024-01-01", "2024-04-25", 1.0);
        let b = obs("2024-01-01", "2024-04-25", 2.0);
        a.unit = "FIRST".to_string();
        let out = classify(vec![a, b]);
        assert_eq!(out[0].unit, "FIRST");
        assert!(out[1].is_current);
    }

    #[test]
    fn classification_is_idempotent() {
        let input = vec![
            obs("2024-01-01", "2024-04-25", 5.0),
            obs("2024-01-01", "2024-05-30", 5.2),
            obs("2024-04-01", "2024-07-25", 7.1),
        ];
        let once = classify(input.clone());
        let twice = classify(once.clone());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.revision_type, b.revision_type);
            assert_eq!(a.is_current, b.is_current);
            assert_eq!(a.is_revised, b.is_revised);
            assert_eq!(a.vintage_date, b.vintage_date);
        }
    }

    #[test]
    fn new_vintage_demotes_the_old_final() {
        let mut history = vec![
            obs("2024-01-01", "2024-04-25", 5.0),
            obs("2024-01-01", "2024-05-30", 5.2),
        ];
        let first_pass = classify(history.clone());
        assert_eq!(first_pass[1].revision_type, RevisionType::Final);

        history.push(obs("2024-01-01", "2024-06-27", 5.3));
        let second_pass = classify(history);
        assert_eq!(second_pass[0].revision_type, RevisionType::Preliminary);
        assert_eq!(second_pass[1].revision_type, RevisionType::Revised);
        assert_eq!(second_pass[2].revision_type, RevisionType::Final);
        assert!(second_pass[2].is_current && !second_pass[1].is_current);
    }

    #[test]
    fn invariant_check_rejects_double_current() {
        let mut out = classify(vec![
            obs("2024-01-01", "2024-04-25", 5.0),
            obs("2024-01-01", "2024-05-30", 5.2),
        ]);
        assert!(verify_current_invariant(&out).is_ok());
        out[0].is_current = true;
        assert!(verify_current_invariant(&out).is_err());
    }

    #[test]
    fn stats_count_revised_periods() {
        let out = classify(vec![
            obs("2024-01-01", "2024-04-25", 5.0),
            obs("2024-01-01", "2024-05-30", 5.2),
            obs("2024-04-01", "2024-07-25", 7.1),
        ]);
        let s = stats(&out);
        assert_eq!(s.periods, 2);
        assert_eq!(s.vintages, 3);
        assert_eq!(s.revised_periods, 1);
        assert!((s.avg_vintages_per_period() - 1.5).abs() < 1e-9);
    }
}
