use crate::types::VintageObservation;
use chrono::NaiveDate;
use tracing::{debug, instrument};

/// Selects which classified rows a run must (re)write.
///
/// Append-only filtering is not enough: a revision can touch a period that is
/// already persisted, so beyond genuinely new periods (`period_start` past the
/// watermark) every revised period at or before the watermark is re-emitted in
/// full. With no watermark, or in force-full mode, everything is selected.
#[instrument(skip(classified), fields(rows = classified.len()))]
pub fn filter_for_update(
    classified: Vec<VintageObservation>,
    watermark: Option<NaiveDate>,
    force_full: bool,
) -> Vec<VintageObservation> {
    if force_full {
        return classified;
    }
    let watermark = match watermark {
        Some(w) => w,
        None => return classified,
    };

    let before = classified.len();
    let selected: Vec<VintageObservation> = classified
        .into_iter()
        .filter(|obs| obs.period.period_start > watermark || obs.is_revised)
        .collect();
    debug!(
        "Selected {}/{} rows past watermark {} (including revised history)",
        selected.len(),
        before,
        watermark
    );
    selected
}
