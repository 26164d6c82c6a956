use crate::types::{Frequency, Period};
use chrono::{Datelike, Duration, NaiveDate};

/// Maps an observation date to its canonical reporting period.
///
/// Pure and total over any valid calendar date: quarterly dates bucket into
/// calendar quarters, monthly into calendar months, and daily (the fallback
/// for anything else) into a single-day period.
pub fn period_for(date: NaiveDate, frequency: Frequency) -> Period {
    match frequency {
        Frequency::Quarterly => {
            let quarter = (date.month0() / 3) + 1;
            let start_month = (quarter - 1) * 3 + 1;
            let period_start = first_of_month(date.year(), start_month);
            let period_end = last_of_month(date.year(), start_month + 2);
            Period {
                period_start,
                period_end,
                period_label: format!("{}-Q{}", date.year(), quarter),
            }
        }
        Frequency::Monthly => {
            let period_start = first_of_month(date.year(), date.month());
            let period_end = last_of_month(date.year(), date.month());
            Period {
                period_start,
                period_end,
                period_label: date.format("%Y-%m").to_string(),
            }
        }
        Frequency::Daily => Period {
            period_start: date,
            period_end: date,
            period_label: date.format("%Y-%m-%d").to_string(),
        },
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    // month is always 1..=12 here, so the construction cannot fail
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default()
}

fn last_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    first_of_month(next_year, next_month) - Duration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn quarterly_periods_bound_the_calendar_quarter() {
        let p = period_for(d(2024, 2, 15), Frequency::Quarterly);
        assert_eq!(p.period_start, d(2024, 1, 1));
        assert_eq!(p.period_end, d(2024, 3, 31));
        assert_eq!(p.period_label, "2024-Q1");

        let p = period_for(d(2024, 12, 31), Frequency::Quarterly);
        assert_eq!(p.period_start, d(2024, 10, 1));
        assert_eq!(p.period_end, d(2024, 12, 31));
        assert_eq!(p.period_label, "2024-Q4");
    }

    #[test]
    fn monthly_periods_bound_the_calendar_month() {
        let p = period_for(d(2024, 2, 15), Frequency::Monthly);
        assert_eq!(p.period_start, d(2024, 2, 1));
        assert_eq!(p.period_end, d(2024, 2, 29)); // leap year
        assert_eq!(p.period_label, "2024-02");
    }

    #[test]
    fn daily_periods_are_the_date_itself() {
        let p = period_for(d(2023, 7, 4), Frequency::Daily);
        assert_eq!(p.period_start, d(2023, 7, 4));
        assert_eq!(p.period_end, d(2023, 7, 4));
        assert_eq!(p.period_label, "2023-07-04");
    }

    #[test]
    fn every_date_falls_inside_its_own_period() {
        let mut date = d(2019, 11, 20);
        let end = d(2025, 3, 10);
        while date <= end {
            for freq in [Frequency::Daily, Frequency::Monthly, Frequency::Quarterly] {
                let p = period_for(date, freq);
                assert!(p.period_start <= date && date <= p.period_end, "{date} {freq:?}");
            }
            date += Duration::days(17);
        }
    }

    #[test]
    fn equal_dates_in_the_same_bucket_yield_identical_periods() {
        let a = period_for(d(2024, 1, 2), Frequency::Quarterly);
        let b = period_for(d(2024, 3, 30), Frequency::Quarterly);
        assert_eq!(a, b);
    }
}
