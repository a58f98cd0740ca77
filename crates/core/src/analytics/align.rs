use crate::domain::series::{AdjustmentFactor, AlignedBar, DailyBar};
use crate::error::DataError;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Inner-joins bars with adjustment factors on trade date.
///
/// Dates present in only one input are dropped: without a factor the adjusted
/// price of that day is undefined. A date repeated within one input keeps its
/// last occurrence. Output is ascending by date whatever the input order.
pub fn align(bars: &[DailyBar], factors: &[AdjustmentFactor]) -> Result<Vec<AlignedBar>, DataError> {
    let factor_by_date: BTreeMap<NaiveDate, f64> =
        factors.iter().map(|f| (f.date, f.factor)).collect();
    let bar_by_date: BTreeMap<NaiveDate, &DailyBar> = bars.iter().map(|b| (b.date, b)).collect();

    let out: Vec<AlignedBar> = bar_by_date
        .into_iter()
        .filter_map(|(date, bar)| {
            factor_by_date.get(&date).map(|&factor| AlignedBar {
                date,
                close: bar.close,
                factor,
                volume: bar.volume,
            })
        })
        .collect();

    if out.is_empty() {
        return Err(DataError::EmptyAlignment);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + chrono::Duration::days(i64::from(n))
    }

    fn bar(n: u32, close: f64) -> DailyBar {
        DailyBar {
            date: day(n),
            close,
            volume: u64::from(n) * 10,
        }
    }

    fn factor(n: u32, factor: f64) -> AdjustmentFactor {
        AdjustmentFactor { date: day(n), factor }
    }

    #[test]
    fn drops_dates_missing_from_either_side() {
        let bars = [bar(1, 10.0), bar(2, 11.0), bar(3, 12.0)];
        let factors = [factor(2, 2.0), factor(3, 1.5), factor(4, 1.0)];
        let aligned = align(&bars, &factors).unwrap();
        assert_eq!(aligned.len(), 2);
        assert_eq!(aligned[0].date, day(2));
        assert_eq!(aligned[0].adjusted_close(), 22.0);
        assert_eq!(aligned[1].date, day(3));
        assert_eq!(aligned[1].adjusted_close(), 18.0);
        assert_eq!(aligned[1].volume, 30);
    }

    #[test]
    fn sorts_descending_provider_order() {
        let bars = [bar(3, 12.0), bar(2, 11.0), bar(1, 10.0)];
        let factors = [factor(1, 1.0), factor(3, 1.0), factor(2, 1.0)];
        let aligned = align(&bars, &factors).unwrap();
        let dates: Vec<_> = aligned.iter().map(|a| a.date).collect();
        assert_eq!(dates, vec![day(1), day(2), day(3)]);
    }

    #[test]
    fn disjoint_inputs_fail_with_empty_alignment() {
        let bars = [bar(1, 10.0)];
        let factors = [factor(2, 1.0)];
        assert!(matches!(align(&bars, &factors), Err(DataError::EmptyAlignment)));
        assert!(matches!(align(&[], &[]), Err(DataError::EmptyAlignment)));
    }

    proptest! {
        #[test]
        fn output_is_strictly_ascending(
            bar_days in proptest::collection::vec(0u32..60, 0..80),
            factor_days in proptest::collection::vec(0u32..60, 0..80),
        ) {
            let bars: Vec<_> = bar_days.iter().map(|&n| bar(n, 1.0 + f64::from(n))).collect();
            let factors: Vec<_> = factor_days.iter().map(|&n| factor(n, 1.0)).collect();
            match align(&bars, &factors) {
                Ok(aligned) => {
                    prop_assert!(aligned.windows(2).all(|w| w[0].date < w[1].date));
                    for a in &aligned {
                        prop_assert!(bars.iter().any(|b| b.date == a.date));
                        prop_assert!(factors.iter().any(|f| f.date == a.date));
                    }
                }
                Err(DataError::EmptyAlignment) => {
                    prop_assert!(!bars.iter().any(|b| factors.iter().any(|f| f.date == b.date)));
                }
                Err(other) => prop_assert!(false, "unexpected error: {other}"),
            }
        }
    }
}
