use anyhow::Context;
use chrono::{DateTime, Days, NaiveDate, Utc};

const CST_OFFSET_SECS: i32 = 8 * 3600;

// Lookback years are counted as 365-day blocks, leap days included.
const DAYS_PER_LOOKBACK_YEAR: u64 = 365;

/// Inclusive trade-date range requested from the market data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start..=self.end).contains(&date)
    }
}

/// China-market calendar date (UTC+8) for the given instant.
pub fn market_today(now_utc: DateTime<Utc>) -> anyhow::Result<NaiveDate> {
    let cst = chrono::FixedOffset::east_opt(CST_OFFSET_SECS).context("invalid CST offset")?;
    Ok(now_utc.with_timezone(&cst).date_naive())
}

/// Trailing range of `years` ending at today's market date.
pub fn lookback_range(now_utc: DateTime<Utc>, years: u32) -> anyhow::Result<DateRange> {
    lookback_from(market_today(now_utc)?, years)
}

/// Trailing range of `years` ending at `end`. Fails when the start would fall
/// outside the supported calendar.
pub fn lookback_from(end: NaiveDate, years: u32) -> anyhow::Result<DateRange> {
    let days = DAYS_PER_LOOKBACK_YEAR * u64::from(years);
    let start = end
        .checked_sub_days(Days::new(days))
        .with_context(|| format!("lookback of {years} years from {end} is out of range"))?;
    Ok(DateRange { start, end })
}
