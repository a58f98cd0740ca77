use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentFactor {
    pub date: NaiveDate,
    pub factor: f64,
}

/// A bar joined with the adjustment factor of the same trade date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedBar {
    pub date: NaiveDate,
    pub close: f64,
    pub factor: f64,
    pub volume: u64,
}

impl AlignedBar {
    pub fn adjusted_close(&self) -> f64 {
        self.close * self.factor
    }
}

/// One day of adjusted history. Percentiles are `None` until a full window of
/// history is available.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustedRecord {
    #[serde(rename = "trade_date")]
    pub date: NaiveDate,
    pub adj_close: f64,
    #[serde(rename = "vol")]
    pub volume: u64,
    pub price_percentile: Option<f64>,
    pub volume_percentile: Option<f64>,
}

/// Adjusted history for one security, ascending by trade date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AnalyticsResult {
    records: Vec<AdjustedRecord>,
}

impl AnalyticsResult {
    /// Callers must pass records strictly ascending by date.
    pub(crate) fn from_sorted(records: Vec<AdjustedRecord>) -> Self {
        debug_assert!(records.windows(2).all(|w| w[0].date < w[1].date));
        Self { records }
    }

    pub fn records(&self) -> &[AdjustedRecord] {
        &self.records
    }

    pub fn latest(&self) -> Option<&AdjustedRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<AdjustedRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_serializes_with_web_api_field_names() {
        let record = AdjustedRecord {
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            adj_close: 12.5,
            volume: 1200,
            price_percentile: Some(0.75),
            volume_percentile: None,
        };
        let v = serde_json::to_value(record).unwrap();
        assert_eq!(
            v,
            json!({
                "trade_date": "2026-01-05",
                "adj_close": 12.5,
                "vol": 1200,
                "price_percentile": 0.75,
                "volume_percentile": null,
            })
        );
    }

    #[test]
    fn result_serializes_as_plain_array() {
        let result = AnalyticsResult::from_sorted(Vec::new());
        assert_eq!(serde_json::to_value(&result).unwrap(), json!([]));
        assert!(result.latest().is_none());
    }
}
