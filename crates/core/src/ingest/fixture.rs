use crate::domain::series::{AdjustmentFactor, DailyBar};
use crate::error::DataError;
use crate::ingest::provider::MarketDataSource;
use crate::time::cn_market::DateRange;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

/// In-memory history served for every security id, filtered to the requested range.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureDataSource {
    #[serde(default)]
    pub bars: Vec<DailyBar>,
    #[serde(default)]
    pub factors: Vec<AdjustmentFactor>,
}

impl FixtureDataSource {
    pub fn new(bars: Vec<DailyBar>, factors: Vec<AdjustmentFactor>) -> Self {
        Self { bars, factors }
    }

    /// Loads `{"bars": [...], "factors": [...]}`.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("fixture {} is not valid JSON", path.display()))
    }
}

#[async_trait::async_trait]
impl MarketDataSource for FixtureDataSource {
    fn provider_name(&self) -> &'static str {
        "fixture"
    }

    async fn fetch_bars(
        &self,
        security_id: &str,
        range: DateRange,
    ) -> Result<Vec<DailyBar>, DataError> {
        let bars: Vec<_> = self
            .bars
            .iter()
            .filter(|b| range.contains(b.date))
            .copied()
            .collect();
        if bars.is_empty() {
            return Err(DataError::unavailable(security_id, "daily", "no bars in range"));
        }
        Ok(bars)
    }

    async fn fetch_adjustment_factors(
        &self,
        security_id: &str,
        range: DateRange,
    ) -> Result<Vec<AdjustmentFactor>, DataError> {
        let factors: Vec<_> = self
            .factors
            .iter()
            .filter(|f| range.contains(f.date))
            .copied()
            .collect();
        if factors.is_empty() {
            return Err(DataError::unavailable(
                security_id,
                "adj_factor",
                "no adjustment factors in range",
            ));
        }
        Ok(factors)
    }
}
