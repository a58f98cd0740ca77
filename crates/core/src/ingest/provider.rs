use crate::domain::series::{AdjustmentFactor, DailyBar};
use crate::error::DataError;
use crate::time::cn_market::DateRange;

/// Source of raw daily history for one security.
///
/// An empty result is a failure (`DataError::DataUnavailable`), never "no
/// price movement". Retries, when an implementation wants them, happen here
/// and not in the pipeline.
#[async_trait::async_trait]
pub trait MarketDataSource: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_bars(&self, security_id: &str, range: DateRange)
        -> Result<Vec<DailyBar>, DataError>;

    async fn fetch_adjustment_factors(
        &self,
        security_id: &str,
        range: DateRange,
    ) -> Result<Vec<AdjustmentFactor>, DataError>;
}
