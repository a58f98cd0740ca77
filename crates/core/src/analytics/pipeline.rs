use crate::analytics::align::align;
use crate::analytics::percentile::rolling_percentile;
use crate::config::Settings;
use crate::domain::series::{AdjustedRecord, AnalyticsResult};
use crate::error::PipelineFailure;
use crate::ingest::provider::MarketDataSource;
use crate::time::cn_market::{lookback_from, lookback_range, DateRange};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub lookback_years: u32,
    /// Trailing window for both percentile series, in trading days.
    pub rolling_window: usize,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            lookback_years: settings.lookback_years,
            rolling_window: settings.rolling_window,
        }
    }
}

/// Fetch → align → adjust → rank for one security.
///
/// Holds no state between runs: every call fetches fresh history and returns
/// a new result.
#[derive(Clone)]
pub struct AnalyticsPipeline {
    source: Arc<dyn MarketDataSource>,
    config: PipelineConfig,
}

impl AnalyticsPipeline {
    pub fn new(source: Arc<dyn MarketDataSource>, config: PipelineConfig) -> Self {
        Self { source, config }
    }

    /// Runs over the configured lookback ending at today's market date.
    pub async fn run(&self, security_id: &str) -> Result<AnalyticsResult, PipelineFailure> {
        let range = lookback_range(Utc::now(), self.config.lookback_years)
            .map_err(|e| range_failure(security_id, &e))?;
        self.run_for_range(security_id, range).await
    }

    /// Runs over the configured lookback ending at `end`.
    pub async fn run_as_of(
        &self,
        security_id: &str,
        end: NaiveDate,
    ) -> Result<AnalyticsResult, PipelineFailure> {
        let range = lookback_from(end, self.config.lookback_years)
            .map_err(|e| range_failure(security_id, &e))?;
        self.run_for_range(security_id, range).await
    }

    pub async fn run_for_range(
        &self,
        security_id: &str,
        range: DateRange,
    ) -> Result<AnalyticsResult, PipelineFailure> {
        tracing::info!(
            security_id,
            provider = self.source.provider_name(),
            start = %range.start,
            end = %range.end,
            window = self.config.rolling_window,
            "analytics run started"
        );

        let result = self.compute(security_id, range).await;
        match &result {
            Ok(out) => tracing::info!(
                security_id,
                records = out.len(),
                latest = ?out.latest().map(|r| r.date),
                "analytics run finished"
            ),
            Err(failure) => tracing::warn!(
                security_id,
                stage = failure.stage,
                cause = %failure.cause,
                "analytics run failed"
            ),
        }
        result
    }

    async fn compute(
        &self,
        security_id: &str,
        range: DateRange,
    ) -> Result<AnalyticsResult, PipelineFailure> {
        let (bars, factors) = tokio::join!(
            self.source.fetch_bars(security_id, range),
            self.source.fetch_adjustment_factors(security_id, range),
        );
        let bars = bars.map_err(|e| PipelineFailure::new(security_id, "fetch_bars", &e))?;
        let factors =
            factors.map_err(|e| PipelineFailure::new(security_id, "fetch_adjustment_factors", &e))?;

        let aligned =
            align(&bars, &factors).map_err(|e| PipelineFailure::new(security_id, "align", &e))?;

        let adjusted: Vec<f64> = aligned.iter().map(|a| a.adjusted_close()).collect();
        let volumes: Vec<f64> = aligned.iter().map(|a| a.volume as f64).collect();
        let price_ranks = rolling_percentile(&adjusted, self.config.rolling_window);
        let volume_ranks = rolling_percentile(&volumes, self.config.rolling_window);

        let records = aligned
            .iter()
            .zip(adjusted)
            .zip(price_ranks.into_iter().zip(volume_ranks))
            .map(|((bar, adj_close), (price_percentile, volume_percentile))| AdjustedRecord {
                date: bar.date,
                adj_close,
                volume: bar.volume,
                price_percentile,
                volume_percentile,
            })
            .collect();

        Ok(AnalyticsResult::from_sorted(records))
    }
}

fn range_failure(security_id: &str, err: &anyhow::Error) -> PipelineFailure {
    PipelineFailure {
        security_id: security_id.to_string(),
        stage: "resolve_range",
        cause: format!("{err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::{AdjustmentFactor, DailyBar};
    use crate::ingest::fixture::FixtureDataSource;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    fn history(days: i64) -> FixtureDataSource {
        // Provider order is newest first.
        let bars = (0..days)
            .rev()
            .map(|n| DailyBar {
                date: day(n),
                close: 10.0 + (n % 17) as f64,
                volume: 1_000 + (n as u64 * 7) % 23,
            })
            .collect();
        let factors = (0..days)
            .rev()
            .map(|n| AdjustmentFactor {
                date: day(n),
                factor: if n < 100 { 2.0 } else { 1.0 },
            })
            .collect();
        FixtureDataSource::new(bars, factors)
    }

    fn pipeline(source: FixtureDataSource, window: usize) -> AnalyticsPipeline {
        AnalyticsPipeline::new(
            Arc::new(source),
            PipelineConfig {
                lookback_years: 5,
                rolling_window: window,
            },
        )
    }

    #[tokio::test]
    async fn three_hundred_days_yield_forty_nine_ranked_records() {
        let p = pipeline(history(300), 252);
        let result = p.run_as_of("300604.SZ", day(299)).await.unwrap();

        assert_eq!(result.len(), 300);
        let records = result.records();
        assert!(records.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(records.iter().filter(|r| r.price_percentile.is_some()).count(), 49);
        assert_eq!(records.iter().filter(|r| r.volume_percentile.is_some()).count(), 49);
        assert!(records[..251].iter().all(|r| r.price_percentile.is_none()));
        assert_eq!(result.latest().unwrap().date, day(299));
    }

    #[tokio::test]
    async fn adjusted_close_applies_factor() {
        let p = pipeline(history(120), 252);
        let result = p.run_as_of("X", day(119)).await.unwrap();
        let first = &result.records()[0];
        assert_eq!(first.date, day(0));
        assert_eq!(first.adj_close, 20.0);
        assert_eq!(result.latest().unwrap().adj_close, 10.0 + (119 % 17) as f64);
    }

    #[tokio::test]
    async fn missing_factors_fail_the_whole_run() {
        let mut source = history(30);
        source.factors.clear();
        let p = pipeline(source, 5);
        let failure = p.run_as_of("000001.SZ", day(29)).await.unwrap_err();
        assert_eq!(failure.stage, "fetch_adjustment_factors");
        assert_eq!(failure.security_id, "000001.SZ");
    }

    #[tokio::test]
    async fn disjoint_dates_fail_at_alignment() {
        let mut source = history(10);
        for f in &mut source.factors {
            f.date = f.date + chrono::Duration::days(1000);
        }
        let p = pipeline(source, 5);
        let range = DateRange {
            start: day(0),
            end: day(2000),
        };
        let failure = p.run_for_range("X", range).await.unwrap_err();
        assert_eq!(failure.stage, "align");
    }

    #[tokio::test]
    async fn oversized_lookback_fails_instead_of_panicking() {
        let p = AnalyticsPipeline::new(
            Arc::new(history(10)),
            PipelineConfig {
                lookback_years: 1_000_000,
                rolling_window: 5,
            },
        );
        let failure = p.run("X").await.unwrap_err();
        assert_eq!(failure.stage, "resolve_range");
        let failure = p.run_as_of("X", day(9)).await.unwrap_err();
        assert_eq!(failure.stage, "resolve_range");
    }

    #[tokio::test]
    async fn each_run_returns_fresh_result() {
        let p = pipeline(history(40), 10);
        let a = p.run_as_of("X", day(39)).await.unwrap();
        let b = p.run_as_of("X", day(39)).await.unwrap();
        assert_eq!(a, b);
        let shorter = p.run_as_of("X", day(20)).await.unwrap();
        assert_eq!(shorter.len(), 21);
    }
}
