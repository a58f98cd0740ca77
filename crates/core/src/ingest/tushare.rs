use crate::config::{redact, Settings};
use crate::domain::series::{AdjustmentFactor, DailyBar};
use crate::error::DataError;
use crate::ingest::provider::MarketDataSource;
use crate::ingest::types::{TushareParams, TushareRequest, TushareResponse, TushareTable};
use crate::time::cn_market::DateRange;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use std::time::Duration;

const DAILY_API: &str = "daily";
const DAILY_FIELDS: &str = "trade_date,close,vol";
const ADJ_FACTOR_API: &str = "adj_factor";
const ADJ_FACTOR_FIELDS: &str = "trade_date,adj_factor";

/// Tushare Pro client for A-share daily bars and adjustment factors.
#[derive(Debug, Clone)]
pub struct TushareClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    retries: u32,
}

impl TushareClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let token = settings.require_tushare_token()?.to_string();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.tushare_timeout_secs))
            .build()
            .context("failed to build tushare http client")?;

        tracing::info!(
            base_url = %settings.tushare_base_url,
            token = %redact(&token),
            timeout_secs = settings.tushare_timeout_secs,
            retries = settings.tushare_retries,
            "tushare client configured"
        );

        Ok(Self {
            http,
            base_url: settings.tushare_base_url.clone(),
            token,
            retries: settings.tushare_retries.max(1),
        })
    }

    async fn query_once(
        &self,
        api_name: &str,
        fields: &str,
        ts_code: &str,
        range: DateRange,
    ) -> Result<TushareTable> {
        let req = TushareRequest {
            api_name,
            token: &self.token,
            params: TushareParams {
                ts_code,
                start_date: range.start.format("%Y%m%d").to_string(),
                end_date: range.end.format("%Y%m%d").to_string(),
            },
            fields,
        };

        let res = self
            .http
            .post(self.base_url.as_str())
            .json(&req)
            .send()
            .await
            .with_context(|| format!("tushare {api_name} request failed"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read tushare {api_name} response"))?;
        if !status.is_success() {
            anyhow::bail!("tushare {api_name} HTTP {status}: {text}");
        }

        let body = serde_json::from_str::<TushareResponse>(&text)
            .with_context(|| format!("failed to parse tushare {api_name} response"))?;
        if body.code != 0 {
            anyhow::bail!(
                "tushare {api_name} returned code {}: {}",
                body.code,
                body.msg.unwrap_or_default()
            );
        }

        Ok(body.data.unwrap_or_default())
    }

    async fn query(
        &self,
        api_name: &str,
        fields: &str,
        ts_code: &str,
        range: DateRange,
    ) -> Result<TushareTable, DataError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.query_once(api_name, fields, ts_code, range).await {
                Ok(table) => {
                    tracing::debug!(
                        api_name,
                        ts_code,
                        rows = table.items.len(),
                        "tushare query succeeded"
                    );
                    return Ok(table);
                }
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(DataError::Provider(err));
                    }
                    let backoff = retry_backoff(attempt);
                    tracing::warn!(
                        attempt,
                        ?backoff,
                        api_name,
                        ts_code,
                        error = %err,
                        "tushare query failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl MarketDataSource for TushareClient {
    fn provider_name(&self) -> &'static str {
        "tushare"
    }

    async fn fetch_bars(
        &self,
        security_id: &str,
        range: DateRange,
    ) -> Result<Vec<DailyBar>, DataError> {
        let table = self.query(DAILY_API, DAILY_FIELDS, security_id, range).await?;
        parse_daily_bars(security_id, &table)
    }

    async fn fetch_adjustment_factors(
        &self,
        security_id: &str,
        range: DateRange,
    ) -> Result<Vec<AdjustmentFactor>, DataError> {
        let table = self
            .query(ADJ_FACTOR_API, ADJ_FACTOR_FIELDS, security_id, range)
            .await?;
        parse_adjustment_factors(security_id, &table)
    }
}

fn parse_daily_bars(security_id: &str, table: &TushareTable) -> Result<Vec<DailyBar>, DataError> {
    let malformed = |detail: String| DataError::unavailable(security_id, DAILY_API, detail);
    if table.items.is_empty() {
        return Err(malformed("provider returned no rows".to_string()));
    }

    let date_col = require_column(table, "trade_date").map_err(malformed)?;
    let close_col = require_column(table, "close").map_err(malformed)?;
    let vol_col = require_column(table, "vol").map_err(malformed)?;

    table
        .items
        .iter()
        .enumerate()
        .map(|(idx, row)| -> Result<DailyBar, DataError> {
            let date = parse_trade_date(row.get(date_col))
                .ok_or_else(|| malformed(format!("row {idx}: invalid trade_date")))?;
            let close = parse_num(row.get(close_col))
                .filter(|c| c.is_finite() && *c > 0.0)
                .ok_or_else(|| malformed(format!("row {idx} ({date}): invalid close")))?;
            let vol = parse_num(row.get(vol_col))
                .filter(|v| v.is_finite() && *v >= 0.0)
                .ok_or_else(|| malformed(format!("row {idx} ({date}): invalid vol")))?;
            Ok(DailyBar {
                date,
                close,
                volume: vol.round() as u64,
            })
        })
        .collect()
}

fn parse_adjustment_factors(
    security_id: &str,
    table: &TushareTable,
) -> Result<Vec<AdjustmentFactor>, DataError> {
    let malformed = |detail: String| DataError::unavailable(security_id, ADJ_FACTOR_API, detail);
    if table.items.is_empty() {
        return Err(malformed("provider returned no rows".to_string()));
    }

    let date_col = require_column(table, "trade_date").map_err(malformed)?;
    let factor_col = require_column(table, "adj_factor").map_err(malformed)?;

    table
        .items
        .iter()
        .enumerate()
        .map(|(idx, row)| -> Result<AdjustmentFactor, DataError> {
            let date = parse_trade_date(row.get(date_col))
                .ok_or_else(|| malformed(format!("row {idx}: invalid trade_date")))?;
            let factor = parse_num(row.get(factor_col))
                .filter(|f| f.is_finite() && *f > 0.0)
                .ok_or_else(|| malformed(format!("row {idx} ({date}): invalid adj_factor")))?;
            Ok(AdjustmentFactor { date, factor })
        })
        .collect()
}

// 1s, 2s, 4s, ... capped at one minute.
fn retry_backoff(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(6);
    Duration::from_secs((1u64 << exp).min(60))
}

fn require_column(table: &TushareTable, name: &str) -> Result<usize, String> {
    table
        .column(name)
        .ok_or_else(|| format!("missing column {name}"))
}

fn parse_trade_date(v: Option<&Value>) -> Option<NaiveDate> {
    let s = v?.as_str()?.trim();
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

// Tushare sends numbers, but some gateways stringify them.
fn parse_num(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
