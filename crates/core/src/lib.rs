pub mod analytics;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod protocol;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::str::FromStr;

    pub const DEFAULT_TUSHARE_BASE_URL: &str = "http://api.tushare.pro";
    pub const DEFAULT_TS_CODE: &str = "300604.SZ";
    pub const DEFAULT_LOOKBACK_YEARS: u32 = 5;
    pub const DEFAULT_ROLLING_WINDOW: usize = 252;
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_RETRIES: u32 = 3;
    pub const MAX_LOOKBACK_YEARS: u32 = 50;
    pub const MAX_RETRIES: u32 = 10;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub tushare_token: Option<String>,
        pub tushare_base_url: String,
        pub tushare_timeout_secs: u64,
        pub tushare_retries: u32,
        pub wechat_token: Option<String>,
        pub debug_mode: bool,
        pub default_ts_code: String,
        pub lookback_years: u32,
        pub rolling_window: usize,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let settings = Self {
                tushare_token: non_empty_var("TUSHARE_TOKEN"),
                tushare_base_url: non_empty_var("TUSHARE_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_TUSHARE_BASE_URL.to_string()),
                tushare_timeout_secs: parse_var("TUSHARE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
                tushare_retries: parse_var("TUSHARE_RETRIES", DEFAULT_RETRIES)?,
                wechat_token: non_empty_var("WECHAT_TOKEN"),
                debug_mode: parse_flag("DEBUG_MODE")?,
                default_ts_code: non_empty_var("DEFAULT_TS_CODE")
                    .unwrap_or_else(|| DEFAULT_TS_CODE.to_string()),
                lookback_years: parse_var("LOOKBACK_YEARS", DEFAULT_LOOKBACK_YEARS)?,
                rolling_window: parse_var("ROLLING_WINDOW", DEFAULT_ROLLING_WINDOW)?,
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            };
            settings.validate()?;
            Ok(settings)
        }

        pub fn validate(&self) -> anyhow::Result<()> {
            anyhow::ensure!(
                (1..=MAX_LOOKBACK_YEARS).contains(&self.lookback_years),
                "LOOKBACK_YEARS must be between 1 and {MAX_LOOKBACK_YEARS}"
            );
            anyhow::ensure!(self.rolling_window >= 1, "ROLLING_WINDOW must be at least 1");
            anyhow::ensure!(self.tushare_timeout_secs >= 1, "TUSHARE_TIMEOUT_SECS must be at least 1");
            anyhow::ensure!(
                (1..=MAX_RETRIES).contains(&self.tushare_retries),
                "TUSHARE_RETRIES must be between 1 and {MAX_RETRIES}"
            );
            Ok(())
        }

        pub fn require_tushare_token(&self) -> anyhow::Result<&str> {
            self.tushare_token
                .as_deref()
                .context("TUSHARE_TOKEN is required")
        }

        pub fn require_wechat_token(&self) -> anyhow::Result<&str> {
            self.wechat_token
                .as_deref()
                .context("WECHAT_TOKEN is required")
        }
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                tushare_token: None,
                tushare_base_url: DEFAULT_TUSHARE_BASE_URL.to_string(),
                tushare_timeout_secs: DEFAULT_TIMEOUT_SECS,
                tushare_retries: DEFAULT_RETRIES,
                wechat_token: None,
                debug_mode: false,
                default_ts_code: DEFAULT_TS_CODE.to_string(),
                lookback_years: DEFAULT_LOOKBACK_YEARS,
                rolling_window: DEFAULT_ROLLING_WINDOW,
                sentry_dsn: None,
            }
        }
    }

    /// Shortens a secret for log output, e.g. `abcd…`.
    pub fn redact(secret: &str) -> String {
        let prefix: String = secret.chars().take(4).collect();
        format!("{prefix}…")
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match non_empty_var(key) {
            Some(raw) => raw
                .parse::<T>()
                .with_context(|| format!("invalid value for {key}: {raw:?}")),
            None => Ok(default),
        }
    }

    fn parse_flag(key: &str) -> anyhow::Result<bool> {
        let Some(raw) = non_empty_var(key) else {
            return Ok(false);
        };
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("invalid value for {key}: {raw:?} (expected true/false)"),
        }
    }

}
