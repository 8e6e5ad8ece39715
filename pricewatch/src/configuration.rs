use crate::store::{parse_store_list, StoreId, StoreMode};
use std::str::FromStr;
use std::time::Duration;

/// Default collection service location.
pub const DEFAULT_APP_BASE: &str = "http://127.0.0.1:8000";
/// Default pause after a capture before asking for the next job.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(800);
/// Default HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Default page agent attempt offsets in milliseconds after page load.
pub const DEFAULT_ATTEMPT_SCHEDULE_MS: [u64; 4] = [900, 2000, 3500, 5500];

/// Retry policy for collection service requests.
///
/// The default budget is zero: a failed request is logged and the run moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Extra attempts after the first request.
    pub retries: usize,
    /// Delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 0,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry budget.
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Set backoff delay.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Structure to configure a capture run.
/// ```rust
/// use pricewatch::configuration::Configuration;
/// use pricewatch::store::StoreMode;
///
/// let config = Configuration::new()
///     .with_app_base("http://127.0.0.1:8000")
///     .with_store_mode(StoreMode::SeqWc);
///
/// assert_eq!(config.stores().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    /// Base URL of the collection service. Endpoints live under `/api/`.
    pub app_base: String,
    /// Store mode used when no explicit store list is set.
    pub store_mode: StoreMode,
    /// Explicit ordered store list. Takes precedence over the mode.
    pub stores: Option<Vec<StoreId>>,
    /// Pause after a capture before the next job is requested.
    pub settle_delay: Duration,
    /// Timeout for each HTTP request.
    pub request_timeout: Duration,
    /// Retry budget for collection service requests.
    pub retry: RetryConfig,
    /// Page agent attempt offsets after page load.
    pub attempt_schedule: Vec<Duration>,
    /// Connect to an existing chrome instance instead of launching one.
    pub chrome_connection_url: Option<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            app_base: DEFAULT_APP_BASE.into(),
            store_mode: StoreMode::default(),
            stores: None,
            settle_delay: DEFAULT_SETTLE_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryConfig::default(),
            attempt_schedule: DEFAULT_ATTEMPT_SCHEDULE_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            chrome_connection_url: None,
        }
    }
}

impl Configuration {
    /// Represents configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from the environment on top of the defaults.
    ///
    /// Reads `PRICEWATCH_APP_BASE`, `PRICEWATCH_MODE`, `PRICEWATCH_STORES`, `PRICEWATCH_SETTLE_MS`,
    /// `PRICEWATCH_REQUEST_TIMEOUT_MS`, `PRICEWATCH_RETRY_BUDGET` and `CHROME_URL`.
    /// Values that fail to parse are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from a key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(base) = get("PRICEWATCH_APP_BASE") {
            config = config.with_app_base(base);
        }

        if let Some(mode) = get("PRICEWATCH_MODE") {
            match StoreMode::from_str(&mode) {
                Ok(mode) => config.store_mode = mode,
                Err(_) => log::warn!("ignoring unknown PRICEWATCH_MODE {mode}"),
            }
        }

        if let Some(stores) = get("PRICEWATCH_STORES") {
            match parse_store_list(&stores) {
                Ok(stores) => config = config.with_stores(stores),
                Err(_) => log::warn!("ignoring invalid PRICEWATCH_STORES {stores}"),
            }
        }

        if let Some(ms) = get("PRICEWATCH_SETTLE_MS") {
            match ms.parse::<u64>() {
                Ok(ms) => config.settle_delay = Duration::from_millis(ms),
                Err(_) => log::warn!("ignoring invalid PRICEWATCH_SETTLE_MS {ms}"),
            }
        }

        if let Some(ms) = get("PRICEWATCH_REQUEST_TIMEOUT_MS") {
            match ms.parse::<u64>() {
                Ok(ms) => config.request_timeout = Duration::from_millis(ms),
                Err(_) => log::warn!("ignoring invalid PRICEWATCH_REQUEST_TIMEOUT_MS {ms}"),
            }
        }

        if let Some(n) = get("PRICEWATCH_RETRY_BUDGET") {
            match n.parse::<usize>() {
                Ok(n) => config.retry.retries = n,
                Err(_) => log::warn!("ignoring invalid PRICEWATCH_RETRY_BUDGET {n}"),
            }
        }

        config.chrome_connection_url = get("CHROME_URL");

        config
    }

    /// The ordered store set a session should target.
    pub fn stores(&self) -> Vec<StoreId> {
        match self.stores {
            Some(ref stores) if !stores.is_empty() => stores.clone(),
            _ => self.store_mode.stores(),
        }
    }

    /// Full URL of a collection service API endpoint.
    pub fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}/api/{}",
            self.app_base.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Set the collection service base URL. Blank values keep the default.
    pub fn with_app_base(mut self, app_base: impl Into<String>) -> Self {
        let app_base = app_base.into();
        let app_base = app_base.trim();

        self.app_base = if app_base.is_empty() {
            DEFAULT_APP_BASE.into()
        } else {
            app_base.into()
        };
        self
    }

    /// Set the store mode.
    pub fn with_store_mode(mut self, store_mode: StoreMode) -> Self {
        self.store_mode = store_mode;
        self
    }

    /// Set an explicit ordered store list.
    pub fn with_stores(mut self, stores: Vec<StoreId>) -> Self {
        self.stores = if stores.is_empty() { None } else { Some(stores) };
        self
    }

    /// Set the settle delay between jobs.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Set the HTTP request timeout.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the page agent attempt schedule.
    pub fn with_attempt_schedule(mut self, attempt_schedule: Vec<Duration>) -> Self {
        self.attempt_schedule = attempt_schedule;
        self
    }

    /// Connect to a running chrome instance, ws or http url.
    pub fn with_chrome_connection(mut self, url: Option<String>) -> Self {
        self.chrome_connection_url = url.filter(|u| !u.trim().is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Configuration::default();

        assert_eq!(config.app_base, DEFAULT_APP_BASE);
        assert_eq!(config.stores(), vec![StoreId::Woolworths]);
        assert_eq!(config.settle_delay, Duration::from_millis(800));
        assert_eq!(config.retry.retries, 0);
        assert_eq!(config.attempt_schedule.len(), 4);
    }

    #[test]
    fn test_api_url_joins_cleanly() {
        let config = Configuration::new().with_app_base("http://localhost:9000/");
        assert_eq!(
            config.api_url("next_multi"),
            "http://localhost:9000/api/next_multi"
        );
        assert_eq!(
            Configuration::new().with_app_base("   ").app_base,
            DEFAULT_APP_BASE
        );
    }

    #[test]
    fn test_explicit_stores_override_mode() {
        let config = Configuration::new()
            .with_store_mode(StoreMode::SeqWc)
            .with_stores(vec![StoreId::Aldi]);
        assert_eq!(config.stores(), vec![StoreId::Aldi]);

        let config = config.with_stores(vec![]);
        assert_eq!(config.stores(), vec![StoreId::Woolworths, StoreId::Coles]);
    }

    #[test]
    fn test_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("PRICEWATCH_APP_BASE", "http://10.0.0.2:8000"),
            ("PRICEWATCH_MODE", "seq_cw"),
            ("PRICEWATCH_SETTLE_MS", "50"),
            ("PRICEWATCH_RETRY_BUDGET", "two"),
            ("CHROME_URL", "http://127.0.0.1:9222"),
        ]
        .into_iter()
        .collect();

        let config = Configuration::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.app_base, "http://10.0.0.2:8000");
        assert_eq!(config.stores(), vec![StoreId::Coles, StoreId::Woolworths]);
        assert_eq!(config.settle_delay, Duration::from_millis(50));
        assert_eq!(config.retry.retries, 0);
        assert_eq!(
            config.chrome_connection_url.as_deref(),
            Some("http://127.0.0.1:9222")
        );
    }
}
