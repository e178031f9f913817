use std::{env, ops::Range, path::PathBuf, time::Duration};

pub const HISTORY_KEY: &str = "ai-studio-history";
pub const DEFAULT_HISTORY_CAP: usize = 5;

/// Automatic retry budget for one logical generation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Ascending backoff schedule; the last entry repeats when exhausted.
    pub delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delays: vec![Duration::from_secs(2), Duration::from_secs(4), Duration::from_secs(8)],
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delays: Vec<Duration>) -> Self {
        Self { max_attempts: max_attempts.max(1), delays }
    }

    pub fn from_env() -> Self {
        let mut policy = Self::default();
        if let Some(n) = env::var("STUDIO_MAX_ATTEMPTS").ok().and_then(|v| v.parse::<u32>().ok()) {
            policy.max_attempts = n.max(1);
        }
        if let Ok(raw) = env::var("STUDIO_RETRY_DELAYS_MS") {
            let delays: Vec<Duration> = raw
                .split(',')
                .filter_map(|part| part.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .collect();
            if !delays.is_empty() {
                policy.delays = delays;
            }
        }
        policy
    }

    /// Delay to wait after the failed attempt with this 0-based index.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        self.delays
            .get(attempt_index as usize)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or_default()
    }

    pub fn is_last_attempt(&self, attempt_index: u32) -> bool {
        attempt_index + 1 >= self.max_attempts
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub latency_ms: Range<u64>,
    pub failure_rate: f64,
    pub max_upload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            latency_ms: 1000..2000,
            failure_rate: 0.2,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let port = env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.port);
        let min = env::var("MOCK_LATENCY_MIN_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.latency_ms.start);
        let max = env::var("MOCK_LATENCY_MAX_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.latency_ms.end);
        let failure_rate = env::var("MOCK_FAILURE_RATE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .map(|r| r.clamp(0.0, 1.0))
            .unwrap_or(defaults.failure_rate);
        Self {
            port,
            latency_ms: min..max.max(min),
            failure_rate,
            ..defaults
        }
    }

    /// No latency and no injected failures.
    pub fn deterministic() -> Self {
        Self { latency_ms: 0..0, failure_rate: 0.0, ..Self::default() }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: String,
    pub history_path: PathBuf,
    pub history_cap: usize,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8080".to_string(),
            history_path: PathBuf::from("./ai-studio-history.json"),
            history_cap: DEFAULT_HISTORY_CAP,
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base: env::var("STUDIO_API_BASE").unwrap_or(defaults.api_base),
            history_path: env::var("STUDIO_HISTORY_PATH").map(PathBuf::from).unwrap_or(defaults.history_path),
            history_cap: defaults.history_cap,
            retry: RetryPolicy::from_env(),
        }
    }
}
