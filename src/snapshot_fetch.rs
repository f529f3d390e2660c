use std::env;
use std::fmt;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rand::Rng;
use reqwest::blocking::RequestBuilder;
use reqwest::header::RETRY_AFTER;
use serde_json::Value;

use crate::http_client::http_client;
use crate::state::{PlayerRow, RecruitmentUpdate, Snapshot};

/// Terminal failure of a service call.
#[derive(Debug, Clone)]
pub enum FetchError {
    /// Non-2xx response after retries; carries the status and body text.
    Service { status: u16, body: String },
    /// Transport-level failure (connect, timeout, reset).
    Network(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Service { status, body } => write!(f, "http {status}: {body}"),
            FetchError::Network(msg) => write!(f, "network error: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(parsed) = env::var("FOE_RETRY_MAX")
            .ok()
            .and_then(|val| val.parse::<u32>().ok())
        {
            config.max_attempts = parsed.clamp(1, 10);
        }
        if let Some(parsed) = env::var("FOE_BACKOFF_BASE_MS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
        {
            config.base_delay = Duration::from_millis(parsed.max(1));
        }
        if let Some(parsed) = env::var("FOE_BACKOFF_MAX_MS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
        {
            config.max_delay = Duration::from_millis(parsed.max(1));
        }
        config
    }

    /// Exponential backoff with jitter; a server-supplied retry delay wins
    /// (capped at the configured maximum).
    pub fn backoff_for_attempt(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(explicit) = retry_after {
            return explicit.min(self.max_delay);
        }
        let exp = 2u32.saturating_pow(attempt.saturating_sub(1));
        let base = self.base_delay.checked_mul(exp).unwrap_or(self.max_delay);
        let capped = base.min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        capped.mul_f64(jitter)
    }
}

pub fn api_base() -> Result<String> {
    let base = env::var("FOE_API_BASE").context("FOE_API_BASE is not set")?;
    Ok(base.trim_end_matches('/').to_string())
}

fn is_transient(status: u16) -> bool {
    matches!(status, 429 | 503)
}

/// Run a request with bounded retries. Only transient statuses are retried;
/// the request is rebuilt fresh for each attempt.
fn send_with_retry(build: impl Fn() -> RequestBuilder) -> Result<String, FetchError> {
    let config = RetryConfig::from_env();
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match build().send() {
            Err(err) => {
                if attempt >= config.max_attempts {
                    return Err(FetchError::Network(err.to_string()));
                }
                std::thread::sleep(config.backoff_for_attempt(attempt, None));
            }
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return resp.text().map_err(|err| FetchError::Network(err.to_string()));
                }
                let retry_after = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);
                let body = resp.text().unwrap_or_default();
                if is_transient(status.as_u16()) && attempt < config.max_attempts {
                    std::thread::sleep(config.backoff_for_attempt(attempt, retry_after));
                    continue;
                }
                return Err(FetchError::Service {
                    status: status.as_u16(),
                    body,
                });
            }
        }
    }
}

pub fn fetch_snapshots() -> Result<Vec<Snapshot>> {
    let client = http_client()?;
    let base = api_base()?;
    let url = format!("{base}/snapshots");
    let body = send_with_retry(|| client.get(&url)).context("snapshot list request failed")?;
    serde_json::from_str(&body).context("invalid snapshot list json")
}

/// Normalize the shapes the service is known to emit: a bare array, or an
/// object wrapping the array under `players`, `rows` or `data`. Anything else
/// is rejected rather than silently treated as empty.
pub fn parse_players_payload(raw: &str) -> Result<Vec<PlayerRow>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let root: Value = serde_json::from_str(trimmed).context("invalid players json")?;
    let rows = match root {
        Value::Array(_) => root,
        Value::Object(mut map) => {
            let wrapped = ["players", "rows", "data"]
                .into_iter()
                .find(|key| map.get(*key).is_some_and(Value::is_array))
                .and_then(|key| map.remove(key));
            match wrapped {
                Some(inner) => inner,
                None => bail!("unexpected players payload shape"),
            }
        }
        _ => bail!("unexpected players payload shape"),
    };
    serde_json::from_value(rows).context("invalid player rows json")
}

pub fn fetch_players_by_snapshot(snapshot_id: u32) -> Result<Vec<PlayerRow>> {
    let client = http_client()?;
    let base = api_base()?;
    let url = format!("{base}/snapshots/{snapshot_id}/players");
    let body = send_with_retry(|| client.get(&url)).context("player rows request failed")?;
    parse_players_payload(&body)
}

/// Push a recruitment patch for one player. The service echoes the updated
/// fields; a response that fails to parse falls back to the sent payload.
pub fn update_recruitment(
    player_id: u32,
    update: &RecruitmentUpdate,
) -> Result<RecruitmentUpdate, FetchError> {
    let client = http_client().map_err(|err| FetchError::Network(err.to_string()))?;
    let base = api_base().map_err(|err| FetchError::Network(err.to_string()))?;
    let url = format!("{base}/players/{player_id}/recruitment");
    let body = send_with_retry(|| client.put(&url).json(update))?;
    Ok(serde_json::from_str(&body).unwrap_or_else(|_| update.clone()))
}
