//! Client for the external race catalog.
//!
//! Races and runners live in a remote service; this module resolves them over
//! HTTP and reports a tri-state outcome so callers can tell a catalog gap
//! (404) apart from an outage.

use crate::config::RaceApiConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Header the tunnelling proxy in front of the race service expects
const TUNNEL_BYPASS_HEADER: &str = "ngrok-skip-browser-warning";

/// Race metadata as served by the race service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceData {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "startDate", deserialize_with = "deserialize_start_date")]
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub kilometer: Option<serde_json::Value>,
}

/// Runner as served by the race service; fields other than the id are opaque
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerData {
    pub id: i64,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of a lookup against the race service
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    /// The service answered 404
    Missing,
    /// Transport failure, timeout, unexpected status or undecodable body
    Unavailable(String),
}

impl<T> Lookup<T> {
    /// Only a positive answer counts as existing
    pub fn exists(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// Result of validating a race/runner pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferValidation {
    pub race_valid: bool,
    pub runner_valid: bool,
    pub errors: Vec<String>,
}

impl OfferValidation {
    pub fn is_valid(&self) -> bool {
        self.race_valid && self.runner_valid
    }
}

/// Read-only view of the race catalog
#[async_trait]
pub trait RaceGateway: Send + Sync {
    /// Resolve a race by id
    async fn race(&self, race_id: i64) -> Lookup<RaceData>;

    /// Resolve a runner by id
    async fn runner(&self, runner_id: i64) -> Lookup<RunnerData>;

    /// Runners registered for a race
    async fn race_runners(&self, race_id: i64) -> Lookup<Vec<RunnerData>>;
}

/// Shared handle to a race gateway
pub type RaceGatewayHandle = Arc<dyn RaceGateway>;

/// Check both sides of an offer, collecting one message per failing side
pub async fn validate_race_and_runner(
    gateway: &dyn RaceGateway,
    race_id: i64,
    runner_id: i64,
) -> OfferValidation {
    let (race, runner) = tokio::join!(gateway.race(race_id), gateway.runner(runner_id));

    let mut errors = Vec::new();
    let race_valid = race.exists();
    if !race_valid {
        errors.push(format!("Race {} is invalid: this race does not exist", race_id));
    }
    let runner_valid = runner.exists();
    if !runner_valid {
        errors.push(format!(
            "Runner {} is invalid: this runner does not exist",
            runner_id
        ));
    }

    OfferValidation {
        race_valid,
        runner_valid,
        errors,
    }
}

/// `RaceGateway` backed by the race service's HTTP API
pub struct HttpRaceGateway {
    base_url: String,
    client: Client,
}

impl HttpRaceGateway {
    pub fn new(config: &RaceApiConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build race API client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Lookup<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = match self
            .client
            .get(&url)
            .header(TUNNEL_BYPASS_HEADER, "true")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let cause = if e.is_timeout() {
                    format!("timeout: {}", e)
                } else {
                    format!("transport error: {}", e)
                };
                error!("Race service unreachable for {}: {}", path, cause);
                return Lookup::Unavailable(cause);
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            warn!("Race service has no record for {}", path);
            return Lookup::Missing;
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Race service returned HTTP {} for {}: {}", status, path, body);
            return Lookup::Unavailable(format!("HTTP {}", status));
        }

        match response.json::<T>().await {
            Ok(value) => Lookup::Found(value),
            Err(e) => {
                error!("Undecodable race service response for {}: {}", path, e);
                Lookup::Unavailable(format!("decode error: {}", e))
            }
        }
    }
}

#[async_trait]
impl RaceGateway for HttpRaceGateway {
    async fn race(&self, race_id: i64) -> Lookup<RaceData> {
        self.get_json(&format!("/api/races/{}", race_id)).await
    }

    async fn runner(&self, runner_id: i64) -> Lookup<RunnerData> {
        self.get_json(&format!("/api/runners/{}", runner_id)).await
    }

    async fn race_runners(&self, race_id: i64) -> Lookup<Vec<RunnerData>> {
        self.get_json(&format!("/api/races/{}/runners", race_id)).await
    }
}

/// Accepts RFC 3339 timestamps, naive datetimes (read as UTC) and bare dates
fn deserialize_start_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_start_date(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("unrecognised startDate: {}", raw))
    })
}

pub(crate) fn parse_start_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
