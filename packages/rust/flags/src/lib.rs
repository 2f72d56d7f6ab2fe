//! Feature-flag client for a PostHog-compatible `/decide` endpoint.
//!
//! The client is meant to be short-lived: build one, ask for a flag, then
//! [`FlagClient::shutdown`] it. Nothing is cached between evaluations.

use std::collections::HashMap;
use std::time::Duration;

use codestep_shared::{CodestepError, FeatureFlagSettings, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

/// Version of the decide API we speak.
const DECIDE_API_VERSION: &str = "3";

/// User-Agent string for flag requests.
const USER_AGENT: &str = concat!("Codestep/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct DecideRequest<'a> {
    api_key: &'a str,
    distinct_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct DecideResponse {
    #[serde(default, rename = "featureFlags")]
    feature_flags: HashMap<String, serde_json::Value>,
}

/// HTTP client for evaluating flags for one distinct user id at a time.
#[derive(Debug)]
pub struct FlagClient {
    http: Client,
    api_key: String,
    decide_url: Url,
}

impl FlagClient {
    /// Build a client against `host` (e.g. `https://app.posthog.com`).
    pub fn new(api_key: impl Into<String>, host: &str, timeout: Duration) -> Result<Self> {
        let decide_url = decide_url(host)?;
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CodestepError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            decide_url,
        })
    }

    /// Build a client from resolved runtime settings.
    pub fn from_settings(settings: &FeatureFlagSettings) -> Result<Self> {
        Self::new(
            settings.api_key.clone(),
            &settings.host,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    /// Evaluate `flag` for `distinct_id`.
    ///
    /// Returns `Ok(None)` when the service does not know the flag. A
    /// multivariate flag (string value) counts as enabled.
    #[instrument(skip(self), fields(url = %self.decide_url))]
    pub async fn is_feature_enabled(&self, flag: &str, distinct_id: &str) -> Result<Option<bool>> {
        let response = self
            .http
            .post(self.decide_url.clone())
            .json(&DecideRequest {
                api_key: &self.api_key,
                distinct_id,
            })
            .send()
            .await
            .map_err(|e| CodestepError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CodestepError::Network(format!(
                "flag service returned HTTP {status}"
            )));
        }

        let decided: DecideResponse = response
            .json()
            .await
            .map_err(|e| CodestepError::Network(format!("invalid decide response: {e}")))?;

        let value = decided.feature_flags.get(flag).map(flag_value_enabled);
        debug!(?value, "flag evaluated");
        Ok(value)
    }

    /// End the client's lifecycle. No events are buffered, so this only
    /// releases the connection pool.
    pub async fn shutdown(self) {
        debug!("flag client shut down");
        drop(self.http);
    }
}

fn flag_value_enabled(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => !s.is_empty(),
        _ => false,
    }
}

/// `<host>/decide/?v=3`, keeping any path prefix on the host.
fn decide_url(host: &str) -> Result<Url> {
    let mut base = Url::parse(host)
        .map_err(|e| CodestepError::config(format!("invalid feature flag host '{host}': {e}")))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    let mut url = base
        .join("decide/")
        .map_err(|e| CodestepError::config(format!("invalid feature flag host '{host}': {e}")))?;
    url.query_pairs_mut().append_pair("v", DECIDE_API_VERSION);
    Ok(url)
}
