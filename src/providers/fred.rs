use crate::constants::{
    FRED_API_KEY_VAR, FRED_BASE_URL, REALTIME_ALL_END, REALTIME_ALL_START,
};
use crate::error::{LakeError, Result};
use crate::types::{RawVintageRow, VintageProvider};
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info, instrument};

/// HTTP client for the FRED observations API. Asking for the full realtime
/// window makes the same endpoint return every historical vintage (ALFRED);
/// the default window returns only the latest published values.
pub struct FredClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl FredClient {
    /// Builds a client from the `FRED_API_KEY` environment variable.
    pub fn from_env(base_url: Option<String>) -> Result<Self> {
        let api_key = std::env::var(FRED_API_KEY_VAR)
            .map_err(|_| LakeError::Config(format!("{FRED_API_KEY_VAR} not set")))?;
        Ok(Self::new(api_key, base_url))
    }

    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| FRED_BASE_URL.to_string()),
        }
    }

    async fn fetch_observations(
        &self,
        series_id: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<RawVintageRow>> {
        let url = format!("{}/series/observations", self.base_url);
        let mut params = vec![
            ("series_id", series_id),
            ("api_key", self.api_key.as_str()),
            ("file_type", "json"),
        ];
        params.extend_from_slice(query);

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| LakeError::Provider {
                series_id: series_id.to_string(),
                message: format!("request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(LakeError::Provider {
                series_id: series_id.to_string(),
                message: format!("upstream returned status {}", response.status().as_u16()),
            });
        }

        let body: Value = response.json().await.map_err(|e| LakeError::Provider {
            series_id: series_id.to_string(),
            message: format!("invalid JSON payload: {e}"),
        })?;

        let observations = body["observations"].as_array().ok_or_else(|| {
            LakeError::Provider {
                series_id: series_id.to_string(),
                message: "observations array missing from payload".to_string(),
            }
        })?;

        if observations.is_empty() {
            return Err(LakeError::Provider {
                series_id: series_id.to_string(),
                message: "empty observation payload".to_string(),
            });
        }

        let mut rows = Vec::with_capacity(observations.len());
        for obs in observations {
            rows.push(RawVintageRow {
                observation_date: obs["date"].as_str().unwrap_or_default().to_string(),
                vintage_start: obs["realtime_start"].as_str().unwrap_or_default().to_string(),
                vintage_end: obs["realtime_end"].as_str().map(|s| s.to_string()),
                value: obs["value"].as_str().unwrap_or_default().to_string(),
            });
        }

        debug!("Fetched {} raw observations for {}", rows.len(), series_id);
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl VintageProvider for FredClient {
    fn provider_name(&self) -> &'static str {
        "FRED"
    }

    #[instrument(skip(self))]
    async fn fetch_all_vintages(&self, series_id: &str) -> Result<Vec<RawVintageRow>> {
        let rows = self
            .fetch_observations(
                series_id,
                &[
                    ("realtime_start", REALTIME_ALL_START),
                    ("realtime_end", REALTIME_ALL_END),
                ],
            )
            .await?;
        info!("Retrieved {} observations across all vintages for {}", rows.len(), series_id);
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn fetch_latest(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawVintageRow>> {
        let start = start.format("%Y-%m-%d").to_string();
        let end = end.format("%Y-%m-%d").to_string();
        let rows = self
            .fetch_observations(
                series_id,
                &[
                    ("observation_start", start.as_str()),
                    ("observation_end", end.as_str()),
                ],
            )
            .await?;
        info!("Retrieved {} latest observations for {}", rows.len(), series_id);
        Ok(rows)
    }
}
