//! HTTP rank source.
//!
//! Posts `{domain, keywords}` and expects `{positions: {keyword: position|null}}`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use autopilot_db::models::site::Site;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::store::RankFetcher;

pub struct HttpRankFetcher {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

#[derive(Serialize)]
struct PositionsRequest<'a> {
    domain: &'a str,
    keywords: &'a [String],
}

#[derive(Deserialize)]
struct PositionsResponse {
    positions: HashMap<String, Option<i32>>,
}

impl HttpRankFetcher {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::RankFetch(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl RankFetcher for HttpRankFetcher {
    async fn fetch_positions(
        &self,
        site: &Site,
        keywords: &[String],
    ) -> PipelineResult<HashMap<String, Option<i32>>> {
        let mut builder = self.client.post(&self.endpoint).json(&PositionsRequest {
            domain: &site.domain,
            keywords,
        });
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| PipelineError::RankFetch(format!("connection failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(PipelineError::RankFetch(format!("HTTP {}", resp.status())));
        }

        let body: PositionsResponse = resp
            .json()
            .await
            .map_err(|e| PipelineError::RankFetch(format!("unexpected response body: {e}")))?;
        Ok(body.positions)
    }
}
