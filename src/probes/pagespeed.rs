//! PageSpeed Insights client
//!
//! Runs a Lighthouse audit for one URL and reduces the response to the
//! handful of numbers an `AnalysisRecord` carries.

use crate::config::Config;
use crate::probes::http::{error_from_response, join_endpoint};
use crate::probes::traits::{MetricsProbe, PageMetrics, ProbeError, ProbeResult};
use crate::ConfigResult;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

const PAGESPEED_PATH: &str = "pagespeedonline/v5/runPagespeed";

/// Metrics probe backed by the PageSpeed Insights v5 API
pub struct PageSpeedClient {
    client: Client,
    endpoint: String,
    api_key: String,
    strategy: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageSpeedResponse {
    lighthouse_result: Option<LighthouseResult>,
}

#[derive(Debug, Deserialize)]
struct LighthouseResult {
    #[serde(default)]
    audits: HashMap<String, Audit>,
    #[serde(default)]
    categories: HashMap<String, Category>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Audit {
    numeric_value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Category {
    score: Option<f64>,
}

impl LighthouseResult {
    fn audit_value(&self, id: &str) -> Option<f64> {
        self.audits
            .get(id)
            .and_then(|audit| audit.numeric_value)
            .filter(|v| v.is_finite())
    }

    /// Category score in [0, 1]; a missing or null score counts as 0
    fn category_score(&self, id: &str) -> f64 {
        self.categories
            .get(id)
            .and_then(|category| category.score)
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(0.0)
    }

    fn into_metrics(self) -> PageMetrics {
        let millis_to_seconds = |v: f64| (v / 1000.0).max(0.0);

        let fid = self
            .audit_value("first-input-delay")
            .or_else(|| self.audit_value("max-potential-fid"))
            .unwrap_or(0.0)
            .max(0.0)
            .round();

        PageMetrics {
            load_time_seconds: self
                .audit_value("first-contentful-paint")
                .map(millis_to_seconds)
                .unwrap_or(0.0),
            lcp_seconds: self
                .audit_value("largest-contentful-paint")
                .map(millis_to_seconds)
                .unwrap_or(0.0),
            cls: self
                .audit_value("cumulative-layout-shift")
                .unwrap_or(0.0)
                .max(0.0),
            fid_millis: fid.min(u32::MAX as f64) as u32,
            performance_score: self.category_score("performance"),
            seo_score: self.category_score("seo"),
            accessibility_score: self.category_score("accessibility"),
        }
    }
}

impl PageSpeedClient {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        strategy: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            strategy: strategy.into(),
        }
    }

    /// Builds a client from the `[pagespeed]` section
    pub fn from_config(client: Client, config: &Config) -> ConfigResult<Self> {
        Ok(Self::new(
            client,
            config.pagespeed.endpoint.clone(),
            config.pagespeed_key()?,
            config.pagespeed.strategy.clone(),
        ))
    }
}

#[async_trait]
impl MetricsProbe for PageSpeedClient {
    async fn probe(&self, url: &str) -> ProbeResult<PageMetrics> {
        let endpoint = join_endpoint(&self.endpoint, PAGESPEED_PATH);

        tracing::debug!(url, strategy = %self.strategy, "Running PageSpeed audit");

        let response = self
            .client
            .get(&endpoint)
            .query(&[
                ("url", url),
                ("key", self.api_key.as_str()),
                ("strategy", self.strategy.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "Failed to analyze page speed").await);
        }

        let body: PageSpeedResponse = response.json().await?;
        body.lighthouse_result
            .map(LighthouseResult::into_metrics)
            .ok_or_else(|| ProbeError::Upstream("PageSpeed response has no Lighthouse result".to_string()))
    }
}
