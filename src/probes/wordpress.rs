//! WordPress detection
//!
//! A site counts as WordPress when at least two independent indicators are
//! present. Indicators come from the page HTML and, optionally, from whether
//! `wp-admin` answers with anything other than 404.

use crate::config::Config;
use crate::probes::traits::{Fingerprint, FingerprintProbe, ProbeError, ProbeResult};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

/// Indicators needed before a site is reported as WordPress
pub const WORDPRESS_THRESHOLD: usize = 2;

const WP_ADMIN_TIMEOUT: Duration = Duration::from_secs(5);

static WP_PATHS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"wp-content|wp-includes").expect("valid wp path regex"));

static THEME_OR_PLUGIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"themes/[^/]+/|plugins/[^/]+/").expect("valid theme/plugin regex")
});

static WP_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/wp-json/").expect("valid wp-json regex"));

/// Fingerprint probe that looks for WordPress
pub struct WordPressDetector {
    client: Client,
    check_wp_admin: bool,
}

impl WordPressDetector {
    pub fn new(client: Client, check_wp_admin: bool) -> Self {
        Self {
            client,
            check_wp_admin,
        }
    }

    pub fn from_config(client: Client, config: &Config) -> Self {
        Self::new(client, config.fingerprint.check_wp_admin)
    }

    /// Returns `Some(true)` when `wp-admin` next to `url` exists
    ///
    /// Any transport failure is treated as "no evidence" and yields `None`.
    async fn wp_admin_exists(&self, url: &str) -> Option<bool> {
        let admin_url = Url::parse(url).ok()?.join("wp-admin").ok()?;

        match self
            .client
            .head(admin_url)
            .timeout(WP_ADMIN_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => Some(response.status() != StatusCode::NOT_FOUND),
            Err(e) => {
                tracing::debug!(url, error = %e, "wp-admin check failed");
                None
            }
        }
    }
}

/// Counts the WordPress indicators present in a page's HTML
pub fn count_html_indicators(html: &str) -> usize {
    let document = Html::parse_document(html);

    let checks = [
        WP_PATHS.is_match(html),
        has_generator_meta(&document),
        has_element(&document, r#"link[rel="https://api.w.org/"]"#),
        THEME_OR_PLUGIN.is_match(html),
        has_element(&document, r#"link[type="application/rss+xml"]"#),
        WP_JSON.is_match(html),
    ];

    checks.into_iter().filter(|&found| found).count()
}

fn has_element(document: &Html, selector: &str) -> bool {
    Selector::parse(selector)
        .map(|s| document.select(&s).next().is_some())
        .unwrap_or(false)
}

fn has_generator_meta(document: &Html) -> bool {
    let Ok(selector) = Selector::parse(r#"meta[name="generator"][content]"#) else {
        return false;
    };

    document.select(&selector).any(|element| {
        element
            .value()
            .attr("content")
            .is_some_and(|content| content.to_lowercase().contains("wordpress"))
    })
}

#[async_trait]
impl FingerprintProbe for WordPressDetector {
    async fn probe(&self, url: &str) -> ProbeResult<Fingerprint> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Upstream(format!(
                "HTTP {} fetching {}",
                status.as_u16(),
                url
            )));
        }

        let html = response.text().await?;
        // Html is not Send; count before the next await
        let mut indicators = count_html_indicators(&html);

        if self.check_wp_admin && self.wp_admin_exists(url).await == Some(true) {
            indicators += 1;
        }

        tracing::debug!(url, indicators, "WordPress indicators counted");

        Ok(Fingerprint {
            is_word_press: indicators >= WORDPRESS_THRESHOLD,
        })
    }
}
