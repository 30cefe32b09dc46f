//! Exit node harvesting from public listing pages.
//!
//! Each configured page is fetched with a bounded timeout, scanned for
//! address-shaped text, and the strictly valid addresses are unioned.
//! Failing sources are logged and skipped; they never fail the whole fetch.

use std::collections::BTreeSet;
use std::time::Duration;

use futures::future::join_all;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::errors::FetchError;
use crate::ip;

/// Some listing sites refuse requests that do not look like a browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/87.0.4280.88 Safari/537.36";

/// Outcome of fetching a single source.
#[derive(Debug)]
pub struct SourceReport {
    pub url: String,
    pub result: Result<BTreeSet<String>, FetchError>,
}

pub struct SourceAggregator {
    client: Client,
    sources: Vec<String>,
}

impl SourceAggregator {
    pub fn new(sources: Vec<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self { client, sources })
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Body of one source page. Non-2xx responses are errors.
    pub async fn fetch_source(&self, url: &str) -> Result<String, FetchError> {
        debug!(source = %url, "fetching exit node source");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status));
        }

        Ok(response.text().await?)
    }

    /// Fetches every source concurrently and reports each outcome in source order.
    pub async fn fetch_each(&self) -> Vec<SourceReport> {
        let fetches = self.sources.iter().map(|url| async move {
            let result = self.fetch_source(url).await.map(|body| harvest(&body));
            match &result {
                Ok(ips) => info!(source = %url, count = ips.len(), "source fetched"),
                Err(e) => warn!(source = %url, error = %e, "failed to fetch exit node source"),
            }
            SourceReport {
                url: url.clone(),
                result,
            }
        });
        join_all(fetches).await
    }

    /// Union of the valid addresses found across all reachable sources.
    /// An empty set is a normal outcome (e.g. every source down).
    pub async fn fetch_all(&self) -> BTreeSet<String> {
        let reports = self.fetch_each().await;
        let failed = reports.iter().filter(|r| r.result.is_err()).count();

        let ips: BTreeSet<String> = reports
            .into_iter()
            .filter_map(|r| r.result.ok())
            .flatten()
            .collect();

        info!(
            count = ips.len(),
            sources = self.sources.len(),
            failed,
            "exit node addresses aggregated"
        );
        ips
    }
}

/// Extracts address-shaped text and keeps the canonical form of the valid ones.
pub fn harvest(body: &str) -> BTreeSet<String> {
    ip::extract(body)
        .into_iter()
        .filter_map(|candidate| ip::canonicalize(&candidate))
        .collect()
}
