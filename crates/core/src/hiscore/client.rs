//! Hiscore API client for fetching player standings

use reqwest::Client;
use reqwest::StatusCode;
use std::time::Duration;

use super::types::HiscorePayload;
use crate::error::{Error, Result};
use crate::modes::GameMode;

const HISCORE_BASE: &str = "https://secure.runescape.com";
const JSON_ENDPOINT: &str = "index_lite.json";
const USER_AGENT: &str = concat!("osrs-tracker/", env!("CARGO_PKG_VERSION"));

/// Container for successful API responses.
#[derive(Debug, Clone)]
pub struct HiscoreResponse {
    pub data: HiscorePayload,
    pub url: String,
}

/// Result of a single fetch. Absence from a hiscore table is a normal
/// outcome, not an error; transport failures surface as `Err`.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Found(HiscoreResponse),
    NotFound,
}

/// Seam for driving the resolver and snapshot agent without the network.
#[allow(async_fn_in_trait)]
pub trait HiscoreFetch {
    async fn fetch(&self, player: &str, mode: GameMode) -> Result<FetchOutcome>;
}

impl<F: HiscoreFetch> HiscoreFetch for &F {
    async fn fetch(&self, player: &str, mode: GameMode) -> Result<FetchOutcome> {
        (**self).fetch(player, mode).await
    }
}

/// Thin wrapper around the OSRS hiscore JSON endpoints.
#[derive(Debug, Clone)]
pub struct HiscoreClient {
    client: Client,
}

impl HiscoreClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    fn build_url(&self, mode: GameMode) -> String {
        format!("{}/m={}/{}", HISCORE_BASE, mode.hiscore_path(), JSON_ENDPOINT)
    }
}

impl HiscoreFetch for HiscoreClient {
    async fn fetch(&self, player: &str, mode: GameMode) -> Result<FetchOutcome> {
        let url = self.build_url(mode);

        let response = self
            .client
            .get(&url)
            .query(&[("player", player)])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(FetchOutcome::NotFound);
        }

        if !response.status().is_success() {
            return Err(Error::Api(format!(
                "unexpected status {} for {} on {}",
                response.status(),
                player,
                mode
            )));
        }

        let url = response.url().to_string();
        let data: HiscorePayload = response.json().await?;

        Ok(FetchOutcome::Found(HiscoreResponse { data, url }))
    }
}
