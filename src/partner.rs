//! Clients for the event's partner scoring site.
//!
//! Both directions are best-effort: the arena logs failures and carries on,
//! so partner outages never affect match flow.

use std::fmt::Write as _;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::dto::events::ScorePostedPayload;
use crate::models::{AllianceColor, Match, MatchResult, PublishingConfig};

/// Budget for a result upload.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);
/// Budget for a lineup fetch; this one runs inline during match load.
const LINEUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Uploads posted match results to the partner site.
#[derive(Debug, Clone)]
pub struct ResultsPublisher {
    config: PublishingConfig,
}

impl ResultsPublisher {
    /// Create a publisher for the given endpoint and credentials.
    pub fn new(config: PublishingConfig) -> Self {
        Self { config }
    }

    /// POST the posted-score payload for one match result.
    ///
    /// The request carries `X-Auth-Id` plus `X-Auth-Sig`, a hex SHA-256 over
    /// the shared secret, the request path, and the exact body bytes.
    pub async fn publish_result(&self, m: &Match, result: &MatchResult) -> anyhow::Result<()> {
        let path = format!("/api/matches/{}", match_key(&m.short_name));
        let payload = ScorePostedPayload {
            current_match: m.clone(),
            red_summary: result.summary(AllianceColor::Red),
            blue_summary: result.summary(AllianceColor::Blue),
            red_cards: result.red_cards.clone(),
            blue_cards: result.blue_cards.clone(),
        };
        let body = serde_json::to_string(&payload)?;
        let signature = sign(&self.config.auth_secret, &path, &body);
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

        let client = Client::builder().timeout(PUBLISH_TIMEOUT).build()?;
        let response = client
            .post(&url)
            .header("X-Auth-Id", &self.config.auth_id)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("X-Auth-Sig", &signature)
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("results endpoint returned {}", response.status());
        }
        Ok(())
    }
}

/// Playoff lineup as served by the partner site, team ids as strings.
#[derive(Debug, Clone, Deserialize)]
pub struct PartnerLineup {
    /// Red alliance teams in station order.
    pub red: Vec<String>,
    /// Blue alliance teams in station order.
    pub blue: Vec<String>,
}

impl PartnerLineup {
    /// Parsed team ids in station order `R1..B3`; missing or unparsable
    /// entries yield zero.
    pub fn team_ids(&self) -> [u32; 6] {
        let mut ids = [0u32; 6];
        for (slot, entry) in self.red.iter().take(3).enumerate() {
            ids[slot] = entry.trim().parse().unwrap_or(0);
        }
        for (slot, entry) in self.blue.iter().take(3).enumerate() {
            ids[slot + 3] = entry.trim().parse().unwrap_or(0);
        }
        ids
    }
}

/// Fetch the partner site's lineup for one match.
pub async fn fetch_lineup(base_url: &str, short_name: &str) -> anyhow::Result<PartnerLineup> {
    let url = format!(
        "{}/api/lineups/{}",
        base_url.trim_end_matches('/'),
        match_key(short_name)
    );
    let client = Client::builder().timeout(LINEUP_TIMEOUT).build()?;
    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("lineup endpoint returned {}", response.status());
    }
    Ok(response.json().await?)
}

/// URL key for a match, the lowercased short name.
fn match_key(short_name: &str) -> String {
    short_name.to_ascii_lowercase()
}

fn sign(secret: &str, path: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(path.as_bytes());
    hasher.update(body.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
