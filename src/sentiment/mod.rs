// Market-context collaborator: coarse news sentiment per asset class.
// Failures never block signal generation; the fallback is Neutral.

use serde::Deserialize;
use std::time::Duration;

use crate::models::{AssetClass, Instrument};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const HEADLINE_PAGE_SIZE: u32 = 20;

const BULLISH_WORDS: &[&str] = &["rally", "surge", "gain", "bullish", "record high", "soar"];
const BEARISH_WORDS: &[&str] = &["crash", "plunge", "selloff", "bearish", "slump", "tumble"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Bullish,
    Neutral,
    Bearish,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Headline-driven sentiment source; disabled without an API key
pub struct MarketContext {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl MarketContext {
    pub fn from_env() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_key: std::env::var("NEWS_API_KEY").ok().filter(|k| !k.is_empty()),
            base_url: std::env::var("NEWS_API_URL")
                .unwrap_or_else(|_| "https://newsapi.org/v2".to_string()),
        }
    }

    /// Assess market context for an instrument; Neutral on any failure
    pub async fn assess(&self, instrument: &Instrument) -> Sentiment {
        let Some(api_key) = &self.api_key else {
            return Sentiment::Neutral;
        };

        let query = match instrument.asset_class {
            AssetClass::Crypto => "cryptocurrency",
            AssetClass::Currency => "forex",
        };

        match self.fetch_headlines(api_key, query).await {
            Ok(headlines) => score_headlines(&headlines),
            Err(e) => {
                tracing::debug!("Sentiment fetch failed ({}), assuming neutral", e);
                Sentiment::Neutral
            }
        }
    }

    async fn fetch_headlines(&self, api_key: &str, query: &str) -> reqwest::Result<Vec<String>> {
        let response: NewsResponse = self
            .http
            .get(format!("{}/everything", self.base_url))
            .query(&[
                ("q", query),
                ("sortBy", "publishedAt"),
                ("pageSize", &HEADLINE_PAGE_SIZE.to_string()),
                ("apiKey", api_key),
            ])
            .send()
            .await?
            .json()
            .await?;

        Ok(response
            .articles
            .into_iter()
            .flat_map(|a| [a.title, a.description])
            .flatten()
            .collect())
    }
}

/// Keyword vote over headlines; ties are neutral
fn score_headlines(headlines: &[String]) -> Sentiment {
    let mut score: i64 = 0;

    for headline in headlines {
        let lower = headline.to_lowercase();
        if BULLISH_WORDS.iter().any(|w| lower.contains(w)) {
            score += 1;
        }
        if BEARISH_WORDS.iter().any(|w| lower.contains(w)) {
            score -= 1;
        }
    }

    match score.cmp(&0) {
        std::cmp::Ordering::Greater => Sentiment::Bullish,
        std::cmp::Ordering::Less => Sentiment::Bearish,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}
