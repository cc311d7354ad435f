use serde::{Deserialize, Serialize};

use crate::engine::sentiment::Sentiment;

#[derive(Debug, Deserialize)]
pub struct SentimentRequest {
    #[serde(default)]
    pub review: Option<String>,
}

impl SentimentRequest {
    /// The review text, if present and not blank.
    pub fn text(&self) -> Option<&str> {
        self.review.as_deref().filter(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct SentimentResponse {
    pub sentiment: Sentiment,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct ProviderScore {
    pub provider: i64,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub user: i64,
    pub recommendations: Vec<ProviderScore>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub reviews: usize,
    pub vocabulary_size: usize,
    pub users: usize,
    pub providers: usize,
    pub rank: usize,
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
