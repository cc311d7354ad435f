use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse, Responder};
use tracing::debug;

use crate::bundle::ModelBundle;
use crate::error::ApiError;

pub mod models;

use models::{
    round_to, ProviderScore, RecommendationResponse, SentimentRequest, SentimentResponse,
    StatsResponse,
};

pub const REVIEW_REQUIRED: &str = "Review text required";
pub const NO_RECOMMENDATIONS: &str = "No recommendations found for user.";
pub const INVALID_USER_ID: &str = "Invalid userId provided";

/// Read-only state shared by every worker.
pub struct AppState {
    pub models: Arc<ModelBundle>,
    pub recommendation_count: usize,
}

impl AppState {
    pub fn new(models: Arc<ModelBundle>, recommendation_count: usize) -> Self {
        Self {
            models,
            recommendation_count,
        }
    }
}

#[get("/")]
async fn hello() -> impl Responder {
    HttpResponse::Ok().body("Review Insights API")
}

#[post("/analyze_sentiment")]
async fn analyze_sentiment(
    body: web::Json<SentimentRequest>,
    data: web::Data<AppState>,
) -> Result<web::Json<SentimentResponse>, ApiError> {
    let text = body
        .text()
        .ok_or_else(|| ApiError::Validation(REVIEW_REQUIRED.to_string()))?;

    let prediction = data.models.analyze(text);
    debug!(sentiment = ?prediction.sentiment, confidence = prediction.confidence, "sentiment analyzed");

    Ok(web::Json(SentimentResponse {
        sentiment: prediction.sentiment,
        confidence: round_to(prediction.confidence, 3),
    }))
}

#[get("/recommend/{user_id}")]
async fn recommend(
    path: web::Path<i64>,
    data: web::Data<AppState>,
) -> Result<web::Json<RecommendationResponse>, ApiError> {
    let user_id = path.into_inner();
    let recommendations = data
        .models
        .recommend(user_id, data.recommendation_count)
        .map_err(|err| {
            debug!(user_id, error = %err, "cold start");
            ApiError::NotFound(NO_RECOMMENDATIONS.to_string())
        })?;

    Ok(web::Json(RecommendationResponse {
        user: user_id,
        recommendations: recommendations
            .into_iter()
            .map(|(provider, score)| ProviderScore {
                provider,
                score: round_to(score, 2),
            })
            .collect(),
    }))
}

#[get("/stats")]
async fn stats(data: web::Data<AppState>) -> impl Responder {
    let models = &data.models;
    HttpResponse::Ok().json(StatsResponse {
        reviews: models.reviews(),
        vocabulary_size: models.pipeline().vocabulary_size(),
        users: models.recommender().users().len(),
        providers: models.recommender().providers().len(),
        rank: models.recommender().rank(),
    })
}

/// Registers the routes plus extractor configs that turn malformed input
/// into the same JSON error bodies the handlers produce.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        debug!(error = %err, "rejected sentiment payload");
        ApiError::Validation(REVIEW_REQUIRED.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        debug!(error = %err, "rejected path parameter");
        ApiError::Validation(INVALID_USER_ID.to_string()).into()
    }))
    .service(hello)
    .service(analyze_sentiment)
    .service(recommend)
    .service(stats);
}
