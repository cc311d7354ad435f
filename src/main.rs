use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use review_insights::api::{self, AppState};
use review_insights::corpus::load_corpus;
use review_insights::{Config, ModelBundle};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    info!(corpus = %config.corpus_path.display(), "loading training corpus");

    let corpus = load_corpus(&config.corpus_path)
        .with_context(|| format!("failed to load corpus from {}", config.corpus_path.display()))?;
    let options = config.training_options().context("failed to load stop words")?;

    // Training is CPU-bound and must finish before the server accepts requests.
    let models = tokio::task::spawn_blocking(move || ModelBundle::train(&corpus, options))
        .await
        .context("training task panicked")?
        .context("model training failed")?;

    let state = web::Data::new(AppState::new(Arc::new(models), config.recommendation_count));
    let address = config.bind_address();
    info!("starting HTTP server on http://{}", address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();
        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            .configure(api::configure)
    })
    .bind(&address)
    .with_context(|| format!("failed to bind {address}"))?
    .run()
    .await
    .context("HTTP server error")
}
