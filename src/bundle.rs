use std::collections::HashSet;

use tracing::info;

use crate::corpus::Review;
use crate::engine::als::{AlsParams, Recommender};
use crate::engine::sentiment::{ClassifierParams, Prediction, SentimentClassifier};
use crate::error::{ColdStartError, TrainingFailure};
use crate::matrix::{FeaturePipeline, RatingMatrix, RatingSignal};
use crate::preprocessing::tokenizer::default_stop_words;

#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub stop_words: HashSet<String>,
    pub classifier: ClassifierParams,
    pub als: AlsParams,
    pub rating_signal: RatingSignal,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            stop_words: default_stop_words(),
            classifier: ClassifierParams::default(),
            als: AlsParams::default(),
            rating_signal: RatingSignal::default(),
        }
    }
}

/// Everything the handlers read. Built once at startup, never mutated.
#[derive(Debug)]
pub struct ModelBundle {
    pipeline: FeaturePipeline,
    classifier: SentimentClassifier,
    recommender: Recommender,
    reviews: usize,
}

impl ModelBundle {
    pub fn train(corpus: &[Review], options: TrainingOptions) -> Result<Self, TrainingFailure> {
        let pipeline = FeaturePipeline::fit(corpus, options.stop_words)?;

        let examples: Vec<_> = pipeline
            .transform_corpus(corpus)
            .into_iter()
            .zip(corpus.iter().map(|review| review.label))
            .collect();
        let classifier = SentimentClassifier::train(&examples, &options.classifier)?;

        let ratings = RatingMatrix::from_reviews(corpus, options.rating_signal);
        let recommender = Recommender::train(&ratings, &options.als)?;

        info!(
            reviews = corpus.len(),
            vocabulary = pipeline.vocabulary_size(),
            users = recommender.users().len(),
            providers = recommender.providers().len(),
            "model bundle ready"
        );

        Ok(Self {
            pipeline,
            classifier,
            recommender,
            reviews: corpus.len(),
        })
    }

    pub fn analyze(&self, text: &str) -> Prediction {
        self.classifier.predict(&self.pipeline.transform(text))
    }

    pub fn recommend(&self, user_id: i64, n: usize) -> Result<Vec<(i64, f64)>, ColdStartError> {
        self.recommender.recommend(user_id, n)
    }

    pub fn pipeline(&self) -> &FeaturePipeline {
        &self.pipeline
    }

    pub fn classifier(&self) -> &SentimentClassifier {
        &self.classifier
    }

    pub fn recommender(&self) -> &Recommender {
        &self.recommender
    }

    /// Size of the training corpus.
    pub fn reviews(&self) -> usize {
        self.reviews
    }
}
