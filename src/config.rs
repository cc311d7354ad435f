use std::path::PathBuf;

use serde::Deserialize;

use crate::bundle::TrainingOptions;
use crate::engine::als::AlsParams;
use crate::engine::sentiment::ClassifierParams;
use crate::matrix::RatingSignal;
use crate::preprocessing::tokenizer::{default_stop_words, load_stop_words};

/// Service settings, read from the environment (and `.env` when present).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,
    #[serde(default)]
    pub stop_words_path: Option<PathBuf>,

    #[serde(default = "default_classifier_regularization")]
    pub classifier_regularization: f64,
    #[serde(default = "default_classifier_max_iterations")]
    pub classifier_max_iterations: usize,
    #[serde(default = "default_classifier_tolerance")]
    pub classifier_tolerance: f64,

    #[serde(default = "default_als_rank")]
    pub als_rank: usize,
    #[serde(default = "default_als_regularization")]
    pub als_regularization: f64,
    #[serde(default = "default_als_iterations")]
    pub als_iterations: usize,
    #[serde(default = "default_als_seed")]
    pub als_seed: u64,
    #[serde(default)]
    pub rating_signal: RatingSignal,

    #[serde(default = "default_recommendation_count")]
    pub recommendation_count: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/reviews.db")
}

fn default_classifier_regularization() -> f64 {
    ClassifierParams::default().regularization
}

fn default_classifier_max_iterations() -> usize {
    ClassifierParams::default().max_iterations
}

fn default_classifier_tolerance() -> f64 {
    ClassifierParams::default().tolerance
}

fn default_als_rank() -> usize {
    AlsParams::default().rank
}

fn default_als_regularization() -> f64 {
    AlsParams::default().regularization
}

fn default_als_iterations() -> usize {
    AlsParams::default().iterations
}

fn default_als_seed() -> u64 {
    AlsParams::default().seed
}

fn default_recommendation_count() -> usize {
    5
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn training_options(&self) -> std::io::Result<TrainingOptions> {
        let stop_words = match &self.stop_words_path {
            Some(path) => load_stop_words(path)?,
            None => default_stop_words(),
        };

        Ok(TrainingOptions {
            stop_words,
            classifier: ClassifierParams {
                regularization: self.classifier_regularization,
                max_iterations: self.classifier_max_iterations,
                tolerance: self.classifier_tolerance,
            },
            als: AlsParams {
                rank: self.als_rank,
                regularization: self.als_regularization,
                iterations: self.als_iterations,
                seed: self.als_seed,
            },
            rating_signal: self.rating_signal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        envy::from_iter(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string()))).unwrap()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = from_pairs(&[]);
        assert_eq!(config.bind_address(), "0.0.0.0:5001");
        assert_eq!(config.corpus_path, PathBuf::from("data/reviews.db"));
        assert_eq!(config.recommendation_count, 5);
        assert_eq!(config.rating_signal, RatingSignal::Label);

        let options = config.training_options().unwrap();
        assert_eq!(options.als, AlsParams::default());
        assert_eq!(options.classifier, ClassifierParams::default());
        assert!(options.stop_words.contains("the"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("ALS_RANK", "4"),
            ("ALS_REGULARIZATION", "0.5"),
            ("RATING_SIGNAL", "implicit"),
            ("CORPUS_PATH", "reviews.jsonl"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.corpus_path, PathBuf::from("reviews.jsonl"));

        let options = config.training_options().unwrap();
        assert_eq!(options.als.rank, 4);
        assert_eq!(options.als.regularization, 0.5);
        assert_eq!(options.rating_signal, RatingSignal::Implicit);
    }

    #[test]
    fn custom_stop_words_replace_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stop.txt");
        std::fs::write(&path, "great\n").unwrap();

        let config = from_pairs(&[("STOP_WORDS_PATH", path.to_str().unwrap())]);
        let options = config.training_options().unwrap();
        assert_eq!(options.stop_words.len(), 1);
        assert!(options.stop_words.contains("great"));
    }
}
