use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use rayon::prelude::*;
use sprs::CsVec;
use tracing::info;

use crate::corpus::Review;
use crate::error::TrainingFailure;
use crate::preprocessing::tokenizer::filtered_tokens;

pub mod ratings;

pub use ratings::{RatingMatrix, RatingSignal};

/// TF-IDF vector over the fitted vocabulary.
pub type SparseVector = CsVec<f64>;

/// Vocabulary, IDF weights and stop words learned from a training corpus.
/// Immutable once fitted.
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    terms: HashMap<String, usize>,
    idf: Vec<f64>,
    stop_words: HashSet<String>,
    documents: usize,
}

impl FeaturePipeline {
    pub fn fit(corpus: &[Review], stop_words: HashSet<String>) -> Result<Self, TrainingFailure> {
        if corpus.is_empty() {
            return Err(TrainingFailure::EmptyCorpus);
        }
        let n_docs = corpus.len();

        let tokenized: Vec<Vec<String>> = corpus
            .par_iter()
            .map(|review| filtered_tokens(&review.text, &stop_words))
            .collect();

        let vocabulary: BTreeSet<&str> = tokenized
            .iter()
            .flat_map(|tokens| tokens.iter().map(String::as_str))
            .collect();
        if vocabulary.is_empty() {
            return Err(TrainingFailure::EmptyVocabulary);
        }

        let terms: HashMap<String, usize> = vocabulary
            .into_iter()
            .enumerate()
            .map(|(i, term)| (term.to_string(), i))
            .collect();

        let mut df = vec![0usize; terms.len()];
        for tokens in &tokenized {
            let seen: HashSet<usize> = tokens.iter().filter_map(|t| terms.get(t).copied()).collect();
            for term_index in seen {
                df[term_index] += 1;
            }
        }

        let idf = df
            .iter()
            .map(|&df| ((n_docs as f64 + 1.0) / (df as f64 + 1.0)).ln())
            .collect();

        info!(documents = n_docs, vocabulary = terms.len(), "feature pipeline fitted");

        Ok(Self {
            terms,
            idf,
            stop_words,
            documents: n_docs,
        })
    }

    /// Unknown terms are dropped; an empty result is the all-zero vector.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut term_counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in filtered_tokens(text, &self.stop_words) {
            if let Some(&idx) = self.terms.get(&token) {
                *term_counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut indices = Vec::with_capacity(term_counts.len());
        let mut data = Vec::with_capacity(term_counts.len());
        for (term_idx, tf) in term_counts {
            let weight = tf * self.idf[term_idx];
            if weight != 0.0 {
                indices.push(term_idx);
                data.push(weight);
            }
        }
        CsVec::new(self.terms.len(), indices, data)
    }

    pub fn transform_corpus(&self, corpus: &[Review]) -> Vec<SparseVector> {
        corpus.par_iter().map(|review| self.transform(&review.text)).collect()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.terms.len()
    }

    pub fn term_index(&self, term: &str) -> Option<usize> {
        self.terms.get(term).copied()
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    /// Number of documents seen during fit.
    pub fn documents(&self) -> usize {
        self.documents
    }
}
