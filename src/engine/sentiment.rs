use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::TrainingFailure;
use crate::matrix::SparseVector;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierParams {
    /// L2 penalty on the weights (bias is not penalized).
    pub regularization: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            regularization: 0.01,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
}

impl Sentiment {
    pub fn label(self) -> u8 {
        match self {
            Sentiment::Positive => 1,
            Sentiment::Negative => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub sentiment: Sentiment,
    /// P(positive).
    pub probability: f64,
    /// `max(p, 1 - p)`, always within `[0.5, 1.0]`.
    pub confidence: f64,
}

/// Binary logistic regression over TF-IDF vectors.
#[derive(Debug, Clone)]
pub struct SentimentClassifier {
    weights: Vec<f64>,
    bias: f64,
}

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

fn margin(weights: &[f64], bias: f64, x: &SparseVector) -> f64 {
    bias + x.iter().map(|(i, v)| weights[i] * v).sum::<f64>()
}

struct Objective<'a> {
    examples: &'a [(SparseVector, u8)],
    regularization: f64,
}

impl Objective<'_> {
    /// Mean log-loss plus the L2 penalty.
    fn loss(&self, weights: &[f64], bias: f64) -> f64 {
        let n = self.examples.len() as f64;
        let data_loss: f64 = self
            .examples
            .iter()
            .map(|(x, y)| {
                let z = margin(weights, bias, x);
                softplus(z) - f64::from(*y) * z
            })
            .sum::<f64>()
            / n;
        let penalty = 0.5 * self.regularization * weights.iter().map(|w| w * w).sum::<f64>();
        data_loss + penalty
    }

    fn gradient(&self, weights: &[f64], bias: f64) -> (Vec<f64>, f64) {
        let n = self.examples.len() as f64;
        let mut grad_w: Vec<f64> = weights.iter().map(|w| self.regularization * w).collect();
        let mut grad_b = 0.0;
        for (x, y) in self.examples {
            let residual = (sigmoid(margin(weights, bias, x)) - f64::from(*y)) / n;
            for (i, v) in x.iter() {
                grad_w[i] += residual * v;
            }
            grad_b += residual;
        }
        (grad_w, grad_b)
    }
}

impl SentimentClassifier {
    /// Gradient descent with a backtracking line search.
    pub fn train(
        examples: &[(SparseVector, u8)],
        params: &ClassifierParams,
    ) -> Result<Self, TrainingFailure> {
        let Some((first, _)) = examples.first() else {
            return Err(TrainingFailure::EmptyCorpus);
        };
        let dim = first.dim();
        if let Some((x, _)) = examples.iter().find(|(x, _)| x.dim() != dim) {
            return Err(TrainingFailure::DimensionMismatch {
                expected: dim,
                found: x.dim(),
            });
        }
        if params.regularization.is_nan() || params.regularization < 0.0 {
            return Err(TrainingFailure::InvalidParameter(format!(
                "regularization must be non-negative, got {}",
                params.regularization
            )));
        }

        let objective = Objective {
            examples,
            regularization: params.regularization,
        };

        let mut weights = vec![0.0; dim];
        let mut bias = 0.0;
        let mut loss = objective.loss(&weights, bias);
        let mut step = 1.0;
        let mut converged = false;

        for iteration in 0..params.max_iterations {
            let (grad_w, grad_b) = objective.gradient(&weights, bias);
            let grad_sq = grad_w.iter().map(|g| g * g).sum::<f64>() + grad_b * grad_b;
            if !grad_sq.is_finite() {
                return Err(TrainingFailure::NonFinite(format!(
                    "gradient at iteration {iteration}"
                )));
            }
            if grad_sq.sqrt() < params.tolerance {
                converged = true;
                break;
            }

            // Armijo backtracking; allow the step to grow back after an easy iteration.
            step *= 2.0;
            let (candidate_w, candidate_b, candidate_loss) = loop {
                let w: Vec<f64> = weights.iter().zip(&grad_w).map(|(w, g)| w - step * g).collect();
                let b = bias - step * grad_b;
                let l = objective.loss(&w, b);
                if l <= loss - 0.5 * step * grad_sq || step < 1e-12 {
                    break (w, b, l);
                }
                step *= 0.5;
            };

            if !candidate_loss.is_finite() {
                return Err(TrainingFailure::NonFinite(format!(
                    "loss at iteration {iteration}"
                )));
            }

            let improvement = loss - candidate_loss;
            weights = candidate_w;
            bias = candidate_b;
            loss = candidate_loss;
            debug!(iteration, loss, step, "classifier iteration");

            if improvement.abs() < params.tolerance * loss.abs().max(1.0) {
                converged = true;
                break;
            }
        }

        if converged {
            info!(loss, "sentiment classifier converged");
        } else {
            warn!(
                loss,
                max_iterations = params.max_iterations,
                "sentiment classifier hit the iteration cap"
            );
        }

        Ok(Self { weights, bias })
    }

    pub fn predict(&self, vector: &SparseVector) -> Prediction {
        let probability = sigmoid(margin(&self.weights, self.bias, vector));
        let sentiment = if probability >= 0.5 {
            Sentiment::Positive
        } else {
            Sentiment::Negative
        };
        Prediction {
            sentiment,
            probability,
            confidence: probability.max(1.0 - probability),
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn dimension(&self) -> usize {
        self.weights.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::CsVec;

    fn vector(dim: usize, entries: &[(usize, f64)]) -> SparseVector {
        let (indices, data): (Vec<usize>, Vec<f64>) = entries.iter().copied().unzip();
        CsVec::new(dim, indices, data)
    }

    fn separable() -> Vec<(SparseVector, u8)> {
        vec![
            (vector(3, &[(0, 1.0)]), 1),
            (vector(3, &[(0, 2.0), (2, 0.5)]), 1),
            (vector(3, &[(1, 1.0)]), 0),
            (vector(3, &[(1, 1.5), (2, 0.5)]), 0),
        ]
    }

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0 && sigmoid(800.0) > 0.999);
        assert!(sigmoid(-800.0) >= 0.0 && sigmoid(-800.0) < 1e-300);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn learns_separable_data() {
        let classifier = SentimentClassifier::train(&separable(), &ClassifierParams::default()).unwrap();
        assert!(classifier.weights()[0] > 0.0);
        assert!(classifier.weights()[1] < 0.0);
        for (x, y) in separable() {
            assert_eq!(classifier.predict(&x).sentiment.label(), y);
        }
    }

    #[test]
    fn zero_vector_prediction_depends_only_on_bias() {
        let classifier = SentimentClassifier::train(&separable(), &ClassifierParams::default()).unwrap();
        let prediction = classifier.predict(&vector(3, &[]));
        let p = sigmoid(classifier.bias());
        assert_eq!(prediction.probability, p);
        assert_eq!(prediction.confidence, p.max(1.0 - p));
    }

    #[test]
    fn confidence_stays_in_range() {
        let classifier = SentimentClassifier {
            weights: vec![900.0, -900.0, 1e-9],
            bias: 0.0,
        };
        for x in [
            vector(3, &[(0, 10.0)]),
            vector(3, &[(1, 10.0)]),
            vector(3, &[(2, 1.0)]),
            vector(3, &[]),
        ] {
            let confidence = classifier.predict(&x).confidence;
            assert!((0.5..=1.0).contains(&confidence), "{confidence}");
        }
    }

    #[test]
    fn exact_half_is_positive() {
        let classifier = SentimentClassifier {
            weights: vec![0.0],
            bias: 0.0,
        };
        let prediction = classifier.predict(&vector(1, &[]));
        assert_eq!(prediction.sentiment, Sentiment::Positive);
        assert_eq!(prediction.confidence, 0.5);
    }

    #[test]
    fn rejects_empty_training_set() {
        let err = SentimentClassifier::train(&[], &ClassifierParams::default()).unwrap_err();
        assert_eq!(err, TrainingFailure::EmptyCorpus);
    }

    #[test]
    fn rejects_mixed_dimensions() {
        let examples = vec![(vector(3, &[(0, 1.0)]), 1), (vector(4, &[(0, 1.0)]), 0)];
        let err = SentimentClassifier::train(&examples, &ClassifierParams::default()).unwrap_err();
        assert_eq!(err, TrainingFailure::DimensionMismatch { expected: 3, found: 4 });
    }

    #[test]
    fn iteration_cap_is_not_a_failure() {
        let params = ClassifierParams {
            max_iterations: 1,
            ..ClassifierParams::default()
        };
        assert!(SentimentClassifier::train(&separable(), &params).is_ok());
    }
}
