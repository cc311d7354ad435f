use std::cmp::Ordering;

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{ColdStartError, TrainingFailure};
use crate::matrix::RatingMatrix;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlsParams {
    /// Latent dimension `k`.
    pub rank: usize,
    /// λ, scaled by each row's observation count.
    pub regularization: f64,
    pub iterations: usize,
    pub seed: u64,
}

impl Default for AlsParams {
    fn default() -> Self {
        Self {
            rank: 10,
            regularization: 0.1,
            iterations: 10,
            seed: 42,
        }
    }
}

/// Latent-factor model fitted with alternating least squares.
///
/// Only ids that carried at least one rating have a factor row; everything
/// else is a cold start.
#[derive(Debug, Clone)]
pub struct Recommender {
    users: Vec<i64>,
    providers: Vec<i64>,
    user_factors: DMatrix<f64>,
    provider_factors: DMatrix<f64>,
}

impl Recommender {
    pub fn train(ratings: &RatingMatrix, params: &AlsParams) -> Result<Self, TrainingFailure> {
        if ratings.is_empty() {
            return Err(TrainingFailure::EmptyRatings);
        }
        if params.rank == 0 {
            return Err(TrainingFailure::InvalidParameter("rank must be positive".into()));
        }
        if params.regularization.is_nan() || params.regularization < 0.0 {
            return Err(TrainingFailure::InvalidParameter(format!(
                "regularization must be non-negative, got {}",
                params.regularization
            )));
        }

        let n_users = ratings.users().len();
        let n_providers = ratings.providers().len();
        let k = params.rank;

        let mut rng = StdRng::seed_from_u64(params.seed);
        let scale = 1.0 / (k as f64).sqrt();
        let mut user_factors = DMatrix::from_fn(n_users, k, |_, _| rng.random_range(0.0..scale));
        let mut provider_factors = DMatrix::from_fn(n_providers, k, |_, _| rng.random_range(0.0..scale));

        info!(
            users = n_users,
            providers = n_providers,
            ratings = ratings.nnz(),
            rank = k,
            iterations = params.iterations,
            "training ALS recommender"
        );

        for iteration in 0..params.iterations {
            // U depends on the previous V and V on the fresh U, so the phases never overlap.
            user_factors = solve_rows(
                n_users,
                move |row| ratings.user_ratings(row),
                &provider_factors,
                params.regularization,
                "user",
            )?;
            provider_factors = solve_rows(
                n_providers,
                move |col| ratings.provider_ratings(col),
                &user_factors,
                params.regularization,
                "provider",
            )?;

            let training_rmse = rmse(ratings, &user_factors, &provider_factors);
            if !training_rmse.is_finite() {
                return Err(TrainingFailure::NonFinite(format!(
                    "factor matrices after iteration {iteration}"
                )));
            }
            debug!(iteration, rmse = training_rmse, "ALS iteration");
        }

        let model = Self {
            users: ratings.users().to_vec(),
            providers: ratings.providers().to_vec(),
            user_factors,
            provider_factors,
        };
        info!(rmse = model.rmse(ratings), "ALS recommender trained");
        Ok(model)
    }

    pub fn score(&self, user_id: i64, provider_id: i64) -> Result<f64, ColdStartError> {
        let user = self.user_row(user_id).ok_or(ColdStartError::User(user_id))?;
        let provider = self
            .provider_row(provider_id)
            .ok_or(ColdStartError::Provider(provider_id))?;
        Ok(self.user_factors.row(user).dot(&self.provider_factors.row(provider)))
    }

    /// Top `n` providers for `user_id`, best first; equal scores go to the lower provider id.
    pub fn recommend(&self, user_id: i64, n: usize) -> Result<Vec<(i64, f64)>, ColdStartError> {
        let user = self.user_row(user_id).ok_or(ColdStartError::User(user_id))?;
        let scores = &self.provider_factors * self.user_factors.row(user).transpose();

        let mut ranked: Vec<(i64, f64)> = self.providers.iter().copied().zip(scores.iter().copied()).collect();
        ranked.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        ranked.truncate(n);
        Ok(ranked)
    }

    /// Root-mean-square error over the observed cells of `ratings`.
    pub fn rmse(&self, ratings: &RatingMatrix) -> f64 {
        rmse(ratings, &self.user_factors, &self.provider_factors)
    }

    pub fn has_user(&self, user_id: i64) -> bool {
        self.user_row(user_id).is_some()
    }

    pub fn has_provider(&self, provider_id: i64) -> bool {
        self.provider_row(provider_id).is_some()
    }

    pub fn users(&self) -> &[i64] {
        &self.users
    }

    pub fn providers(&self) -> &[i64] {
        &self.providers
    }

    pub fn rank(&self) -> usize {
        self.user_factors.ncols()
    }

    fn user_row(&self, user_id: i64) -> Option<usize> {
        self.users.binary_search(&user_id).ok()
    }

    fn provider_row(&self, provider_id: i64) -> Option<usize> {
        self.providers.binary_search(&provider_id).ok()
    }
}

/// Solves `(Σ v vᵀ + λ·n·I) x = Σ r·v` for every row in parallel.
fn solve_rows<'a, F>(
    n_rows: usize,
    observations: F,
    fixed: &DMatrix<f64>,
    regularization: f64,
    side: &str,
) -> Result<DMatrix<f64>, TrainingFailure>
where
    F: Fn(usize) -> (&'a [usize], &'a [f64]) + Sync,
{
    let k = fixed.ncols();
    let rows: Vec<DVector<f64>> = (0..n_rows)
        .into_par_iter()
        .map(|row| {
            let (indices, values) = observations(row);
            let mut gram = DMatrix::<f64>::zeros(k, k);
            let mut rhs = DVector::<f64>::zeros(k);
            for (&j, &rating) in indices.iter().zip(values) {
                let v: DVector<f64> = fixed.row(j).transpose();
                gram.ger(1.0, &v, &v, 1.0);
                rhs.axpy(rating, &v, 1.0);
            }
            let shrinkage = regularization * indices.len() as f64;
            for d in 0..k {
                gram[(d, d)] += shrinkage;
            }
            gram.cholesky()
                .map(|chol| chol.solve(&rhs))
                .ok_or_else(|| TrainingFailure::Singular(format!("{side} row {row}")))
        })
        .collect::<Result<Vec<_>, TrainingFailure>>()?;

    Ok(DMatrix::from_fn(n_rows, k, |i, d| rows[i][d]))
}

fn rmse(ratings: &RatingMatrix, user_factors: &DMatrix<f64>, provider_factors: &DMatrix<f64>) -> f64 {
    let (sum_sq, count) = ratings
        .triplets()
        .fold((0.0, 0usize), |(sum_sq, count), (i, j, rating)| {
            let err = rating - user_factors.row(i).dot(&provider_factors.row(j));
            (sum_sq + err * err, count + 1)
        });
    if count == 0 {
        0.0
    } else {
        (sum_sq / count as f64).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_review_matrix() -> RatingMatrix {
        RatingMatrix::from_ratings(vec![(1, 10, 1.0), (1, 11, 0.0)])
    }

    #[test]
    fn liked_provider_ranks_above_disliked() {
        let model = Recommender::train(&two_review_matrix(), &AlsParams::default()).unwrap();
        let recs = model.recommend(1, 5).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].0, 10);
        assert_eq!(recs[1].0, 11);
        assert!(recs[0].1 > recs[1].1);
    }

    #[test]
    fn unknown_user_is_cold_start() {
        let model = Recommender::train(&two_review_matrix(), &AlsParams::default()).unwrap();
        assert_eq!(model.recommend(999_999, 5), Err(ColdStartError::User(999_999)));
        assert_eq!(model.score(999_999, 10), Err(ColdStartError::User(999_999)));
        assert_eq!(model.score(1, 12), Err(ColdStartError::Provider(12)));
        assert!(!model.has_user(999_999));
    }

    #[test]
    fn score_matches_recommendation() {
        let model = Recommender::train(&two_review_matrix(), &AlsParams::default()).unwrap();
        let recs = model.recommend(1, 1).unwrap();
        assert_eq!(recs[0].1, model.score(1, recs[0].0).unwrap());
    }

    #[test]
    fn recommend_truncates_and_orders() {
        let ratings = RatingMatrix::from_ratings(vec![
            (1, 1, 1.0),
            (1, 2, 0.5),
            (1, 3, 0.0),
            (2, 4, 1.0),
            (2, 1, 1.0),
            (3, 5, 0.2),
            (3, 2, 1.0),
        ]);
        let model = Recommender::train(&ratings, &AlsParams::default()).unwrap();
        let recs = model.recommend(1, 3).unwrap();
        assert_eq!(recs.len(), 3);
        assert!(recs.windows(2).all(|w| w[0].1 >= w[1].1));
        assert!(model.recommend(1, 0).unwrap().is_empty());
        assert_eq!(model.recommend(1, 100).unwrap().len(), 5);
    }

    #[test]
    fn ties_break_on_lower_provider_id() {
        let model = Recommender {
            users: vec![1],
            providers: vec![3, 7, 9],
            user_factors: DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
            provider_factors: DMatrix::from_row_slice(3, 2, &[0.5, 0.5, 1.0, 0.0, 0.0, 1.0]),
        };
        let recs = model.recommend(1, 3).unwrap();
        assert_eq!(recs, vec![(3, 1.0), (7, 1.0), (9, 1.0)]);
    }

    #[test]
    fn training_is_reproducible_for_a_seed() {
        let ratings = two_review_matrix();
        let a = Recommender::train(&ratings, &AlsParams::default()).unwrap();
        let b = Recommender::train(&ratings, &AlsParams::default()).unwrap();
        assert_eq!(a.recommend(1, 5).unwrap(), b.recommend(1, 5).unwrap());
    }

    #[test]
    fn fits_a_low_rank_matrix() {
        let users = [1.0, 0.5, 2.0, 1.5];
        let providers = [1.0, 2.0, 0.5];
        let mut observations = Vec::new();
        for (u, a) in users.iter().enumerate() {
            for (p, b) in providers.iter().enumerate() {
                if (u + p) % 4 != 3 {
                    observations.push((u as i64, p as i64, a * b));
                }
            }
        }
        let ratings = RatingMatrix::from_ratings(observations);
        let params = AlsParams {
            rank: 2,
            regularization: 0.01,
            iterations: 25,
            seed: 7,
        };
        let model = Recommender::train(&ratings, &params).unwrap();
        assert!(model.rmse(&ratings) < 0.2, "rmse {}", model.rmse(&ratings));
    }

    #[test]
    fn rejects_degenerate_input() {
        let empty = RatingMatrix::from_ratings(Vec::new());
        assert_eq!(
            Recommender::train(&empty, &AlsParams::default()).unwrap_err(),
            TrainingFailure::EmptyRatings
        );

        let params = AlsParams {
            rank: 0,
            ..AlsParams::default()
        };
        assert!(matches!(
            Recommender::train(&two_review_matrix(), &params),
            Err(TrainingFailure::InvalidParameter(_))
        ));
    }
}
