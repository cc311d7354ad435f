use std::collections::{BTreeMap, BTreeSet};

use nalgebra_sparse::{CooMatrix, CscMatrix, CsrMatrix};
use serde::{Deserialize, Serialize};

use crate::corpus::Review;

/// Which column of a review feeds the recommender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingSignal {
    /// Sentiment label (0/1) doubles as the rating.
    #[default]
    Label,
    /// Every observed interaction counts as 1.0.
    Implicit,
    /// Star rating; reviews without one are skipped.
    Explicit,
}

impl RatingSignal {
    pub fn rating(self, review: &Review) -> Option<f64> {
        match self {
            RatingSignal::Label => Some(f64::from(review.label)),
            RatingSignal::Implicit => Some(1.0),
            RatingSignal::Explicit => review.rating,
        }
    }
}

/// Observed user × provider ratings, with duplicates averaged.
/// Rows and columns are the sorted distinct ids that carry at least one rating.
#[derive(Debug, Clone)]
pub struct RatingMatrix {
    users: Vec<i64>,
    providers: Vec<i64>,
    by_user: CsrMatrix<f64>,
    by_provider: CscMatrix<f64>,
}

impl RatingMatrix {
    pub fn from_reviews(reviews: &[Review], signal: RatingSignal) -> Self {
        Self::from_ratings(
            reviews
                .iter()
                .filter_map(|r| signal.rating(r).map(|rating| (r.user_id, r.provider_id, rating))),
        )
    }

    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = (i64, i64, f64)>,
    {
        let mut cells: BTreeMap<(i64, i64), (f64, usize)> = BTreeMap::new();
        for (user, provider, rating) in ratings {
            let cell = cells.entry((user, provider)).or_insert((0.0, 0));
            cell.0 += rating;
            cell.1 += 1;
        }

        let users: Vec<i64> = cells.keys().map(|&(u, _)| u).collect::<BTreeSet<_>>().into_iter().collect();
        let providers: Vec<i64> = cells.keys().map(|&(_, p)| p).collect::<BTreeSet<_>>().into_iter().collect();

        let mut coo = CooMatrix::new(users.len(), providers.len());
        for (&(user, provider), &(sum, count)) in &cells {
            let row = index_of(&users, user);
            let col = index_of(&providers, provider);
            coo.push(row, col, sum / count as f64);
        }

        Self {
            by_user: CsrMatrix::from(&coo),
            by_provider: CscMatrix::from(&coo),
            users,
            providers,
        }
    }

    pub fn users(&self) -> &[i64] {
        &self.users
    }

    pub fn providers(&self) -> &[i64] {
        &self.providers
    }

    pub fn nnz(&self) -> usize {
        self.by_user.nnz()
    }

    pub fn is_empty(&self) -> bool {
        self.nnz() == 0
    }

    /// Provider column indices and ratings observed for user row `row`.
    pub fn user_ratings(&self, row: usize) -> (&[usize], &[f64]) {
        let start = self.by_user.row_offsets()[row];
        let end = self.by_user.row_offsets()[row + 1];
        (&self.by_user.col_indices()[start..end], &self.by_user.values()[start..end])
    }

    /// User row indices and ratings observed for provider column `col`.
    pub fn provider_ratings(&self, col: usize) -> (&[usize], &[f64]) {
        let start = self.by_provider.col_offsets()[col];
        let end = self.by_provider.col_offsets()[col + 1];
        (&self.by_provider.row_indices()[start..end], &self.by_provider.values()[start..end])
    }

    pub fn get(&self, user: i64, provider: i64) -> Option<f64> {
        let row = self.users.binary_search(&user).ok()?;
        let col = self.providers.binary_search(&provider).ok()?;
        let (cols, values) = self.user_ratings(row);
        cols.binary_search(&col).ok().map(|i| values[i])
    }

    /// `(user row, provider col, rating)` for every observed cell.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.by_user.triplet_iter().map(|(i, j, v)| (i, j, *v))
    }
}

fn index_of(ids: &[i64], id: i64) -> usize {
    ids.binary_search(&id).unwrap_or_else(|insert_at| insert_at)
}
