use std::fs;
use std::path::Path;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// One labeled review as delivered by the corpus source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub user_id: i64,
    pub provider_id: i64,
    pub text: String,
    /// 1 = positive, 0 = negative.
    pub label: u8,
    /// Star rating (1-5) when the source record carries one.
    #[serde(default)]
    pub rating: Option<f64>,
}

impl Review {
    pub fn new(user_id: i64, provider_id: i64, text: impl Into<String>, label: u8) -> Self {
        Self {
            user_id,
            provider_id,
            text: text.into(),
            label,
            rating: None,
        }
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }
}

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read corpus: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid JSON on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("row {row}: label must be 0 or 1, got {label}")]
    InvalidLabel { row: usize, label: i64 },

    #[error("unsupported corpus format: {0}")]
    UnsupportedFormat(String),
}

/// Loads a corpus, picking the reader from the file extension.
pub fn load_corpus<P: AsRef<Path>>(path: P) -> Result<Vec<Review>, CorpusError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let reviews = match extension.as_str() {
        "db" | "sqlite" | "sqlite3" => parse_sqlite_reviews(path)?,
        "jsonl" | "json" => parse_json_lines(&fs::read_to_string(path)?)?,
        other => return Err(CorpusError::UnsupportedFormat(other.to_string())),
    };

    info!(path = %path.display(), reviews = reviews.len(), "corpus loaded");
    Ok(reviews)
}

/// Reads the `reviews` table. The `rating` column is optional.
pub fn parse_sqlite_reviews<P: AsRef<Path>>(db_path: P) -> Result<Vec<Review>, CorpusError> {
    let conn = Connection::open(db_path.as_ref())?;

    let has_rating = {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('reviews')")?;
        let columns = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut found = false;
        for column in columns {
            if column? == "rating" {
                found = true;
            }
        }
        found
    };

    let sql = if has_rating {
        "SELECT user_id, provider_id, text, label, rating FROM reviews"
    } else {
        "SELECT user_id, provider_id, text, label, NULL FROM reviews"
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, Option<f64>>(4)?,
        ))
    })?;

    let mut reviews = Vec::new();
    for (idx, row) in rows.enumerate() {
        let (user_id, provider_id, text, label, rating) = row?;
        reviews.push(Review {
            user_id,
            provider_id,
            text,
            label: checked_label(idx + 1, label)?,
            rating,
        });
    }

    Ok(reviews)
}

/// One JSON review per non-blank line.
pub fn parse_json_lines(content: &str) -> Result<Vec<Review>, CorpusError> {
    #[derive(Deserialize)]
    struct RawReview {
        user_id: i64,
        provider_id: i64,
        text: String,
        label: i64,
        #[serde(default)]
        rating: Option<f64>,
    }

    let mut reviews = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let raw: RawReview = serde_json::from_str(line).map_err(|source| CorpusError::Json {
            line: idx + 1,
            source,
        })?;
        reviews.push(Review {
            user_id: raw.user_id,
            provider_id: raw.provider_id,
            text: raw.text,
            label: checked_label(idx + 1, raw.label)?,
            rating: raw.rating,
        });
    }

    Ok(reviews)
}

fn checked_label(row: usize, label: i64) -> Result<u8, CorpusError> {
    match label {
        0 => Ok(0),
        1 => Ok(1),
        _ => Err(CorpusError::InvalidLabel { row, label }),
    }
}
