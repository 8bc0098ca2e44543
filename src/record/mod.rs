//! Records - the movie entity as materialized from stored documents.
//!
//! Documents are persisted with camelCase field names; the owner identity is
//! stored under `userId`. A [`Movie`] is always read back from the store, so
//! it always carries the id the store assigned.

mod input;
mod normalize;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::store::{Document, StoreError};

pub use input::{MovieDraft, MoviePatch, NumberInput};
pub use normalize::{
    normalize_text, normalize_title, parse_number, parse_rating, parse_year, RATING_MAX,
    RATING_MIN,
};

/// Persisted field names.
pub mod field {
    pub const OWNER: &str = "userId";
    pub const TITLE: &str = "title";
    pub const YEAR: &str = "year";
    pub const GENRE: &str = "genre";
    pub const POSTER_URL: &str = "posterUrl";
    pub const DESCRIPTION: &str = "description";
    pub const RATING: &str = "rating";
    pub const WATCHED: &str = "watched";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";

    /// Fields only the store (or the creating call) may set.
    pub const SERVER_OWNED: [&str; 5] = ["id", OWNER, "ownerId", CREATED_AT, UPDATED_AT];
}

/// A user-owned movie entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub title: String,
    #[serde(
        default,
        deserialize_with = "stored_year",
        skip_serializing_if = "Option::is_none"
    )]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "stored_rating",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating: Option<f64>,
    #[serde(default)]
    pub watched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

// Other clients may write numbers as floats or strings. An unusable value
// reads as absent instead of hiding the whole record.
fn stored_year<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    let input = Option::<NumberInput>::deserialize(deserializer)?;
    Ok(input.as_ref().and_then(parse_year))
}

fn stored_rating<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let input = Option::<NumberInput>::deserialize(deserializer)?;
    Ok(input.as_ref().and_then(parse_rating))
}

impl Movie {
    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let mut movie: Movie = serde_json::from_value(Value::Object(doc.data.clone()))
            .map_err(|e| StoreError::Serde(format!("{}: {}", doc.id, e)))?;
        movie.id = doc.id.clone();
        Ok(movie)
    }

    /// Creation time used for ordering; missing timestamps count as the epoch.
    pub fn created_key(&self) -> DateTime<Utc> {
        // DateTime<Utc>::default() is the Unix epoch.
        self.created_at.unwrap_or_default()
    }
}

/// Newest first by `created_at`, ties broken by id.
pub fn sort_newest_first(movies: &mut [Movie]) {
    movies.sort_by(|a, b| {
        b.created_key()
            .cmp(&a.created_key())
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Turn a query snapshot into an ordered movie list.
///
/// Documents that do not deserialize as a movie are skipped.
pub fn materialize(docs: &[Document]) -> Vec<Movie> {
    let mut movies: Vec<Movie> = docs
        .iter()
        .filter_map(|doc| match Movie::from_document(doc) {
            Ok(movie) => Some(movie),
            Err(err) => {
                warn!(id = %doc.id, error = %err, "skipping malformed movie document");
                None
            }
        })
        .collect();
    sort_newest_first(&mut movies);
    movies
}
