//! Write inputs as they arrive from the view layer.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use super::field;
use crate::error::{Result, SyncError};
use crate::store::DocumentData;

/// A numeric form field: a number, some text, or anything else a form sent.
///
/// Parsing happens in one place, see [`parse_year`](super::parse_year) and
/// [`parse_rating`](super::parse_rating).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberInput {
    Number(f64),
    Text(String),
    Other(Value),
}

impl From<f64> for NumberInput {
    fn from(value: f64) -> Self {
        NumberInput::Number(value)
    }
}

impl From<i32> for NumberInput {
    fn from(value: i32) -> Self {
        NumberInput::Number(f64::from(value))
    }
}

impl From<&str> for NumberInput {
    fn from(value: &str) -> Self {
        NumberInput::Text(value.to_string())
    }
}

impl From<String> for NumberInput {
    fn from(value: String) -> Self {
        NumberInput::Text(value)
    }
}

fn strip_server_owned(mut fields: DocumentData, input: &'static str) -> DocumentData {
    for key in field::SERVER_OWNED {
        if fields.remove(key).is_some() {
            warn!(field = key, input, "ignoring server-owned field");
        }
    }
    fields
}

/// Maps JSON `null` to `Some(None)` so "cleared" differs from "not present".
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Fields for a new movie.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MovieDraft {
    pub title: String,
    pub year: Option<NumberInput>,
    pub rating: Option<NumberInput>,
    pub genre: Option<String>,
    pub poster_url: Option<String>,
    pub description: Option<String>,
    pub watched: Option<bool>,
}

impl MovieDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Build a draft from a plain field mapping (camelCase keys).
    ///
    /// Server-owned keys (`id`, `userId`, `ownerId`, `createdAt`,
    /// `updatedAt`) are dropped.
    pub fn from_fields(fields: DocumentData) -> Result<Self> {
        serde_json::from_value(Value::Object(strip_server_owned(fields, "draft")))
            .map_err(|e| SyncError::validation(format!("invalid movie fields: {}", e)))
    }

    pub fn year(mut self, year: impl Into<NumberInput>) -> Self {
        self.year = Some(year.into());
        self
    }

    pub fn rating(mut self, rating: impl Into<NumberInput>) -> Self {
        self.rating = Some(rating.into());
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn poster_url(mut self, poster_url: impl Into<String>) -> Self {
        self.poster_url = Some(poster_url.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn watched(mut self, watched: bool) -> Self {
        self.watched = Some(watched);
        self
    }
}

/// A partial update.
///
/// Outer `None`: leave the field alone. `Some(None)`: clear it.
/// `Some(Some(v))`: normalize `v` and write it (clearing the field if it
/// normalizes to nothing).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoviePatch {
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub year: Option<Option<NumberInput>>,
    #[serde(default, deserialize_with = "present")]
    pub rating: Option<Option<NumberInput>>,
    #[serde(default, deserialize_with = "present")]
    pub genre: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub poster_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub watched: Option<bool>,
}

impl MoviePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a patch from a plain field mapping (camelCase keys).
    ///
    /// `id`, the owner and both timestamps are ignored, never merged.
    pub fn from_fields(fields: DocumentData) -> Result<Self> {
        serde_json::from_value(Value::Object(strip_server_owned(fields, "patch")))
            .map_err(|e| SyncError::validation(format!("invalid movie fields: {}", e)))
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(Some(title.into()));
        self
    }

    pub fn year(mut self, year: impl Into<NumberInput>) -> Self {
        self.year = Some(Some(year.into()));
        self
    }

    pub fn clear_year(mut self) -> Self {
        self.year = Some(None);
        self
    }

    pub fn rating(mut self, rating: impl Into<NumberInput>) -> Self {
        self.rating = Some(Some(rating.into()));
        self
    }

    pub fn clear_rating(mut self) -> Self {
        self.rating = Some(None);
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(Some(genre.into()));
        self
    }

    pub fn clear_genre(mut self) -> Self {
        self.genre = Some(None);
        self
    }

    pub fn poster_url(mut self, poster_url: impl Into<String>) -> Self {
        self.poster_url = Some(Some(poster_url.into()));
        self
    }

    pub fn clear_poster_url(mut self) -> Self {
        self.poster_url = Some(None);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(Some(description.into()));
        self
    }

    pub fn clear_description(mut self) -> Self {
        self.description = Some(None);
        self
    }

    pub fn watched(mut self, watched: bool) -> Self {
        self.watched = Some(watched);
        self
    }
}
