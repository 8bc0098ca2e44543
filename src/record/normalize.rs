//! Parse-or-absent normalization applied at the mutation boundary.
//!
//! Text is trimmed and blank text becomes absent. Numbers are accepted from
//! either a number or text; anything unparseable, non-finite or out of range
//! becomes absent instead of an error.

use super::NumberInput;
use crate::error::{Result, SyncError};

pub const RATING_MIN: f64 = 0.0;
pub const RATING_MAX: f64 = 10.0;

/// Trimmed title; blank titles are a validation error.
pub fn normalize_title(raw: &str) -> Result<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(SyncError::validation("title is required"));
    }
    Ok(title.to_string())
}

pub fn normalize_text(raw: &str) -> Option<String> {
    let text = raw.trim();
    (!text.is_empty()).then(|| text.to_string())
}

pub fn parse_number(input: &NumberInput) -> Option<f64> {
    let value = match input {
        NumberInput::Number(value) => *value,
        NumberInput::Text(text) => text.trim().parse::<f64>().ok()?,
        NumberInput::Other(_) => return None,
    };
    value.is_finite().then_some(value)
}

/// Whole numbers that fit an `i32`.
pub fn parse_year(input: &NumberInput) -> Option<i32> {
    let value = parse_number(input)?;
    if value.fract() != 0.0 || value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        return None;
    }
    Some(value as i32)
}

/// Ratings within `[RATING_MIN, RATING_MAX]`; out-of-range input is dropped, not clamped.
pub fn parse_rating(input: &NumberInput) -> Option<f64> {
    let value = parse_number(input)?;
    (RATING_MIN..=RATING_MAX).contains(&value).then_some(value)
}
