//! Review records and their fixed-point ratings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use sqlx::FromRow;
use std::fmt;

const RATING_MAX_TENTHS: i64 = 99;

/// A rating with exactly one decimal place, stored as tenths (0.0–9.9).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, sqlx::Type)]
#[sqlx(transparent)]
pub struct Rating(i64);

impl Rating {
    pub fn from_tenths(tenths: i64) -> Option<Self> {
        (0..=RATING_MAX_TENTHS).contains(&tenths).then_some(Self(tenths))
    }

    /// Convert a decimal number, rejecting values with more than one decimal place.
    pub fn from_decimal(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = value * 10.0;
        let tenths = scaled.round();
        if (scaled - tenths).abs() > 1e-6 {
            return None;
        }
        Self::from_tenths(tenths as i64)
    }

    pub fn tenths(self) -> i64 {
        self.0
    }

    pub fn as_decimal(self) -> f64 {
        self.0 as f64 / 10.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_decimal())
    }
}

impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Rating::from_decimal(value).ok_or_else(|| {
            de::Error::custom(format!(
                "rating {} must be between 0.0 and 9.9 with at most one decimal place",
                value
            ))
        })
    }
}

/// A persisted review.
///
/// `photo_base_url` always holds the credential-free base URL of the photo.
/// Responses replace it with a presentable URL just before serialization.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: i64,
    pub name: String,
    pub rating: Rating,
    pub comment: Option<String>,
    pub visited_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub quality: Option<Rating>,
    pub scenery: Option<Rating>,
    pub cleanliness: Option<Rating>,
    pub service: Option<Rating>,
    pub meal: Option<Rating>,
    pub photo_base_url: Option<String>,
}

/// Body accepted by create and update.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    pub name: String,
    pub rating: Rating,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub visited_date: Option<NaiveDate>,
    #[serde(default)]
    pub quality: Option<Rating>,
    #[serde(default)]
    pub scenery: Option<Rating>,
    #[serde(default)]
    pub cleanliness: Option<Rating>,
    #[serde(default)]
    pub service: Option<Rating>,
    #[serde(default)]
    pub meal: Option<Rating>,
    #[serde(default, alias = "imageUrl")]
    pub photo_base_url: Option<String>,
}

impl ReviewInput {
    /// The photo URL in its persistable form: query and fragment removed,
    /// blank values treated as absent.
    pub fn persistable_photo_url(&self) -> Option<String> {
        self.photo_base_url
            .as_deref()
            .map(strip_credential)
            .filter(|url| !url.trim().is_empty())
            .map(str::to_string)
    }
}

/// Cut everything from the first `?` or `#`, leaving the base URL.
pub fn strip_credential(url: &str) -> &str {
    match url.find(['?', '#']) {
        Some(pos) => &url[..pos],
        None => url,
    }
}
