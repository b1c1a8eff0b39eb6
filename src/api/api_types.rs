//! Serde-deserializable types matching the restaurant API responses.
//!
//! These types are separate from domain types so that loosely typed server
//! fields (booleans and numbers that sometimes arrive as strings) are
//! converted in exactly one place.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use super::types::{LatLng, NewReview, Restaurant, Review};

// ============================================================================
// Loosely typed scalars
// ============================================================================

/// A boolean the server may send as `true` or as `"true"`.
///
/// After a `PUT /restaurants/{id}?is_favorite=...` the server echoes the
/// query string value back, so the string form shows up in practice.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiFlag {
  Bool(bool),
  Text(String),
}

impl ApiFlag {
  pub fn into_bool(self) -> bool {
    match self {
      ApiFlag::Bool(b) => b,
      ApiFlag::Text(s) => s.trim().eq_ignore_ascii_case("true"),
    }
  }
}

/// A number the server may send as a JSON number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiNumber {
  Int(i64),
  Float(f64),
  Text(String),
}

impl ApiNumber {
  pub fn as_i64(&self) -> Option<i64> {
    match self {
      ApiNumber::Int(n) => Some(*n),
      ApiNumber::Float(f) if f.is_finite() => Some(f.round() as i64),
      ApiNumber::Float(_) => None,
      ApiNumber::Text(s) => s.trim().parse().ok(),
    }
  }

  /// Interpret as epoch milliseconds; strings may also be RFC 3339 dates.
  pub fn as_millis(&self) -> Option<i64> {
    match self {
      ApiNumber::Text(s) => s.trim().parse::<i64>().ok().or_else(|| {
        chrono::DateTime::parse_from_rfc3339(s.trim())
          .ok()
          .map(|dt| dt.timestamp_millis())
      }),
      other => other.as_i64(),
    }
  }
}

// ============================================================================
// Restaurants
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiLatLng {
  pub lat: f64,
  pub lng: f64,
}

#[derive(Debug, Deserialize)]
pub struct ApiRestaurant {
  pub id: ApiNumber,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub neighborhood: String,
  #[serde(default)]
  pub cuisine_type: String,
  #[serde(default)]
  pub address: String,
  pub latlng: Option<ApiLatLng>,
  pub photograph: Option<ApiNumber>,
  #[serde(default)]
  pub operating_hours: BTreeMap<String, String>,
  pub is_favorite: Option<ApiFlag>,
}

impl ApiRestaurant {
  /// Convert to the domain type. Returns None when the id is unusable.
  pub fn into_restaurant(self) -> Option<Restaurant> {
    let id = self.id.as_i64()?;
    let photograph = self.photograph.map(|p| match p {
      ApiNumber::Text(s) => s,
      ApiNumber::Int(n) => n.to_string(),
      ApiNumber::Float(f) => f.to_string(),
    });

    Some(Restaurant {
      id,
      name: self.name,
      neighborhood: self.neighborhood,
      cuisine_type: self.cuisine_type,
      address: self.address,
      latlng: self
        .latlng
        .map(|l| LatLng {
          lat: l.lat,
          lng: l.lng,
        })
        .unwrap_or_default(),
      photograph,
      operating_hours: self.operating_hours,
      is_favorite: self.is_favorite.map(ApiFlag::into_bool).unwrap_or(false),
    })
  }
}

/// Decode a single restaurant body.
pub fn decode_restaurant(value: Value) -> serde_json::Result<Option<Restaurant>> {
  let api: ApiRestaurant = serde_json::from_value(value)?;
  Ok(api.into_restaurant())
}

/// Decode a restaurant list, dropping entries that cannot be stored.
pub fn decode_restaurants(value: Value) -> serde_json::Result<Vec<Restaurant>> {
  let items: Vec<Value> = serde_json::from_value(value)?;
  Ok(
    items
      .into_iter()
      .filter_map(|item| match decode_restaurant(item) {
        Ok(Some(r)) => Some(r),
        Ok(None) => {
          warn!("Skipping restaurant without a usable id");
          None
        }
        Err(e) => {
          warn!("Skipping malformed restaurant: {}", e);
          None
        }
      })
      .collect(),
  )
}

// ============================================================================
// Reviews
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiReview {
  pub id: ApiNumber,
  pub restaurant_id: ApiNumber,
  #[serde(default)]
  pub name: String,
  pub rating: Option<ApiNumber>,
  #[serde(default)]
  pub comments: String,
  #[serde(rename = "createdAt")]
  pub created_at: Option<ApiNumber>,
  #[serde(rename = "updatedAt")]
  pub updated_at: Option<ApiNumber>,
}

impl ApiReview {
  pub fn into_review(self) -> Option<Review> {
    let id = self.id.as_i64()?;
    let restaurant_id = self.restaurant_id.as_i64()?;
    let rating = self
      .rating
      .and_then(|r| r.as_i64())
      .map(|r| r.clamp(1, 5) as u8)
      .unwrap_or(1);
    let created_at = self.created_at.and_then(|t| t.as_millis()).unwrap_or(0);
    let updated_at = self
      .updated_at
      .and_then(|t| t.as_millis())
      .unwrap_or(created_at);

    Some(Review {
      id,
      restaurant_id,
      name: self.name,
      rating,
      comments: self.comments,
      created_at,
      updated_at,
    })
  }
}

pub fn decode_review(value: Value) -> serde_json::Result<Option<Review>> {
  let api: ApiReview = serde_json::from_value(value)?;
  Ok(api.into_review())
}

pub fn decode_reviews(value: Value) -> serde_json::Result<Vec<Review>> {
  let items: Vec<Value> = serde_json::from_value(value)?;
  Ok(
    items
      .into_iter()
      .filter_map(|item| decode_review(item).ok().flatten())
      .collect(),
  )
}

/// Body of `POST /reviews`. Never carries an id.
#[derive(Debug, Serialize)]
pub struct ApiNewReview<'a> {
  pub restaurant_id: i64,
  pub name: &'a str,
  pub rating: u8,
  pub comments: &'a str,
  #[serde(rename = "createdAt")]
  pub created_at: i64,
  #[serde(rename = "updatedAt")]
  pub updated_at: i64,
}

impl<'a> From<&'a NewReview> for ApiNewReview<'a> {
  fn from(review: &'a NewReview) -> Self {
    Self {
      restaurant_id: review.restaurant_id,
      name: &review.name,
      rating: review.rating,
      comments: &review.comments,
      created_at: review.created_at,
      updated_at: review.updated_at,
    }
  }
}
