//! In-process stand-in for the restaurant API, used by tests.
//!
//! Restaurants are held as raw JSON so responses go through the same
//! decoding as real ones, including the string `is_favorite` quirk.

use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};

use super::api_types::{decode_restaurant, decode_restaurants};
use super::client::RemoteApi;
use super::types::{NewReview, Restaurant, Review};

#[derive(Default)]
struct FakeState {
  offline: bool,
  restaurants: Vec<Value>,
  reviews: Vec<Review>,
  next_review_id: i64,
  created: Vec<NewReview>,
}

#[derive(Clone, Default)]
pub struct FakeApi {
  state: Arc<Mutex<FakeState>>,
}

impl FakeApi {
  pub fn new(restaurants: Value) -> Self {
    let api = Self::default();
    {
      let mut state = api.lock();
      state.restaurants = serde_json::from_value(restaurants).unwrap();
      state.next_review_id = 100;
    }
    api
  }

  pub fn set_online(&self, online: bool) {
    self.lock().offline = !online;
  }

  pub fn add_review(&self, review: Review) {
    self.lock().reviews.push(review);
  }

  /// Reviews the server accepted through `create_review`
  pub fn created(&self) -> Vec<NewReview> {
    self.lock().created.clone()
  }

  fn lock(&self) -> MutexGuard<'_, FakeState> {
    self.state.lock().unwrap()
  }

  fn online(&self) -> Result<MutexGuard<'_, FakeState>> {
    let state = self.lock();
    if state.offline {
      return Err(Error::NetworkUnavailable("fake api is offline".into()));
    }
    Ok(state)
  }

  fn find(state: &FakeState, id: i64) -> Result<Value> {
    state
      .restaurants
      .iter()
      .find(|r| r["id"] == json!(id))
      .cloned()
      .ok_or_else(|| Error::Http {
        status: 404,
        url: format!("/restaurants/{}", id),
      })
  }

  fn restaurants_now(&self) -> Result<Vec<Restaurant>> {
    let body = Value::Array(self.online()?.restaurants.clone());
    decode_restaurants(body).map_err(|e| Error::Decode(e.to_string()))
  }

  fn restaurant_now(&self, id: i64) -> Result<Restaurant> {
    let state = self.online()?;
    let body = Self::find(&state, id)?;
    decode_restaurant(body)
      .map_err(|e| Error::Decode(e.to_string()))?
      .ok_or_else(|| Error::Decode("no id".into()))
  }

  fn reviews_now(&self, restaurant_id: i64) -> Result<Vec<Review>> {
    let state = self.online()?;
    Ok(
      state
        .reviews
        .iter()
        .filter(|r| r.restaurant_id == restaurant_id)
        .cloned()
        .collect(),
    )
  }

  fn create_now(&self, review: &NewReview) -> Result<Review> {
    let mut state = self.online()?;
    let id = state.next_review_id;
    state.next_review_id += 1;
    state.created.push(review.clone());
    let created = review.with_id(id);
    state.reviews.push(created.clone());
    Ok(created)
  }

  fn favorite_now(&self, id: i64, favorite: bool) -> Result<Restaurant> {
    let mut state = self.online()?;
    let entry = state
      .restaurants
      .iter_mut()
      .find(|r| r["id"] == json!(id))
      .ok_or_else(|| Error::Http {
        status: 404,
        url: format!("/restaurants/{}", id),
      })?;
    // The server echoes the query string value back as text
    entry["is_favorite"] = json!(favorite.to_string());
    let body = entry.clone();
    decode_restaurant(body)
      .map_err(|e| Error::Decode(e.to_string()))?
      .ok_or_else(|| Error::Decode("no id".into()))
  }
}

impl RemoteApi for FakeApi {
  async fn restaurants(&self) -> Result<Vec<Restaurant>> {
    self.restaurants_now()
  }

  async fn restaurant(&self, id: i64) -> Result<Restaurant> {
    self.restaurant_now(id)
  }

  async fn reviews_for(&self, restaurant_id: i64) -> Result<Vec<Review>> {
    self.reviews_now(restaurant_id)
  }

  async fn create_review(&self, review: &NewReview) -> Result<Review> {
    self.create_now(review)
  }

  async fn set_favorite(&self, id: i64, favorite: bool) -> Result<Restaurant> {
    self.favorite_now(id, favorite)
  }
}

/// A small restaurant list in the server's raw shape.
pub fn sample_restaurants() -> Value {
  json!([
    {
      "id": 1,
      "name": "Mission Chinese Food",
      "neighborhood": "Manhattan",
      "cuisine_type": "Asian",
      "address": "171 E Broadway, New York, NY 10002",
      "photograph": "1",
      "latlng": { "lat": 40.713829, "lng": -73.989667 },
      "operating_hours": { "Monday": "5:30 pm - 11:00 pm" },
      "is_favorite": "true"
    },
    {
      "id": 2,
      "name": "Emily",
      "neighborhood": "Brooklyn",
      "cuisine_type": "Pizza",
      "address": "919 Fulton St, Brooklyn, NY 11238",
      "photograph": "2",
      "latlng": { "lat": 40.683555, "lng": -73.966393 },
      "is_favorite": false
    },
    {
      "id": 3,
      "name": "Kang Ho Dong Baekjeong",
      "neighborhood": "Manhattan",
      "cuisine_type": "Asian",
      "address": "1 E 32nd St, New York, NY 10016",
      "latlng": { "lat": 40.747143, "lng": -73.985414 },
      "is_favorite": "false"
    },
    {
      "id": 4,
      "name": "Roberta's Pizza",
      "neighborhood": "Brooklyn",
      "cuisine_type": "Italian",
      "address": "261 Moore St, Brooklyn, NY 11206",
      "photograph": "4",
      "latlng": { "lat": 40.705089, "lng": -73.933585 }
    }
  ])
}
