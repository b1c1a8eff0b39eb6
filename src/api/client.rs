use reqwest::Url;
use serde_json::Value;
use std::future::Future;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};

use super::api_types::{
  decode_restaurant, decode_restaurants, decode_review, decode_reviews, ApiNewReview,
};
use super::types::{NewReview, Restaurant, Review};

/// The remote restaurant API.
///
/// Implementations return normalized domain types; transport failures come
/// back as `Error::NetworkUnavailable`, bad statuses as `Error::Http`.
pub trait RemoteApi: Clone + Send + Sync + 'static {
  /// `GET /restaurants`
  fn restaurants(&self) -> impl Future<Output = Result<Vec<Restaurant>>> + Send;

  /// `GET /restaurants/{id}`
  fn restaurant(&self, id: i64) -> impl Future<Output = Result<Restaurant>> + Send;

  /// `GET /reviews?restaurant_id={id}`
  fn reviews_for(&self, restaurant_id: i64) -> impl Future<Output = Result<Vec<Review>>> + Send;

  /// `POST /reviews`
  fn create_review(&self, review: &NewReview) -> impl Future<Output = Result<Review>> + Send;

  /// `PUT /restaurants/{id}?is_favorite={bool}`
  fn set_favorite(&self, id: i64, favorite: bool)
    -> impl Future<Output = Result<Restaurant>> + Send;
}

/// Restaurant API client over HTTP
#[derive(Clone)]
pub struct HttpApi {
  client: reqwest::Client,
  base_url: String,
}

impl HttpApi {
  pub fn new(config: &Config) -> Result<Self> {
    let base_url = config.api_url.trim_end_matches('/').to_string();
    // Fail early on a malformed base url
    Url::parse(&base_url)
      .map_err(|e| Error::InvalidInput(format!("invalid api_url {}: {}", base_url, e)))?;

    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| Error::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Self { client, base_url })
  }

  fn url(&self, path: &str) -> Result<Url> {
    Url::parse(&format!("{}{}", self.base_url, path))
      .map_err(|e| Error::InvalidInput(format!("invalid endpoint {}: {}", path, e)))
  }

  async fn get_json(&self, url: Url) -> Result<Value> {
    debug!("GET {}", url);
    let response = self.client.get(url).send().await?.error_for_status()?;
    Ok(response.json().await?)
  }
}

fn decode_err(e: serde_json::Error) -> Error {
  Error::Decode(e.to_string())
}

impl RemoteApi for HttpApi {
  async fn restaurants(&self) -> Result<Vec<Restaurant>> {
    let body = self.get_json(self.url("/restaurants")?).await?;
    decode_restaurants(body).map_err(decode_err)
  }

  async fn restaurant(&self, id: i64) -> Result<Restaurant> {
    let body = self.get_json(self.url(&format!("/restaurants/{}", id))?).await?;
    decode_restaurant(body)
      .map_err(decode_err)?
      .ok_or_else(|| Error::Decode(format!("restaurant {} came back without an id", id)))
  }

  async fn reviews_for(&self, restaurant_id: i64) -> Result<Vec<Review>> {
    let mut url = self.url("/reviews")?;
    url
      .query_pairs_mut()
      .append_pair("restaurant_id", &restaurant_id.to_string());
    let body = self.get_json(url).await?;
    decode_reviews(body).map_err(decode_err)
  }

  async fn create_review(&self, review: &NewReview) -> Result<Review> {
    let url = self.url("/reviews")?;
    debug!("POST {}", url);
    let body: Value = self
      .client
      .post(url)
      .json(&ApiNewReview::from(review))
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    decode_review(body)
      .map_err(decode_err)?
      .ok_or_else(|| Error::Decode("created review came back without an id".into()))
  }

  async fn set_favorite(&self, id: i64, favorite: bool) -> Result<Restaurant> {
    let mut url = self.url(&format!("/restaurants/{}", id))?;
    url
      .query_pairs_mut()
      .append_pair("is_favorite", if favorite { "true" } else { "false" });
    debug!("PUT {}", url);
    let body: Value = self
      .client
      .put(url)
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    decode_restaurant(body)
      .map_err(decode_err)?
      .ok_or_else(|| Error::Decode(format!("restaurant {} came back without an id", id)))
  }
}
