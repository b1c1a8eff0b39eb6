//! Network data gateway with transparent offline fallback.
//!
//! Every read goes to the network first. A successful response is handed to a
//! background writer that mirrors it into the local store, so the caller never
//! waits on the store. When the network fails, the same logical records are
//! read from the store instead, and a cold store simply yields no data.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::store::{Index, RecordStore};

use super::client::RemoteApi;
use super::filters::{self, Selector};
use super::types::{NewReview, Restaurant, Review};

/// Where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
  /// Fresh data from network
  Network,
  /// Offline mode - network unavailable, serving stored data
  Store,
}

/// Data returned by the gateway, including where it came from.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
  pub data: T,
  pub source: DataSource,
}

impl<T> Fetched<T> {
  fn network(data: T) -> Self {
    Self {
      data,
      source: DataSource::Network,
    }
  }

  fn store(data: T) -> Self {
    Self {
      data,
      source: DataSource::Store,
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
    Fetched {
      data: f(self.data),
      source: self.source,
    }
  }

  pub fn is_offline(&self) -> bool {
    self.source == DataSource::Store
  }
}

enum WriteJob {
  Restaurants(Vec<Restaurant>),
  Restaurant(Restaurant),
  Reviews(Vec<Review>),
  Flush(oneshot::Sender<()>),
}

/// Applies store writes in order, off the request path.
///
/// Failures are logged and dropped: the primary request already succeeded.
#[derive(Clone)]
struct StoreWriter {
  tx: mpsc::UnboundedSender<WriteJob>,
}

impl StoreWriter {
  fn spawn<S: RecordStore + 'static>(store: Arc<S>) -> Self {
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
      while let Some(job) = rx.recv().await {
        let result = match job {
          WriteJob::Restaurants(list) => store.put_all(&list).map(|_| ()),
          WriteJob::Restaurant(restaurant) => store.put(&restaurant).map(|_| ()),
          WriteJob::Reviews(list) => store.put_all(&list).map(|_| ()),
          WriteJob::Flush(ack) => {
            let _ = ack.send(());
            Ok(())
          }
        };
        if let Err(e) = result {
          warn!("Failed to mirror response into local store: {}", e);
        }
      }
    });

    Self { tx }
  }

  fn send(&self, job: WriteJob) {
    if self.tx.send(job).is_err() {
      warn!("Store writer stopped, dropping write");
    }
  }
}

fn log_fallback(what: &str, e: &Error) {
  if e.is_remote() {
    warn!("Fetching {} failed ({}), reading local store", what, e);
  } else {
    error!("Fetching {} failed unexpectedly ({}), reading local store", what, e);
  }
}

/// Restaurant data access with offline fallback.
pub struct Gateway<A: RemoteApi, S: RecordStore> {
  api: A,
  store: Arc<S>,
  writer: StoreWriter,
}

impl<A: RemoteApi, S: RecordStore + 'static> Gateway<A, S> {
  /// Create a gateway. Must be called inside a tokio runtime.
  pub fn new(api: A, store: Arc<S>) -> Self {
    let writer = StoreWriter::spawn(Arc::clone(&store));
    Self { api, store, writer }
  }

  pub fn store(&self) -> &Arc<S> {
    &self.store
  }

  /// Wait until every store write queued so far has been applied.
  pub async fn flush(&self) {
    let (ack, done) = oneshot::channel();
    self.writer.send(WriteJob::Flush(ack));
    let _ = done.await;
  }

  /// Fetch all restaurants.
  pub async fn fetch_restaurants(&self) -> Fetched<Vec<Restaurant>> {
    match self.api.restaurants().await {
      Ok(list) => {
        debug!("Fetched {} restaurants", list.len());
        self.writer.send(WriteJob::Restaurants(list.clone()));
        Fetched::network(list)
      }
      Err(e) => {
        log_fallback("restaurants", &e);
        Fetched::store(self.store.get_all().unwrap_or_else(|e| {
          warn!("Local store read failed: {}", e);
          Vec::new()
        }))
      }
    }
  }

  /// Fetch a restaurant by its id.
  pub async fn fetch_restaurant_by_id(&self, id: i64) -> Fetched<Option<Restaurant>> {
    match self.api.restaurant(id).await {
      Ok(restaurant) => {
        self.writer.send(WriteJob::Restaurant(restaurant.clone()));
        Fetched::network(Some(restaurant))
      }
      Err(e) => {
        log_fallback(&format!("restaurant {}", id), &e);
        Fetched::store(self.store.get_by_id(id).unwrap_or_else(|e| {
          warn!("Local store read failed: {}", e);
          None
        }))
      }
    }
  }

  /// Fetch the reviews of one restaurant.
  pub async fn fetch_reviews_by_restaurant_id(&self, restaurant_id: i64) -> Fetched<Vec<Review>> {
    match self.api.reviews_for(restaurant_id).await {
      Ok(reviews) => {
        self.writer.send(WriteJob::Reviews(reviews.clone()));
        Fetched::network(reviews)
      }
      Err(e) => {
        log_fallback(&format!("reviews for restaurant {}", restaurant_id), &e);
        Fetched::store(
          self
            .store
            .get_all_by_index(Index::RestaurantId, restaurant_id)
            .unwrap_or_else(|e| {
              warn!("Local store read failed: {}", e);
              Vec::new()
            }),
        )
      }
    }
  }

  /// Create a review on the server.
  ///
  /// Unlike reads, failures are returned: callers decide whether to keep
  /// the write queued.
  pub async fn create_review(&self, review: &NewReview) -> Result<Review> {
    let created = self.api.create_review(review).await?;
    self.writer.send(WriteJob::Reviews(vec![created.clone()]));
    Ok(created)
  }

  /// Set the favorite flag of a restaurant on the server.
  pub async fn update_favorite(&self, id: i64, favorite: bool) -> Result<Restaurant> {
    let updated = self.api.set_favorite(id, favorite).await?;
    self.writer.send(WriteJob::Restaurant(updated.clone()));
    Ok(updated)
  }

  pub async fn fetch_restaurants_by_cuisine(&self, cuisine: &Selector) -> Fetched<Vec<Restaurant>> {
    self
      .fetch_restaurants()
      .await
      .map(|list| filters::by_cuisine(&list, cuisine))
  }

  pub async fn fetch_restaurants_by_neighborhood(
    &self,
    neighborhood: &Selector,
  ) -> Fetched<Vec<Restaurant>> {
    self
      .fetch_restaurants()
      .await
      .map(|list| filters::by_neighborhood(&list, neighborhood))
  }

  pub async fn fetch_restaurants_by_cuisine_and_neighborhood(
    &self,
    cuisine: &Selector,
    neighborhood: &Selector,
  ) -> Fetched<Vec<Restaurant>> {
    self
      .fetch_restaurants()
      .await
      .map(|list| filters::by_cuisine_and_neighborhood(&list, cuisine, neighborhood))
  }

  pub async fn fetch_neighborhoods(&self) -> Fetched<Vec<String>> {
    self
      .fetch_restaurants()
      .await
      .map(|list| filters::neighborhoods(&list))
  }

  pub async fn fetch_cuisines(&self) -> Fetched<Vec<String>> {
    self
      .fetch_restaurants()
      .await
      .map(|list| filters::cuisines(&list))
  }
}

impl<A: RemoteApi, S: RecordStore> Clone for Gateway<A, S> {
  fn clone(&self) -> Self {
    Self {
      api: self.api.clone(),
      store: Arc::clone(&self.store),
      writer: self.writer.clone(),
    }
  }
}
