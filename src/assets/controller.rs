//! Intercepts outbound requests and answers them from the asset cache.
//!
//! - install: precache the app shell into the versioned static bucket
//! - activate: delete this app's buckets that are no longer current
//! - fetch: shell for `/`, cache-then-network for images, read-through
//!   lookup for everything else

use futures::future::try_join_all;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{AssetsConfig, Config};
use crate::error::{Error, Result};

use super::canonical::{image_storage_key, lookup_key};
use super::fetcher::Fetcher;
use super::storage::{AssetResponse, AssetStore};

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
  Cache,
  Network,
}

#[derive(Debug, Clone)]
pub struct Intercepted {
  pub response: AssetResponse,
  pub served_from: ServedFrom,
}

impl Intercepted {
  fn cache(response: AssetResponse) -> Self {
    Self {
      response,
      served_from: ServedFrom::Cache,
    }
  }

  fn network(response: AssetResponse) -> Self {
    Self {
      response,
      served_from: ServedFrom::Network,
    }
  }
}

pub struct AssetController<F> {
  fetcher: F,
  cache: AssetStore,
  origin: Url,
  assets: AssetsConfig,
}

impl<F: Fetcher> AssetController<F> {
  pub fn new(fetcher: F, cache: AssetStore, origin: Url, assets: AssetsConfig) -> Self {
    Self {
      fetcher,
      cache,
      origin,
      assets,
    }
  }

  /// Build a controller from configuration, opening the asset cache on disk.
  pub fn from_config(config: &Config, fetcher: F) -> color_eyre::Result<Self> {
    let origin = Url::parse(&config.origin)?;
    let cache = AssetStore::open(&config.asset_cache_path()?)?;
    Ok(Self::new(fetcher, cache, origin, config.assets.clone()))
  }

  /// Buckets that survive activation.
  fn current_buckets(&self) -> [&str; 2] {
    [
      self.assets.static_cache.as_str(),
      self.assets.images_cache.as_str(),
    ]
  }

  fn resolve(&self, asset: &str) -> Result<Url> {
    self
      .origin
      .join(asset)
      .map_err(|e| Error::InvalidInput(format!("invalid asset path {}: {}", asset, e)))
  }

  async fn fetch_ok(&self, url: &Url) -> Result<AssetResponse> {
    let response = self.fetcher.fetch(url).await?;
    if !response.is_success() {
      return Err(Error::Http {
        status: response.status,
        url: url.to_string(),
      });
    }
    Ok(response)
  }

  /// Populate the static bucket with every precached asset.
  ///
  /// All assets are fetched before anything is written; one failure fails
  /// the whole install and leaves the cache untouched.
  pub async fn install(&self) -> Result<usize> {
    let urls = self
      .assets
      .precache
      .iter()
      .map(|asset| self.resolve(asset))
      .collect::<Result<Vec<_>>>()?;

    let responses = try_join_all(urls.iter().map(|url| self.fetch_ok(url))).await?;

    let entries: Vec<(String, AssetResponse)> = urls
      .iter()
      .map(|url| url.to_string())
      .zip(responses)
      .collect();
    self.cache.put_all(&self.assets.static_cache, &entries)?;

    info!(
      "Installed {} assets into {}",
      entries.len(),
      self.assets.static_cache
    );
    Ok(entries.len())
  }

  /// Delete this app's buckets that are not current. Returns deleted names.
  pub fn activate(&self) -> Result<Vec<String>> {
    let current = self.current_buckets();
    let mut deleted = Vec::new();

    for name in self.cache.bucket_names()? {
      if name.starts_with(&self.assets.prefix) && !current.contains(&name.as_str()) {
        self.cache.delete_bucket(&name)?;
        info!("Deleted stale cache bucket {}", name);
        deleted.push(name);
      }
    }

    Ok(deleted)
  }

  /// Answer an outbound request.
  pub async fn handle_fetch(&self, url: &Url) -> Result<Intercepted> {
    if url.origin() == self.origin.origin() {
      if url.path() == "/" {
        return self.serve_shell();
      }
      if url.path().starts_with(&self.assets.image_path) {
        return self.serve_photo(url).await;
      }
    }

    let key = lookup_key(url);
    if let Some(cached) = self.lookup(|cache| cache.match_any(&key)) {
      return Ok(Intercepted::cache(cached));
    }

    // Read-through only: responses outside the image path are not stored
    Ok(Intercepted::network(self.fetcher.fetch(url).await?))
  }

  fn serve_shell(&self) -> Result<Intercepted> {
    let key = self.resolve(&self.assets.shell)?.to_string();
    self
      .cache
      .match_in(&self.assets.static_cache, &key)?
      .map(Intercepted::cache)
      .ok_or_else(|| Error::NotFound(format!("app shell {} is not cached", key)))
  }

  async fn serve_photo(&self, url: &Url) -> Result<Intercepted> {
    let key = image_storage_key(url);
    let bucket = &self.assets.images_cache;

    if let Some(cached) = self.lookup(|cache| cache.match_in(bucket, &key)) {
      return Ok(Intercepted::cache(cached));
    }

    let response = self.fetcher.fetch(url).await?;
    if response.is_success() {
      if let Err(e) = self.cache.put(bucket, &key, &response) {
        warn!("Failed to cache image {}: {}", key, e);
      } else {
        debug!("Cached {} as {}", url, key);
      }
    }
    Ok(Intercepted::network(response))
  }

  /// Cache lookups that fail count as misses.
  fn lookup(
    &self,
    f: impl FnOnce(&AssetStore) -> Result<Option<AssetResponse>>,
  ) -> Option<AssetResponse> {
    f(&self.cache).unwrap_or_else(|e| {
      warn!("Asset cache lookup failed: {}", e);
      None
    })
  }

  #[cfg(test)]
  fn cache(&self) -> &AssetStore {
    &self.cache
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

  #[derive(Default)]
  struct FakeFetcher {
    responses: HashMap<String, AssetResponse>,
    offline: AtomicBool,
    calls: AtomicUsize,
  }

  impl FakeFetcher {
    fn with(mut self, url: &str, response: AssetResponse) -> Self {
      self.responses.insert(url.to_string(), response);
      self
    }

    fn fetch_now(&self, url: &Url) -> Result<AssetResponse> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if self.offline.load(Ordering::SeqCst) {
        return Err(Error::NetworkUnavailable("offline".into()));
      }
      Ok(
        self
          .responses
          .get(url.as_str())
          .cloned()
          .unwrap_or(AssetResponse {
            status: 404,
            content_type: None,
            body: Vec::new(),
          }),
      )
    }
  }

  impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &Url) -> Result<AssetResponse> {
      self.fetch_now(url)
    }
  }

  const ORIGIN: &str = "http://localhost:8000";

  fn shell_fetcher() -> FakeFetcher {
    let mut fetcher = FakeFetcher::default();
    for asset in AssetsConfig::default().precache {
      fetcher = fetcher.with(
        &format!("{}/{}", ORIGIN, asset),
        AssetResponse::ok("text/plain", format!("contents of {}", asset)),
      );
    }
    fetcher
  }

  fn controller(fetcher: FakeFetcher) -> AssetController<FakeFetcher> {
    AssetController::new(
      fetcher,
      AssetStore::open_in_memory().unwrap(),
      Url::parse(ORIGIN).unwrap(),
      AssetsConfig::default(),
    )
  }

  fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
  }

  #[tokio::test]
  async fn test_install_precaches_shell() {
    let c = controller(shell_fetcher());
    assert_eq!(c.install().await.unwrap(), 5);
    assert_eq!(c.cache().entry_count("rr-static-v1").unwrap(), 5);
  }

  #[tokio::test]
  async fn test_install_is_all_or_nothing() {
    let mut fetcher = shell_fetcher();
    fetcher
      .responses
      .remove(&format!("{}/styles/styles.css", ORIGIN));
    let c = controller(fetcher);

    assert!(c.install().await.is_err());
    assert_eq!(c.cache().entry_count("rr-static-v1").unwrap(), 0);
  }

  #[tokio::test]
  async fn test_activate_deletes_only_stale_own_buckets() {
    let c = controller(shell_fetcher());
    let body = AssetResponse::ok("text/plain", "x");
    for bucket in ["rr-static-v0", "rr-static-v1", "rr-content-imgs", "other-app"] {
      c.cache().put(bucket, "http://localhost:8000/x", &body).unwrap();
    }

    assert_eq!(c.activate().unwrap(), vec!["rr-static-v0".to_string()]);
    assert_eq!(
      c.cache().bucket_names().unwrap(),
      vec!["rr-static-v1", "rr-content-imgs", "other-app"]
    );
  }

  #[tokio::test]
  async fn test_root_serves_cached_shell_offline() {
    let c = controller(shell_fetcher());
    c.install().await.unwrap();
    c.fetcher.offline.store(true, Ordering::SeqCst);

    let served = c.handle_fetch(&url("http://localhost:8000/")).await.unwrap();
    assert_eq!(served.served_from, ServedFrom::Cache);
    assert_eq!(served.response.body, b"contents of index.html".to_vec());
  }

  #[tokio::test]
  async fn test_root_without_install_is_not_found() {
    let c = controller(shell_fetcher());
    assert!(matches!(
      c.handle_fetch(&url("http://localhost:8000/")).await,
      Err(Error::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn test_density_variants_are_stored_once() {
    let image = AssetResponse::ok("image/jpeg", vec![0xff, 0xd8, 0xff]);
    let fetcher = FakeFetcher::default()
      .with("http://localhost:8000/images/3-1x.jpg", image.clone())
      .with("http://localhost:8000/images/3-2x.jpg", image.clone());
    let c = controller(fetcher);

    let first = c
      .handle_fetch(&url("http://localhost:8000/images/3-1x.jpg"))
      .await
      .unwrap();
    assert_eq!(first.served_from, ServedFrom::Network);

    c.fetcher.offline.store(true, Ordering::SeqCst);
    let second = c
      .handle_fetch(&url("http://localhost:8000/images/3-2x.jpg"))
      .await
      .unwrap();
    assert_eq!(second.served_from, ServedFrom::Cache);
    assert_eq!(second.response, image);
    assert_eq!(c.cache().entry_count("rr-content-imgs").unwrap(), 1);
    assert_eq!(
      c.cache()
        .match_in("rr-content-imgs", "http://localhost:8000/images/3.jpg")
        .unwrap(),
      Some(image)
    );
  }

  #[tokio::test]
  async fn test_failed_image_response_is_not_cached() {
    let c = controller(FakeFetcher::default());
    let served = c
      .handle_fetch(&url("http://localhost:8000/images/9-1x.jpg"))
      .await
      .unwrap();
    assert_eq!(served.response.status, 404);
    assert_eq!(c.cache().entry_count("rr-content-imgs").unwrap(), 0);
  }

  #[tokio::test]
  async fn test_other_requests_match_precache_without_query() {
    let c = controller(shell_fetcher());
    c.install().await.unwrap();
    let calls_after_install = c.fetcher.calls.load(Ordering::SeqCst);

    let served = c
      .handle_fetch(&url("http://localhost:8000/restaurant.html?id=3"))
      .await
      .unwrap();
    assert_eq!(served.served_from, ServedFrom::Cache);
    assert_eq!(c.fetcher.calls.load(Ordering::SeqCst), calls_after_install);
  }

  #[tokio::test]
  async fn test_other_misses_go_to_network_without_storing() {
    let fetcher = FakeFetcher::default().with(
      "http://localhost:1337/restaurants",
      AssetResponse::ok("application/json", "[]"),
    );
    let c = controller(fetcher);

    for _ in 0..2 {
      let served = c
        .handle_fetch(&url("http://localhost:1337/restaurants"))
        .await
        .unwrap();
      assert_eq!(served.served_from, ServedFrom::Network);
    }
    assert_eq!(c.fetcher.calls.load(Ordering::SeqCst), 2);
    assert!(c.cache().bucket_names().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_image_cache_failure_still_serves_network() {
    let image = AssetResponse::ok("image/jpeg", vec![0xff, 0xd8, 0xff]);
    let fetcher =
      FakeFetcher::default().with("http://localhost:8000/images/5-2x.jpg", image.clone());
    let c = controller(fetcher);
    c.cache().break_entries();

    for _ in 0..2 {
      let served = c
        .handle_fetch(&url("http://localhost:8000/images/5-2x.jpg"))
        .await
        .unwrap();
      assert_eq!(served.served_from, ServedFrom::Network);
      assert_eq!(served.response, image);
    }
    assert_eq!(c.fetcher.calls.load(Ordering::SeqCst), 2);
  }
}
