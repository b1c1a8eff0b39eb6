use std::future::Future;
use tracing::debug;
use url::Url;

use super::storage::AssetResponse;
use crate::error::{Error, Result};

/// Network side of asset interception.
///
/// Any HTTP status is a response; only transport failures are errors.
pub trait Fetcher: Send + Sync {
  fn fetch(&self, url: &Url) -> impl Future<Output = Result<AssetResponse>> + Send;
}

pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| Error::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;
    Ok(Self { client })
  }
}

impl Fetcher for HttpFetcher {
  async fn fetch(&self, url: &Url) -> Result<AssetResponse> {
    debug!("GET {}", url);
    let response = self.client.get(url.clone()).send().await?;
    let status = response.status().as_u16();
    let content_type = response
      .headers()
      .get(reqwest::header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);
    let body = response.bytes().await?.to_vec();

    Ok(AssetResponse {
      status,
      content_type,
      body,
    })
  }
}
