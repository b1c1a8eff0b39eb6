//! Error types for the offline data layer.

use thiserror::Error;

/// Result type alias using the data layer's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in data layer operations.
///
/// None of these are fatal to the application: reads fall back to the local
/// store, writes are queued or reported, sync failures are redelivered.
#[derive(Error, Debug)]
pub enum Error {
  /// The remote API could not be reached
  #[error("Network unavailable: {0}")]
  NetworkUnavailable(String),

  /// The remote API answered with a non-success status
  #[error("Remote API returned HTTP {status} for {url}")]
  Http { status: u16, url: String },

  /// The remote API answered with a body we could not understand
  #[error("Failed to decode response: {0}")]
  Decode(String),

  /// No persistent storage capability in this environment
  #[error("Persistent storage unavailable")]
  StorageUnavailable,

  /// SQLite failure
  #[error("Storage error: {0}")]
  Storage(#[from] rusqlite::Error),

  /// Record not found
  #[error("Not found: {0}")]
  NotFound(String),

  /// A queued write could not be delivered, left for redelivery
  #[error("Sync delivery failed for {tag}: {reason}")]
  SyncDelivery { tag: String, reason: String },

  /// A sync tag whose id suffix is not an integer
  #[error("Invalid sync tag: {0}")]
  InvalidSyncTag(String),

  /// Invalid input
  #[error("Invalid input: {0}")]
  InvalidInput(String),

  /// Serialization error
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// IO error
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

impl Error {
  /// Whether this error came from talking to the remote side.
  ///
  /// Remote failures are the ones that trigger the local store fallback.
  pub fn is_remote(&self) -> bool {
    matches!(
      self,
      Error::NetworkUnavailable(_) | Error::Http { .. } | Error::Decode(_)
    )
  }
}

impl From<reqwest::Error> for Error {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      Error::Decode(e.to_string())
    } else if let Some(status) = e.status() {
      Error::Http {
        status: status.as_u16(),
        url: e.url().map(|u| u.to_string()).unwrap_or_default(),
      }
    } else {
      Error::NetworkUnavailable(e.to_string())
    }
  }
}
