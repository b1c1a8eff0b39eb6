//! Static asset cache: precached app shell plus content-addressed images.

mod canonical;
mod controller;
mod fetcher;
mod storage;

pub use controller::{AssetController, ServedFrom};
pub use fetcher::HttpFetcher;
