//! Cache keys for intercepted requests.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;
use url::Url;

/// Trailing pixel-density marker on image file names: `-2x.jpg`, `-800px.jpg`.
fn density_suffix() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"-\d+(?:px|x)\.jpg$").expect("Invalid regex"))
}

/// Collapse a density variant onto its logical image name.
pub fn strip_density_suffix(path: &str) -> Cow<'_, str> {
  density_suffix().replace(path, ".jpg")
}

fn without_query(url: &Url) -> Url {
  let mut url = url.clone();
  url.set_query(None);
  url.set_fragment(None);
  url
}

/// Key under which a fetched image is stored. Every density variant of one
/// image maps to the same key.
pub fn image_storage_key(url: &Url) -> String {
  strip_density_suffix(without_query(url).as_str()).into_owned()
}

/// Key used to look up any other request among the precached assets.
pub fn lookup_key(url: &Url) -> String {
  without_query(url).to_string()
}
