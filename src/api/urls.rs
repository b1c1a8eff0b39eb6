//! Page and image locations derived from restaurant records.

use super::types::Restaurant;

/// Page showing one restaurant.
pub fn url_for_restaurant(restaurant: &Restaurant) -> String {
  format!("./restaurant.html?id={}", restaurant.id)
}

/// Base name of the restaurant's photo. Some records lack a photograph
/// reference; their photo is stored under the restaurant id.
fn photo_name(restaurant: &Restaurant) -> String {
  restaurant
    .photograph
    .as_deref()
    .map(str::trim)
    .filter(|p| !p.is_empty())
    .map(String::from)
    .unwrap_or_else(|| restaurant.id.to_string())
}

/// Logical image url. All density variants collapse to this in the asset cache.
pub fn image_url_for_restaurant(restaurant: &Restaurant) -> String {
  format!("/images/{}.jpg", photo_name(restaurant))
}

/// Image url for a pixel density, e.g. `/images/3-2x.jpg`.
pub fn image_url_for_density(restaurant: &Restaurant, density: u8) -> String {
  format!("/images/{}-{}x.jpg", photo_name(restaurant), density)
}

/// `srcset` value listing the given densities.
pub fn image_srcset(restaurant: &Restaurant, densities: &[u8]) -> String {
  densities
    .iter()
    .map(|d| format!("{} {}x", image_url_for_density(restaurant, *d), d))
    .collect::<Vec<_>>()
    .join(", ")
}
