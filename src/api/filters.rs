//! Client-side views over a fetched restaurant list.

use super::types::Restaurant;

/// Wildcard spelling accepted for any filter dimension
pub const ALL: &str = "all";

/// Value chosen for one filter dimension
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selector {
  /// Matches every value
  #[default]
  All,
  Only(String),
}

impl Selector {
  pub fn matches(&self, value: &str) -> bool {
    match self {
      Selector::All => true,
      Selector::Only(wanted) => wanted == value,
    }
  }
}

impl From<&str> for Selector {
  fn from(value: &str) -> Self {
    if value == ALL {
      Selector::All
    } else {
      Selector::Only(value.to_string())
    }
  }
}

/// Field to filter restaurants by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestaurantField {
  Cuisine,
  Neighborhood,
}

impl RestaurantField {
  /// Extract the value of this field from a restaurant
  fn extract<'a>(&self, restaurant: &'a Restaurant) -> &'a str {
    match self {
      RestaurantField::Cuisine => &restaurant.cuisine_type,
      RestaurantField::Neighborhood => &restaurant.neighborhood,
    }
  }

  /// Distinct values in first-occurrence order.
  pub fn unique_values(&self, items: &[Restaurant]) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for item in items {
      let value = self.extract(item);
      if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
      }
    }
    values
  }

  pub fn filter<'a>(&self, items: &'a [Restaurant], selector: &Selector) -> Vec<&'a Restaurant> {
    items
      .iter()
      .filter(|item| selector.matches(self.extract(item)))
      .collect()
  }
}

pub fn by_cuisine(items: &[Restaurant], cuisine: &Selector) -> Vec<Restaurant> {
  RestaurantField::Cuisine
    .filter(items, cuisine)
    .into_iter()
    .cloned()
    .collect()
}

pub fn by_neighborhood(items: &[Restaurant], neighborhood: &Selector) -> Vec<Restaurant> {
  RestaurantField::Neighborhood
    .filter(items, neighborhood)
    .into_iter()
    .cloned()
    .collect()
}

pub fn by_cuisine_and_neighborhood(
  items: &[Restaurant],
  cuisine: &Selector,
  neighborhood: &Selector,
) -> Vec<Restaurant> {
  items
    .iter()
    .filter(|r| cuisine.matches(&r.cuisine_type) && neighborhood.matches(&r.neighborhood))
    .cloned()
    .collect()
}

pub fn neighborhoods(items: &[Restaurant]) -> Vec<String> {
  RestaurantField::Neighborhood.unique_values(items)
}

pub fn cuisines(items: &[Restaurant]) -> Vec<String> {
  RestaurantField::Cuisine.unique_values(items)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::LatLng;
  use std::collections::BTreeMap;

  fn restaurant(id: i64, cuisine: &str, neighborhood: &str) -> Restaurant {
    Restaurant {
      id,
      name: format!("Restaurant {}", id),
      neighborhood: neighborhood.to_string(),
      cuisine_type: cuisine.to_string(),
      address: String::new(),
      latlng: LatLng::default(),
      photograph: None,
      operating_hours: BTreeMap::new(),
      is_favorite: false,
    }
  }

  fn test_restaurants() -> Vec<Restaurant> {
    vec![
      restaurant(1, "Asian", "Manhattan"),
      restaurant(2, "Pizza", "Brooklyn"),
      restaurant(3, "Italian", "Manhattan"),
      restaurant(4, "Italian", "Queens"),
      restaurant(5, "Asian", "Brooklyn"),
    ]
  }

  #[test]
  fn test_unique_neighborhoods_first_occurrence_order() {
    let items = vec![
      restaurant(1, "x", "A"),
      restaurant(2, "x", "B"),
      restaurant(3, "x", "A"),
    ];
    assert_eq!(neighborhoods(&items), vec!["A", "B"]);
  }

  #[test]
  fn test_unique_cuisines() {
    assert_eq!(
      cuisines(&test_restaurants()),
      vec!["Asian", "Pizza", "Italian"]
    );
  }

  #[test]
  fn test_cuisine_with_all_neighborhoods() {
    let items = test_restaurants();
    let filtered = by_cuisine_and_neighborhood(&items, &"Italian".into(), &"all".into());
    let ids: Vec<i64> = filtered.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![3, 4]);
  }

  #[test]
  fn test_both_dimensions() {
    let items = test_restaurants();
    let filtered = by_cuisine_and_neighborhood(&items, &"Asian".into(), &"Brooklyn".into());
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, 5);
  }

  #[test]
  fn test_all_all_returns_everything() {
    let items = test_restaurants();
    assert_eq!(by_cuisine_and_neighborhood(&items, &Selector::All, &Selector::All).len(), 5);
  }

  #[test]
  fn test_single_dimension_filters() {
    let items = test_restaurants();
    assert_eq!(by_cuisine(&items, &"Pizza".into()).len(), 1);
    assert_eq!(by_neighborhood(&items, &"Manhattan".into()).len(), 2);
    assert!(by_neighborhood(&items, &"Bronx".into()).is_empty());
  }

  #[test]
  fn test_selector_parse() {
    assert_eq!(Selector::from("all"), Selector::All);
    assert_eq!(Selector::from("All"), Selector::Only("All".to_string()));
  }
}
