use std::fmt;

use crate::error::{Error, Result};

const REVIEW_PREFIX: &str = "syncReview_";

/// Tag attached to a deferred-sync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncTag {
  /// Replay the queued review with this local id
  Review(i64),
}

impl SyncTag {
  /// Parse a delivered tag.
  ///
  /// Tags that belong to some other feature yield `Ok(None)`. A review tag
  /// whose suffix is not an integer is an error.
  pub fn parse(tag: &str) -> Result<Option<Self>> {
    match tag.strip_prefix(REVIEW_PREFIX) {
      Some(id) => id
        .parse::<i64>()
        .map(|id| Some(SyncTag::Review(id)))
        .map_err(|_| Error::InvalidSyncTag(tag.to_string())),
      None => Ok(None),
    }
  }
}

impl fmt::Display for SyncTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SyncTag::Review(id) => write!(f, "{}{}", REVIEW_PREFIX, id),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_review_tag_format() {
    assert_eq!(SyncTag::Review(7).to_string(), "syncReview_7");
  }

  #[test]
  fn test_parse_review_tag() {
    assert_eq!(SyncTag::parse("syncReview_7").unwrap(), Some(SyncTag::Review(7)));
  }

  #[test]
  fn test_parse_other_tag() {
    assert_eq!(SyncTag::parse("syncFavorite_7").unwrap(), None);
  }

  #[test]
  fn test_parse_non_integer_suffix() {
    assert!(matches!(
      SyncTag::parse("syncReview_abc"),
      Err(Error::InvalidSyncTag(_))
    ));
    assert!(SyncTag::parse("syncReview_").is_err());
  }
}
