use tracing::error;

use crate::api::client::RemoteApi;
use crate::api::gateway::Gateway;
use crate::api::types::Restaurant;
use crate::store::RecordStore;

/// Result of a favorite toggle.
#[derive(Debug, Clone, PartialEq)]
pub enum FavoriteOutcome {
  /// Server accepted the new state
  Confirmed(Restaurant),
  /// Server call failed. The local flip is kept, not rolled back.
  Unconfirmed { requested: bool },
}

/// Flip the favorite flag of `restaurant`, update first and confirm after.
///
/// The caller's copy changes before the request is sent. On failure the
/// error is logged and the changed value stays in place.
pub async fn toggle_favorite<A, S>(
  gateway: &Gateway<A, S>,
  restaurant: &mut Restaurant,
) -> FavoriteOutcome
where
  A: RemoteApi,
  S: RecordStore + 'static,
{
  let requested = !restaurant.is_favorite;
  restaurant.is_favorite = requested;

  match gateway.update_favorite(restaurant.id, requested).await {
    Ok(updated) => {
      *restaurant = updated.clone();
      FavoriteOutcome::Confirmed(updated)
    }
    Err(e) => {
      error!(
        "Failed to set favorite={} for restaurant {}: {}",
        requested, restaurant.id, e
      );
      FavoriteOutcome::Unconfirmed { requested }
    }
  }
}
