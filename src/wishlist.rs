//! Wishlist store.
//!
//! Membership is answered locally from a cached id list so product cards can
//! render a heart without a round-trip. Mutations are applied optimistically
//! as pending entries and rolled back when the backend refuses them.

use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::error::{StoreError, StoreResult};
use crate::models::Product;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Confirmed,
    PendingAdd,
    PendingRemove,
}

impl EntryState {
    fn is_member(self) -> bool {
        matches!(self, EntryState::Confirmed | EntryState::PendingAdd)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    product_id: String,
    state: EntryState,
}

pub struct WishlistStore {
    api: Arc<ApiClient>,
    entries: Mutex<Vec<Entry>>,
}

impl WishlistStore {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            entries: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_in_wishlist(&self, product_id: &str) -> bool {
        self.lock()
            .iter()
            .any(|e| e.product_id == product_id && e.state.is_member())
    }

    pub fn product_ids(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|e| e.state.is_member())
            .map(|e| e.product_id.clone())
            .collect()
    }

    /// Always equal to `product_ids().len()`.
    pub fn total_items(&self) -> usize {
        self.lock().iter().filter(|e| e.state.is_member()).count()
    }

    pub fn state_of(&self, product_id: &str) -> Option<EntryState> {
        self.lock()
            .iter()
            .find(|e| e.product_id == product_id)
            .map(|e| e.state)
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    fn replace_all(&self, ids: Vec<String>) {
        *self.lock() = ids
            .into_iter()
            .map(|product_id| Entry {
                product_id,
                state: EntryState::Confirmed,
            })
            .collect();
    }

    fn set_state(&self, product_id: &str, state: Option<EntryState>) {
        let mut entries = self.lock();
        match state {
            Some(state) => match entries.iter_mut().find(|e| e.product_id == product_id) {
                Some(entry) => entry.state = state,
                None => entries.push(Entry {
                    product_id: product_id.to_string(),
                    state,
                }),
            },
            None => entries.retain(|e| e.product_id != product_id),
        }
    }

    /// Refuse when the entry is already pending, otherwise mark it in the
    /// same lock. Returns the state to restore on rollback. A confirmed
    /// entry stays confirmed while being re-added and an absent one stays
    /// absent while being removed.
    fn begin(&self, product_id: &str, pending: EntryState) -> StoreResult<Option<EntryState>> {
        let mut entries = self.lock();
        match entries.iter().position(|e| e.product_id == product_id) {
            Some(i) => {
                if entries[i].state != EntryState::Confirmed {
                    return Err(StoreError::MutationPending);
                }
                if pending == EntryState::PendingRemove {
                    entries[i].state = pending;
                }
                Ok(Some(EntryState::Confirmed))
            }
            None => {
                if pending == EntryState::PendingAdd {
                    entries.push(Entry {
                        product_id: product_id.to_string(),
                        state: pending,
                    });
                }
                Ok(None)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Backend sync
    // -----------------------------------------------------------------------

    /// Re-read the membership list. Ids and count change together.
    pub async fn refresh(&self) -> StoreResult<usize> {
        let value = self.api.get("/api/wishlist").await?;
        let ids = wishlist_ids(&value);
        let total = ids.len();
        self.replace_all(ids);
        debug!(total_items = total, "wishlist refreshed");
        Ok(total)
    }

    /// Full product documents for the wishlist screen. Entries without an id
    /// or without a purchasable variant are skipped.
    pub async fn fetch_products(&self) -> StoreResult<Vec<Product>> {
        let value = self.api.get("/api/wishlist").await?;
        self.replace_all(wishlist_ids(&value));
        Ok(wishlist_products(&value))
    }

    pub async fn add_to_wishlist(&self, product_id: &str) -> StoreResult<()> {
        let previous = self.begin(product_id, EntryState::PendingAdd)?;

        let result = self
            .api
            .post(
                "/api/wishlist/add",
                Some(json!({ "productId": product_id })),
            )
            .await;

        match result {
            Ok(_) => {
                self.set_state(product_id, Some(EntryState::Confirmed));
                info!(product_id, "added to wishlist");
                Ok(())
            }
            Err(e) if e.is_already_present() => {
                self.set_state(product_id, Some(EntryState::Confirmed));
                debug!(product_id, "already in wishlist, reconciled");
                Ok(())
            }
            Err(e) => {
                self.set_state(product_id, previous);
                warn!(product_id, error = %e, "wishlist add rolled back");
                Err(e.into())
            }
        }
    }

    pub async fn remove_from_wishlist(&self, product_id: &str) -> StoreResult<()> {
        let previous = self.begin(product_id, EntryState::PendingRemove)?;

        let result = self
            .api
            .delete(
                "/api/wishlist/remove",
                Some(json!({ "productId": product_id })),
            )
            .await;

        match result {
            Ok(_) => {
                self.set_state(product_id, None);
                info!(product_id, "removed from wishlist");
                Ok(())
            }
            Err(e) => {
                self.set_state(product_id, previous);
                warn!(product_id, error = %e, "wishlist remove rolled back");
                Err(e.into())
            }
        }
    }

    /// Add when absent, remove when present.
    pub async fn toggle(&self, product_id: &str) -> StoreResult<bool> {
        if self.is_in_wishlist(product_id) {
            self.remove_from_wishlist(product_id).await?;
            Ok(false)
        } else {
            self.add_to_wishlist(product_id).await?;
            Ok(true)
        }
    }
}

/// `products` holds bare ids or populated documents depending on the route.
fn wishlist_ids(value: &Value) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let products = value
        .get("products")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for product in products {
        let id = match &product {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map.get("_id").and_then(Value::as_str).map(str::to_string),
            _ => None,
        };
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

fn wishlist_products(value: &Value) -> Vec<Product> {
    let Some(products) = value.get("products").and_then(Value::as_array) else {
        return Vec::new();
    };
    products
        .iter()
        .filter_map(|raw| {
            let id = raw.get("_id").and_then(Value::as_str)?;
            match serde_json::from_value::<Product>(raw.clone()) {
                Ok(mut product) => {
                    product.variants.retain(|v| v.id.is_some());
                    if product.variants.is_empty() {
                        warn!(product_id = id, "wishlist product has no valid variants, skipping");
                        return None;
                    }
                    Some(product)
                }
                Err(e) => {
                    warn!(product_id = id, error = %e, "invalid product in wishlist");
                    None
                }
            }
        })
        .collect()
}
