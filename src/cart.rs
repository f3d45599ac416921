//! Cart store.
//!
//! The backend cart document is authoritative: every mutation replaces the
//! local copy (or at least `total_items`) with what the server answered.
//! Nothing is computed locally and trusted.

use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::error::{ApiError, StoreError, StoreResult};
use crate::models::{Cart, CartItem, LineKey};
use crate::pricing::CartTotals;

pub struct CartStore {
    api: Arc<ApiClient>,
    cart: Mutex<Cart>,
    pending: Mutex<HashSet<LineKey>>,
}

/// Marks a line as having a mutation in flight; released on drop.
struct PendingLine<'a> {
    pending: &'a Mutex<HashSet<LineKey>>,
    key: LineKey,
}

impl Drop for PendingLine<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl CartStore {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            cart: Mutex::new(Cart::default()),
            pending: Mutex::new(HashSet::new()),
        }
    }

    pub fn total_items(&self) -> u32 {
        self.lock_cart().total_items
    }

    /// Last cart document seen from the backend.
    pub fn snapshot(&self) -> Cart {
        self.lock_cart().clone()
    }

    pub fn totals(&self) -> CartTotals {
        self.lock_cart().totals()
    }

    pub fn is_pending(&self, product_id: &str, variant_id: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&LineKey::new(product_id, variant_id))
    }

    /// Forget the local copy (sign-out).
    pub fn reset(&self) {
        *self.lock_cart() = Cart::default();
    }

    fn lock_cart(&self) -> std::sync::MutexGuard<'_, Cart> {
        self.cart.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, key: LineKey) -> StoreResult<PendingLine<'_>> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if !pending.insert(key.clone()) {
            debug!(product_id = %key.product_id, variant_id = %key.variant_id, "cart mutation already pending");
            return Err(StoreError::MutationPending);
        }
        Ok(PendingLine {
            pending: &self.pending,
            key,
        })
    }

    // -----------------------------------------------------------------------
    // Backend sync
    // -----------------------------------------------------------------------

    /// `GET /api/cart`, replacing the local copy.
    pub async fn fetch_cart(&self) -> StoreResult<Cart> {
        let value = self.api.get("/api/cart").await?;
        let cart = parse_cart(value)?;
        *self.lock_cart() = cart.clone();
        Ok(cart)
    }

    pub async fn refresh(&self) -> StoreResult<u32> {
        let cart = self.fetch_cart().await?;
        debug!(total_items = cart.total_items, lines = cart.items.len(), "cart refreshed");
        Ok(cart.total_items)
    }

    pub async fn add_to_cart(
        &self,
        product_id: &str,
        variant_id: &str,
        quantity: f64,
    ) -> StoreResult<u32> {
        if quantity.is_nan() || quantity <= 0.0 {
            return Err(StoreError::validation("Quantity must be greater than zero"));
        }
        let _pending = self.begin(LineKey::new(product_id, variant_id))?;

        let response = self
            .api
            .post(
                "/api/cart/add",
                Some(json!({
                    "productId": product_id,
                    "variantId": variant_id,
                    "quantity": quantity,
                })),
            )
            .await?;
        info!(product_id, variant_id, quantity, "added to cart");
        self.apply(response)
    }

    pub async fn remove_from_cart(&self, product_id: &str, variant_id: &str) -> StoreResult<u32> {
        let _pending = self.begin(LineKey::new(product_id, variant_id))?;
        self.send_remove(product_id, variant_id).await
    }

    /// Set a line's quantity; zero or less removes the line.
    pub async fn update_quantity(
        &self,
        product_id: &str,
        variant_id: &str,
        quantity: f64,
    ) -> StoreResult<u32> {
        let _pending = self.begin(LineKey::new(product_id, variant_id))?;
        if quantity <= 0.0 {
            return self.send_remove(product_id, variant_id).await;
        }

        let response = self
            .api
            .patch(
                "/api/cart/update",
                Some(json!({
                    "productId": product_id,
                    "variantId": variant_id,
                    "quantity": quantity,
                })),
            )
            .await?;
        debug!(product_id, variant_id, quantity, "cart quantity updated");
        self.apply(response)
    }

    pub async fn clear(&self) -> StoreResult<()> {
        self.api.delete("/api/cart/clear", None).await?;
        *self.lock_cart() = Cart::default();
        info!("cart cleared");
        Ok(())
    }

    async fn send_remove(&self, product_id: &str, variant_id: &str) -> StoreResult<u32> {
        let response = self
            .api
            .delete(
                "/api/cart/remove",
                Some(json!({ "productId": product_id, "variantId": variant_id })),
            )
            .await?;
        info!(product_id, variant_id, "removed from cart");
        self.apply(response)
    }

    /// Adopt a mutation response. A full cart document replaces the lines;
    /// otherwise only the count moves.
    fn apply(&self, response: Value) -> StoreResult<u32> {
        let mut cart = self.lock_cart();
        if response.get("items").map(Value::is_array).unwrap_or(false) {
            *cart = parse_cart(response)?;
        } else {
            cart.total_items = response
                .get("totalItems")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32;
        }
        Ok(cart.total_items)
    }
}

fn parse_cart(value: Value) -> StoreResult<Cart> {
    if value.is_null() {
        return Ok(Cart::default());
    }
    let body = value.get("cart").cloned().unwrap_or(value);
    serde_json::from_value(body).map_err(|e| StoreError::Api(ApiError::InvalidJson(e.to_string())))
}

/// Product ids on the given lines, in cart order without duplicates.
/// Lines whose product was deleted are skipped.
pub fn product_ids(items: &[CartItem]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| !item.product.is_missing())
        .map(|item| item.product.id().to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
