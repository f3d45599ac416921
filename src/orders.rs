//! Customer order history.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::catalog::decode_list;
use crate::error::StoreResult;
use crate::models::{DeliveryStatus, Order, OrderStatus};

pub struct OrdersService {
    api: Arc<ApiClient>,
}

impl OrdersService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn list(&self) -> StoreResult<Vec<Order>> {
        let value = self.api.get("/api/orders").await?;
        decode_list(value)
    }
}

/// Live tracking is offered once the parcel is on its way.
pub fn is_trackable(order: &Order) -> bool {
    order.delivery_status == Some(DeliveryStatus::InTransit)
        || order.order_status == OrderStatus::Shipped
}

/// Display form of an order id: its last eight characters, upper-cased.
pub fn short_order_number(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let start = chars.len().saturating_sub(8);
    chars[start..].iter().collect::<String>().to_uppercase()
}
