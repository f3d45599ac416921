//! Cart pricing rules.
//!
//! The free-delivery threshold and flat fee are business constants.

use serde::Serialize;

use crate::models::CartItem;

/// Orders with a subtotal strictly above this ship free.
pub const FREE_DELIVERY_THRESHOLD: f64 = 500.0;
/// Flat delivery fee below the threshold.
pub const DELIVERY_FEE: f64 = 40.0;

/// Effective unit price: the offer price wins whenever present.
pub fn unit_price(price: f64, offer_price: Option<f64>) -> f64 {
    offer_price.unwrap_or(price)
}

pub fn line_total(price: f64, offer_price: Option<f64>, quantity: f64) -> f64 {
    unit_price(price, offer_price) * quantity
}

pub fn delivery_fee(subtotal: f64) -> f64 {
    if subtotal > FREE_DELIVERY_THRESHOLD {
        0.0
    } else {
        DELIVERY_FEE
    }
}

/// How much more the customer must add to unlock free delivery.
pub fn amount_to_free_delivery(subtotal: f64) -> f64 {
    if subtotal > FREE_DELIVERY_THRESHOLD {
        0.0
    } else {
        FREE_DELIVERY_THRESHOLD - subtotal
    }
}

/// Whole-percent discount, only when the offer is actually lower.
pub fn discount_percent(price: f64, offer_price: Option<f64>) -> Option<u32> {
    let offer = offer_price?;
    if price <= 0.0 || offer >= price {
        return None;
    }
    Some((((price - offer) / price) * 100.0).round() as u32)
}

/// Price including tax; a missing or non-positive rate leaves it untouched.
pub fn with_tax(price: f64, tax_rate: Option<f64>) -> f64 {
    match tax_rate {
        Some(rate) if rate > 0.0 => price * (1.0 + rate / 100.0),
        _ => price,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub total: f64,
}

impl CartTotals {
    pub fn from_subtotal(subtotal: f64) -> Self {
        let fee = delivery_fee(subtotal);
        Self {
            subtotal,
            delivery_fee: fee,
            total: subtotal + fee,
        }
    }

    pub fn for_items(items: &[CartItem]) -> Self {
        Self::from_subtotal(items.iter().map(CartItem::line_total).sum())
    }

    pub fn free_delivery(&self) -> bool {
        self.delivery_fee == 0.0
    }
}
