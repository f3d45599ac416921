use clap::Subcommand;
use serde_json::{json, Value};

use super::{require_login, to_json, user_error};
use crate::pricing::amount_to_free_delivery;
use crate::storefront::Storefront;

#[derive(Debug, Subcommand)]
pub enum CartCommand {
    /// Show cart lines and totals.
    Show {
        /// Also suggest products from the same category.
        #[arg(long)]
        related: bool,
    },
    /// Add a product variant.
    Add {
        product_id: String,
        variant_id: String,
        #[arg(long, default_value_t = 1.0)]
        quantity: f64,
    },
    /// Set a line's quantity; 0 removes it.
    Update {
        product_id: String,
        variant_id: String,
        quantity: f64,
    },
    /// Remove a line.
    Remove { product_id: String, variant_id: String },
    /// Empty the cart.
    Clear,
}

pub async fn run(shop: &Storefront, cmd: CartCommand) -> Result<Value, String> {
    require_login(shop)?;
    match cmd {
        CartCommand::Show { related } => show(shop, related).await,
        CartCommand::Add {
            product_id,
            variant_id,
            quantity,
        } => {
            let total = shop
                .cart
                .add_to_cart(&product_id, &variant_id, quantity)
                .await
                .map_err(user_error)?;
            Ok(json!({ "success": true, "totalItems": total }))
        }
        CartCommand::Update {
            product_id,
            variant_id,
            quantity,
        } => {
            let total = shop
                .cart
                .update_quantity(&product_id, &variant_id, quantity)
                .await
                .map_err(user_error)?;
            Ok(json!({ "success": true, "totalItems": total }))
        }
        CartCommand::Remove {
            product_id,
            variant_id,
        } => {
            let total = shop
                .cart
                .remove_from_cart(&product_id, &variant_id)
                .await
                .map_err(user_error)?;
            Ok(json!({ "success": true, "totalItems": total }))
        }
        CartCommand::Clear => {
            shop.cart.clear().await.map_err(user_error)?;
            Ok(json!({ "success": true, "totalItems": 0 }))
        }
    }
}

async fn show(shop: &Storefront, related: bool) -> Result<Value, String> {
    let cart = shop.cart.fetch_cart().await.map_err(user_error)?;
    let totals = cart.totals();
    let mut out = json!({
        "items": to_json(&cart.items)?,
        "totalItems": cart.total_items,
        "totals": to_json(&totals)?,
        "freeDelivery": totals.free_delivery(),
        "amountToFreeDelivery": amount_to_free_delivery(totals.subtotal),
    });
    if related {
        let products = shop
            .catalog
            .related_for_cart(&cart.items)
            .await
            .map_err(user_error)?;
        out["related"] = to_json(&products)?;
    }
    Ok(out)
}
