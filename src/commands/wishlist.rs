use clap::Subcommand;
use serde_json::{json, Value};

use super::{require_login, to_json, user_error};
use crate::storefront::Storefront;

#[derive(Debug, Subcommand)]
pub enum WishlistCommand {
    /// List wishlisted products.
    Show,
    Add { product_id: String },
    Remove { product_id: String },
    /// Add when absent, remove when present.
    Toggle { product_id: String },
}

pub async fn run(shop: &Storefront, cmd: WishlistCommand) -> Result<Value, String> {
    require_login(shop)?;
    match cmd {
        WishlistCommand::Show => {
            let products = shop.wishlist.fetch_products().await.map_err(user_error)?;
            Ok(json!({
                "products": to_json(&products)?,
                "totalItems": products.len(),
            }))
        }
        WishlistCommand::Add { product_id } => {
            shop.wishlist
                .add_to_wishlist(&product_id)
                .await
                .map_err(user_error)?;
            Ok(membership(shop, &product_id))
        }
        WishlistCommand::Remove { product_id } => {
            shop.wishlist
                .remove_from_wishlist(&product_id)
                .await
                .map_err(user_error)?;
            Ok(membership(shop, &product_id))
        }
        WishlistCommand::Toggle { product_id } => {
            shop.wishlist.toggle(&product_id).await.map_err(user_error)?;
            Ok(membership(shop, &product_id))
        }
    }
}

fn membership(shop: &Storefront, product_id: &str) -> Value {
    json!({
        "productId": product_id,
        "inWishlist": shop.wishlist.is_in_wishlist(product_id),
        "totalItems": shop.wishlist.total_items(),
    })
}
