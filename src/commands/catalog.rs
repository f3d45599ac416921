use clap::Args;
use serde_json::{json, Value};

use super::{to_json, user_error};
use crate::catalog::{quote, CatalogIndex, OrderQuantity, ProductQuery};
use crate::pricing::discount_percent;
use crate::storefront::Storefront;

#[derive(Debug, Args)]
pub struct ProductsArgs {
    /// Category id.
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(Debug, Args)]
pub struct ProductArgs {
    pub id: String,
    /// Variant to quote; defaults to the first one.
    #[arg(long)]
    pub variant: Option<String>,
    #[arg(long)]
    pub quantity: Option<f64>,
}

#[derive(Debug, Args)]
pub struct CategoriesArgs {
    /// Include subcategories.
    #[arg(long, conflicts_with = "parent")]
    pub all: bool,
    /// Only the children of this category.
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    pub query: String,
}

pub async fn products(shop: &Storefront, args: ProductsArgs) -> Result<Value, String> {
    let query = ProductQuery {
        category: args.category,
        limit: args.limit,
    };
    let products = shop.catalog.products(&query).await.map_err(user_error)?;
    to_json(&products)
}

pub async fn product(shop: &Storefront, args: ProductArgs) -> Result<Value, String> {
    let product = shop.catalog.product(&args.id).await.map_err(user_error)?;
    let variant_id = args
        .variant
        .or_else(|| product.first_variant().and_then(|v| v.id.clone()));

    let limits = OrderQuantity::for_product(&product, variant_id.as_deref());
    if let Some(requested) = args.quantity {
        limits.validate(requested).map_err(user_error)?;
    }
    let quantity = args.quantity.unwrap_or_else(|| limits.initial());

    let variant = variant_id.as_deref().and_then(|id| product.variant(id));
    let discount = variant.and_then(|v| discount_percent(v.price, v.offer_price));

    let similar = match shop.catalog.similar_products(&product).await {
        Ok(similar) => similar,
        Err(e) => {
            tracing::warn!(product_id = %product.id, error = %e, "similar products unavailable");
            Vec::new()
        }
    };

    Ok(json!({
        "product": to_json(&product)?,
        "variantId": variant_id,
        "limits": to_json(&limits)?,
        "outOfStock": limits.out_of_stock(),
        "quantity": quantity,
        "quote": quote(&product, variant_id.as_deref(), quantity),
        "discountPercent": discount,
        "inWishlist": shop.wishlist.is_in_wishlist(&product.id),
        "similar": to_json(&similar)?,
    }))
}

pub async fn categories(shop: &Storefront, args: CategoriesArgs) -> Result<Value, String> {
    let categories = match (args.all, args.parent) {
        (_, Some(parent)) => shop.catalog.subcategories(&parent).await,
        (true, None) => shop.catalog.all_categories().await,
        (false, None) => shop.catalog.categories().await,
    }
    .map_err(user_error)?;
    to_json(&categories)
}

pub async fn stores(shop: &Storefront) -> Result<Value, String> {
    let stores = shop.catalog.stores().await.map_err(user_error)?;
    to_json(&stores)
}

pub async fn search(shop: &Storefront, args: SearchArgs) -> Result<Value, String> {
    let index = CatalogIndex::load(&shop.catalog).await;
    let results = index.search(&args.query);
    Ok(json!({
        "query": args.query.trim(),
        "empty": results.is_empty(),
        "results": to_json(&results)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests_support;
    use crate::testing::FakeTransport;
    use reqwest::Method;
    use std::sync::Arc;

    #[tokio::test]
    async fn top_level_categories_only_by_default() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond(
            Method::GET,
            "/api/categories",
            json!([
                { "_id": "c1", "name": "Vegetables", "slug": "vegetables" },
                { "_id": "c2", "name": "Leafy", "slug": "leafy", "parent": "c1" }
            ]),
        );
        let shop = tests_support::shop(&fake, None);

        let top = categories(&shop, CategoriesArgs { all: false, parent: None }).await.unwrap();
        assert_eq!(top.as_array().unwrap().len(), 1);
        let all = categories(&shop, CategoriesArgs { all: true, parent: None }).await.unwrap();
        assert_eq!(all.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn search_survives_a_failing_list() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond(
            Method::GET,
            "/api/products/public",
            json!({ "data": [{ "_id": "p1", "name": "Alphonso Mango", "tags": ["fruit"] }] }),
        );
        fake.fail(Method::GET, "/api/stores", 500, "down");
        let shop = tests_support::shop(&fake, None);

        let out = search(&shop, SearchArgs { query: " mango ".into() }).await.unwrap();
        assert_eq!(out["query"], json!("mango"));
        assert_eq!(out["empty"], json!(false));
        assert_eq!(out["results"]["products"][0]["_id"], json!("p1"));
    }
}
