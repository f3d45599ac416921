//! Catalog browsing: products, categories, stores and local search.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::{path_with_query, ApiClient};
use crate::error::{ApiError, StoreError, StoreResult};
use crate::models::{CartItem, Category, PricingMode, Product, Store};
use crate::pricing;

/// Related-product strip on the cart screen.
pub const RELATED_LIMIT: usize = 6;
const RELATED_FETCH_LIMIT: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub limit: Option<u32>,
}

impl ProductQuery {
    pub fn in_category(category: &str) -> Self {
        Self {
            category: Some(category.to_string()),
            limit: None,
        }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn path(&self) -> String {
        let mut pairs = Vec::new();
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            pairs.push(("category", category.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        path_with_query("/api/products/public", &pairs)
    }
}

/// List endpoints answer either a bare array or `{ data: [...] }`.
pub(crate) fn decode_list<T: DeserializeOwned>(value: Value) -> StoreResult<Vec<T>> {
    let list = match value {
        Value::Array(_) => value,
        Value::Null => return Ok(Vec::new()),
        mut other => match other.get_mut("data").map(Value::take) {
            Some(data) if data.is_array() => data,
            _ => return Ok(Vec::new()),
        },
    };
    serde_json::from_value(list).map_err(|e| StoreError::Api(ApiError::InvalidJson(e.to_string())))
}

pub(crate) fn decode_one<T: DeserializeOwned>(value: Value) -> StoreResult<T> {
    let body = match value.get("data") {
        Some(data) if data.is_object() => data.clone(),
        _ => value,
    };
    serde_json::from_value(body).map_err(|e| StoreError::Api(ApiError::InvalidJson(e.to_string())))
}

// ---------------------------------------------------------------------------
// Catalog service
// ---------------------------------------------------------------------------

pub struct CatalogService {
    api: Arc<ApiClient>,
}

impl CatalogService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn products(&self, query: &ProductQuery) -> StoreResult<Vec<Product>> {
        let value = self.api.get(&query.path()).await?;
        decode_list(value)
    }

    pub async fn product(&self, id: &str) -> StoreResult<Product> {
        let value = self.api.get(&format!("/api/products/public/{id}")).await?;
        decode_one(value)
    }

    /// Top-level categories only.
    pub async fn categories(&self) -> StoreResult<Vec<Category>> {
        let mut categories = self.all_categories().await?;
        categories.retain(Category::is_parent);
        Ok(categories)
    }

    pub async fn all_categories(&self) -> StoreResult<Vec<Category>> {
        let value = self.api.get("/api/categories").await?;
        decode_list(value)
    }

    pub async fn subcategories(&self, parent_id: &str) -> StoreResult<Vec<Category>> {
        let value = self
            .api
            .get(&format!("/api/categories/{parent_id}/subcategories"))
            .await?;
        decode_list(value)
    }

    pub async fn stores(&self) -> StoreResult<Vec<Store>> {
        let value = self.api.get("/api/stores").await?;
        decode_list(value)
    }

    /// Other products from the same category.
    pub async fn similar_products(&self, product: &Product) -> StoreResult<Vec<Product>> {
        let Some(category) = product.category_id() else {
            return Ok(Vec::new());
        };
        let candidates = self.products(&ProductQuery::in_category(category)).await?;
        Ok(similar_to(product, candidates))
    }

    /// Upsell strip for the cart: products from the category of the first
    /// cart product that still resolves, minus what is already in the cart.
    pub async fn related_for_cart(&self, items: &[CartItem]) -> StoreResult<Vec<Product>> {
        let in_cart = crate::cart::product_ids(items);
        if in_cart.is_empty() {
            return Ok(Vec::new());
        }

        let mut category = None;
        for id in &in_cart {
            match self.product(id).await {
                Ok(product) => {
                    if let Some(c) = product.category_id() {
                        category = Some(c.to_string());
                        break;
                    }
                }
                Err(e) => debug!(product_id = %id, error = %e, "cart product did not resolve"),
            }
        }
        let Some(category) = category else {
            return Ok(Vec::new());
        };

        let candidates = self
            .products(&ProductQuery::in_category(&category).limit(RELATED_FETCH_LIMIT))
            .await?;
        let exclude: HashSet<&str> = in_cart.iter().map(String::as_str).collect();
        Ok(candidates
            .into_iter()
            .filter(|p| !exclude.contains(p.id.as_str()))
            .take(RELATED_LIMIT)
            .collect())
    }
}

/// Same category as `product`, excluding `product` itself.
pub fn similar_to(product: &Product, candidates: Vec<Product>) -> Vec<Product> {
    let Some(category) = product.category_id() else {
        return Vec::new();
    };
    candidates
        .into_iter()
        .filter(|p| p.id != product.id && p.category_id() == Some(category))
        .collect()
}

// ---------------------------------------------------------------------------
// Local search index
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
    pub stores: Vec<Store>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.products.is_empty() && self.categories.is_empty() && self.stores.is_empty()
    }
}

/// Search-as-you-type runs against a list fetched once per screen visit.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    products: Vec<Product>,
    categories: Vec<Category>,
    stores: Vec<Store>,
}

impl CatalogIndex {
    pub fn new(products: Vec<Product>, categories: Vec<Category>, stores: Vec<Store>) -> Self {
        Self {
            products,
            categories,
            stores,
        }
    }

    /// Fetch all three lists. A failing list is logged and left empty so
    /// search still covers the others.
    pub async fn load(catalog: &CatalogService) -> Self {
        let query = ProductQuery::default();
        let (products, categories, stores) = tokio::join!(
            catalog.products(&query),
            catalog.all_categories(),
            catalog.stores()
        );
        Self {
            products: products.unwrap_or_else(|e| {
                warn!(error = %e, "search index: products unavailable");
                Vec::new()
            }),
            categories: categories.unwrap_or_else(|e| {
                warn!(error = %e, "search index: categories unavailable");
                Vec::new()
            }),
            stores: stores.unwrap_or_else(|e| {
                warn!(error = %e, "search index: stores unavailable");
                Vec::new()
            }),
        }
    }

    pub fn search(&self, query: &str) -> SearchResults {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return SearchResults::default();
        }
        let hit = |text: &str| text.to_lowercase().contains(&needle);

        SearchResults {
            products: self
                .products
                .iter()
                .filter(|p| {
                    hit(&p.name)
                        || p.slug.as_deref().map(hit).unwrap_or(false)
                        || p.tags.iter().any(|t| hit(t))
                })
                .cloned()
                .collect(),
            categories: self
                .categories
                .iter()
                .filter(|c| hit(&c.name) || hit(&c.slug))
                .cloned()
                .collect(),
            stores: self
                .stores
                .iter()
                .filter(|s| hit(&s.name) || s.city.as_deref().map(hit).unwrap_or(false))
                .cloned()
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Order quantity limits
// ---------------------------------------------------------------------------

/// Quantity bounds for one product (and variant, for fixed pricing).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuantity {
    pub pricing_mode: PricingMode,
    pub base_unit: String,
    pub available_stock: f64,
    pub min: f64,
    pub max: f64,
}

impl OrderQuantity {
    pub fn for_product(product: &Product, variant_id: Option<&str>) -> Self {
        let available_stock = match product.pricing_mode {
            PricingMode::Fixed => variant_id
                .map(|id| stock_for_variant(product, id))
                .unwrap_or(0.0),
            _ => product.available_quantity,
        };
        let min = product.min_order_qty.unwrap_or(match product.pricing_mode {
            PricingMode::Unit => 1.0,
            _ => 0.01,
        });
        let max = match product.max_order_qty {
            Some(limit) if limit > 0.0 => limit.min(available_stock),
            _ => available_stock,
        };
        Self {
            pricing_mode: product.pricing_mode,
            base_unit: product
                .base_unit
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| "pcs".to_string()),
            available_stock,
            min,
            max,
        }
    }

    pub fn out_of_stock(&self) -> bool {
        self.available_stock <= 0.0
    }

    /// Starting quantity for the picker.
    pub fn initial(&self) -> f64 {
        match self.pricing_mode {
            PricingMode::CustomWeight => self.min,
            _ => self.min.max(1.0),
        }
    }

    pub fn clamp(&self, quantity: f64) -> f64 {
        quantity.min(self.max).max(self.min)
    }

    pub fn validate(&self, quantity: f64) -> StoreResult<()> {
        if self.out_of_stock() {
            return Err(StoreError::validation("This item is out of stock"));
        }
        if quantity.is_nan() || quantity <= 0.0 || quantity < self.min {
            return Err(StoreError::validation(format!(
                "Minimum order is {} {}",
                self.min, self.base_unit
            )));
        }
        if quantity > self.max {
            return Err(StoreError::validation(format!(
                "Only {} {} available",
                self.max, self.base_unit
            )));
        }
        Ok(())
    }
}

/// Stock for a fixed-price variant, summed across stores.
pub fn stock_for_variant(product: &Product, variant_id: &str) -> f64 {
    product
        .stock_by_store_variant
        .iter()
        .filter(|s| s.variant == variant_id)
        .map(|s| s.available_stock)
        .sum()
}

/// Price of `quantity` of a product, tax included.
pub fn quote(product: &Product, variant_id: Option<&str>, quantity: f64) -> f64 {
    let unit = match (product.pricing_mode, variant_id.and_then(|id| product.variant(id))) {
        (PricingMode::Fixed, Some(variant)) => variant.unit_price(),
        (PricingMode::Fixed, None) => product
            .first_variant()
            .map(|v| v.unit_price())
            .unwrap_or(0.0),
        _ => product.price_per_unit,
    };
    pricing::with_tax(unit * quantity, product.tax_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use reqwest::Method;
    use serde_json::json;

    fn catalog(fake: &Arc<FakeTransport>) -> CatalogService {
        CatalogService::new(Arc::new(ApiClient::new(fake.clone())))
    }

    fn product(id: &str, category: &str) -> Value {
        json!({ "_id": id, "name": format!("Item {id}"), "category": category })
    }

    #[tokio::test]
    async fn products_accept_bare_array_or_data_envelope() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond(Method::GET, "/api/products/public", json!([product("p1", "c1")]));
        fake.respond(
            Method::GET,
            "/api/products/public?category=c1&limit=10",
            json!({ "data": [product("p1", "c1"), product("p2", "c1")] }),
        );
        let catalog = catalog(&fake);

        assert_eq!(catalog.products(&ProductQuery::default()).await.unwrap().len(), 1);
        let in_category = catalog
            .products(&ProductQuery::in_category("c1").limit(10))
            .await
            .unwrap();
        assert_eq!(in_category.len(), 2);
    }

    #[tokio::test]
    async fn categories_keep_parents_only() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond(
            Method::GET,
            "/api/categories",
            json!([
                { "_id": "c1", "name": "Fruits", "slug": "fruits" },
                { "_id": "c2", "name": "Apples", "slug": "apples", "parent": "c1" },
                { "_id": "c3", "name": "Dairy", "slug": "dairy", "parent": null }
            ]),
        );
        let catalog = catalog(&fake);

        let ids: Vec<String> = catalog
            .categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["c1", "c3"]);
    }

    #[tokio::test]
    async fn related_products_use_first_resolvable_category() {
        let fake = Arc::new(FakeTransport::new());
        fake.fail(Method::GET, "/api/products/public/gone", 404, "Product not found");
        fake.respond(Method::GET, "/api/products/public/p1", product("p1", "veg"));
        let mut strip: Vec<Value> = (2..=9).map(|i| product(&format!("p{i}"), "veg")).collect();
        strip.insert(0, product("p1", "veg"));
        fake.respond(
            Method::GET,
            "/api/products/public?category=veg&limit=10",
            json!({ "data": strip }),
        );
        let cart: crate::models::Cart = serde_json::from_value(json!({
            "items": [
                { "product": "gone", "variant": "v", "quantity": 1, "price": 1 },
                { "product": { "_id": "p1", "name": "Tomato" }, "variant": "v", "quantity": 1, "price": 1 }
            ]
        }))
        .unwrap();

        let related = catalog(&fake).related_for_cart(&cart.items).await.unwrap();
        assert_eq!(related.len(), RELATED_LIMIT);
        assert!(related.iter().all(|p| p.id != "p1" && p.id != "gone"));
    }

    #[tokio::test]
    async fn related_products_empty_without_cart() {
        let fake = Arc::new(FakeTransport::new());
        assert!(catalog(&fake).related_for_cart(&[]).await.unwrap().is_empty());
        assert!(fake.requests().is_empty());
    }

    #[test]
    fn similar_products_exclude_self_and_other_categories() {
        let me: Product = serde_json::from_value(product("p1", "c1")).unwrap();
        let candidates: Vec<Product> = [product("p1", "c1"), product("p2", "c1"), product("p3", "c2")]
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect();
        let similar: Vec<String> = similar_to(&me, candidates).into_iter().map(|p| p.id).collect();
        assert_eq!(similar, vec!["p2"]);
    }

    #[test]
    fn search_is_case_insensitive_and_empty_query_matches_nothing() {
        let products: Vec<Product> = vec![
            serde_json::from_value(json!({ "_id": "p1", "name": "Alphonso Mango", "tags": ["seasonal"] })).unwrap(),
            serde_json::from_value(json!({ "_id": "p2", "name": "Banana", "slug": "banana-robusta" })).unwrap(),
        ];
        let categories = vec![Category {
            id: "c1".into(),
            name: "Fruits".into(),
            slug: "fruits".into(),
            ..Category::default()
        }];
        let stores = vec![Store {
            id: "s1".into(),
            name: "KTL Fresh".into(),
            address: None,
            city: Some("Kochi".into()),
        }];
        let index = CatalogIndex::new(products, categories, stores);

        assert_eq!(index.search("MANGO").products.len(), 1);
        assert_eq!(index.search("seasonal").products[0].id, "p1");
        assert_eq!(index.search("robusta").products[0].id, "p2");
        assert_eq!(index.search("fru").categories.len(), 1);
        assert_eq!(index.search("kochi").stores.len(), 1);
        assert!(index.search("   ").is_empty());
    }

    #[test]
    fn order_quantity_limits_follow_pricing_mode() {
        let fixed: Product = serde_json::from_value(json!({
            "_id": "p1", "name": "Rice", "pricingMode": "fixed", "baseUnit": "kg",
            "variants": [{ "_id": "v1", "value": 5, "unit": "kg", "price": 400, "offerPrice": 360 }],
            "stockByStoreVariant": [
                { "store": "s1", "variant": "v1", "availableStock": 3 },
                { "store": "s2", "variant": "v1", "availableStock": 4 },
                { "store": "s2", "variant": "v2", "availableStock": 9 }
            ],
            "maxOrderQty": 5
        }))
        .unwrap();
        let limits = OrderQuantity::for_product(&fixed, Some("v1"));
        assert_eq!(limits.available_stock, 7.0);
        assert_eq!(limits.min, 0.01);
        assert_eq!(limits.max, 5.0);
        assert!(limits.validate(6.0).is_err());
        assert_eq!(quote(&fixed, Some("v1"), 2.0), 720.0);

        let unit: Product = serde_json::from_value(json!({
            "_id": "p2", "name": "Eggs", "pricingMode": "unit", "availableQuantity": 30,
            "pricePerUnit": 8, "minOrderQty": 6
        }))
        .unwrap();
        let limits = OrderQuantity::for_product(&unit, None);
        assert_eq!(limits.base_unit, "pcs");
        assert_eq!(limits.max, 30.0);
        assert_eq!(limits.initial(), 6.0);
        assert_eq!(
            limits.validate(2.0),
            Err(StoreError::validation("Minimum order is 6 pcs"))
        );
        assert!(limits.validate(12.0).is_ok());
        assert_eq!(limits.clamp(100.0), 30.0);
    }

    #[test]
    fn default_minimum_depends_on_mode() {
        let weighed: Product = serde_json::from_value(json!({
            "_id": "p3", "name": "Cheese", "pricingMode": "custom-weight", "availableQuantity": 2.5
        }))
        .unwrap();
        let limits = OrderQuantity::for_product(&weighed, None);
        assert_eq!(limits.min, 0.01);
        assert_eq!(limits.initial(), 0.01);

        let unit: Product =
            serde_json::from_value(json!({ "_id": "p4", "name": "Bun", "availableQuantity": 0 })).unwrap();
        let limits = OrderQuantity::for_product(&unit, None);
        assert_eq!(limits.min, 1.0);
        assert!(limits.out_of_stock());
        assert!(limits.validate(1.0).is_err());
    }
}
