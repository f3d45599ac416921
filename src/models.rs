//! Wire models for the storefront backend.
//!
//! The backend is loose about shapes (a category may be an id or an embedded
//! document, numbers sometimes arrive as strings, lists as `null`). All of
//! that is normalised here so the stores never re-derive shape assumptions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::pricing;

// ---------------------------------------------------------------------------
// Lenient field helpers
// ---------------------------------------------------------------------------

/// `null` (or a missing field, combined with `#[serde(default)]`) becomes
/// `T::default()`.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept a string, a number, or `null` for text fields like phone/pincode.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = lenient_string(deserializer)?;
    Ok(if s.trim().is_empty() { None } else { Some(s) })
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Delivery,
    Admin,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub role: Role,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub slug: String,
}

/// A category reference: either a bare id or an embedded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Id(String),
    Embedded(CategorySummary),
}

impl CategoryRef {
    pub fn id(&self) -> &str {
        match self {
            CategoryRef::Id(id) => id,
            CategoryRef::Embedded(summary) => &summary.id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            CategoryRef::Id(_) => None,
            CategoryRef::Embedded(summary) => Some(&summary.name),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PricingMode {
    Fixed,
    CustomWeight,
    #[default]
    Unit,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub unit: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub offer_price: Option<f64>,
    #[serde(default)]
    pub sku: Option<String>,
}

impl Variant {
    pub fn unit_price(&self) -> f64 {
        pricing::unit_price(self.price, self.offer_price)
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.value, self.unit)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockByStoreVariant {
    #[serde(default, deserialize_with = "lenient_string")]
    pub store: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub variant: String,
    #[serde(default)]
    pub available_stock: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    #[serde(default, deserialize_with = "nullable")]
    pub images: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub pricing_mode: PricingMode,
    #[serde(default)]
    pub base_unit: Option<String>,
    #[serde(default)]
    pub price_per_unit: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub available_quantity: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub stock_by_store_variant: Vec<StockByStoreVariant>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub tax_rate: Option<f64>,
    #[serde(default)]
    pub min_order_qty: Option<f64>,
    #[serde(default)]
    pub max_order_qty: Option<f64>,
}

impl Product {
    pub fn category_id(&self) -> Option<&str> {
        self.category
            .as_ref()
            .map(CategoryRef::id)
            .filter(|id| !id.is_empty())
    }

    pub fn first_variant(&self) -> Option<&Variant> {
        self.variants.first()
    }

    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|v| v.id.as_deref() == Some(variant_id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub slug: String,
    #[serde(default)]
    pub parent: Option<CategoryRef>,
    #[serde(default)]
    pub image: Option<String>,
}

impl Category {
    pub fn is_parent(&self) -> bool {
        self.parent
            .as_ref()
            .map(|p| p.id().is_empty())
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Store {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub city: Option<String>,
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub images: Vec<String>,
}

/// Product on a cart/order line: populated document or bare id. A product
/// deleted from the catalog comes back as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductRef {
    Id(String),
    Embedded(ProductSummary),
    #[default]
    Missing,
}

impl ProductRef {
    /// Empty for a missing product.
    pub fn id(&self) -> &str {
        match self {
            ProductRef::Id(id) => id,
            ProductRef::Embedded(p) => &p.id,
            ProductRef::Missing => "",
        }
    }

    pub fn is_missing(&self) -> bool {
        self.id().trim().is_empty()
    }

    pub fn name(&self) -> &str {
        match self {
            ProductRef::Embedded(p) if !p.name.is_empty() => &p.name,
            _ => "Product",
        }
    }

    pub fn image(&self) -> Option<&str> {
        match self {
            ProductRef::Embedded(p) => p.images.first().map(String::as_str),
            ProductRef::Id(_) | ProductRef::Missing => None,
        }
    }
}

/// Identity of a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineKey {
    pub product_id: String,
    pub variant_id: String,
}

impl LineKey {
    pub fn new(product_id: &str, variant_id: &str) -> Self {
        Self {
            product_id: product_id.to_string(),
            variant_id: variant_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(rename = "_id", default)]
    pub line_id: Option<String>,
    #[serde(default)]
    pub product: ProductRef,
    #[serde(rename = "variant", alias = "variantId", default, deserialize_with = "lenient_string")]
    pub variant_id: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub offer_price: Option<f64>,
}

impl CartItem {
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product.id(), &self.variant_id)
    }

    pub fn unit_price(&self) -> f64 {
        pricing::unit_price(self.price, self.offer_price)
    }

    pub fn line_total(&self) -> f64 {
        pricing::line_total(self.price, self.offer_price, self.quantity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default, deserialize_with = "nullable")]
    pub items: Vec<CartItem>,
    #[serde(default, deserialize_with = "nullable")]
    pub total_items: u32,
}

impl Cart {
    pub fn totals(&self) -> pricing::CartTotals {
        pricing::CartTotals::for_items(&self.items)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub city: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pincode: String,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub landmark: Option<String>,
}

impl Address {
    /// Names of the mandatory fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        for (label, value) in [
            ("name", &self.name),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("pincode", &self.pincode),
        ] {
            if value.trim().is_empty() {
                missing.push(label);
            }
        }
        missing
    }

    pub fn one_line(&self) -> String {
        format!("{}, {}, {}", self.address, self.city, self.pincode)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAddress {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub address: Address,
    #[serde(default, deserialize_with = "nullable")]
    pub is_default: bool,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Placed,
    Shipped,
    Delivered,
    Cancelled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryStatus {
    Assigned,
    Accepted,
    InTransit,
    Delivered,
    #[serde(other)]
    Unknown,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::Accepted => "accepted",
            DeliveryStatus::InTransit => "in-transit",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cod,
    Online,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Cod => write!(f, "cod"),
            PaymentMethod::Online => write!(f, "online"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cod" | "cash" => Ok(PaymentMethod::Cod),
            "online" => Ok(PaymentMethod::Online),
            other => Err(format!("Unknown payment method: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonSummary {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub phone: Option<String>,
}

/// Delivery person on an order: bare id or populated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersonRef {
    Id(String),
    Embedded(PersonSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default)]
    pub product: ProductRef,
    #[serde(default, deserialize_with = "lenient_string")]
    pub variant: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub price: f64,
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        self.price * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total_amount: f64,
    pub order_status: OrderStatus,
    #[serde(default)]
    pub delivery_status: Option<DeliveryStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, deserialize_with = "nullable")]
    pub address: Address,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub delivery_person: Option<PersonRef>,
}

impl Order {
    pub fn assignment(&self) -> DeliveryAssignment {
        DeliveryAssignment {
            order_id: self.id.clone(),
            delivery_person: self.delivery_person.clone(),
            delivery_status: self.delivery_status,
        }
    }

    pub fn has_delivery_person(&self) -> bool {
        self.assignment().is_assigned()
    }
}

/// Who carries an order and how far the hand-off got.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAssignment {
    pub order_id: String,
    #[serde(default)]
    pub delivery_person: Option<PersonRef>,
    #[serde(default)]
    pub delivery_status: Option<DeliveryStatus>,
}

impl DeliveryAssignment {
    pub fn is_assigned(&self) -> bool {
        match &self.delivery_person {
            Some(PersonRef::Id(id)) => !id.trim().is_empty(),
            Some(PersonRef::Embedded(_)) => true,
            None => false,
        }
    }

    /// Assigned and not delivered yet.
    pub fn is_open(&self) -> bool {
        self.is_assigned() && self.delivery_status != Some(DeliveryStatus::Delivered)
    }
}

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl TrackedLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSnapshot {
    #[serde(default)]
    pub delivery_person: Option<PersonSummary>,
    #[serde(default)]
    pub location: Option<TrackedLocation>,
    #[serde(default)]
    pub delivery_status: Option<DeliveryStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn category_ref_accepts_id_and_embedded_document() {
        let by_id: Product = serde_json::from_value(json!({
            "_id": "p1", "name": "Apple", "category": "c1"
        }))
        .unwrap();
        let embedded: Product = serde_json::from_value(json!({
            "_id": "p2", "name": "Pear",
            "category": { "_id": "c2", "name": "Fruits", "slug": "fruits" }
        }))
        .unwrap();

        assert_eq!(by_id.category_id(), Some("c1"));
        assert_eq!(embedded.category_id(), Some("c2"));
        assert_eq!(
            embedded.category.as_ref().and_then(CategoryRef::name),
            Some("Fruits")
        );
    }

    #[test]
    fn product_tolerates_null_lists_and_missing_fields() {
        let p: Product = serde_json::from_value(json!({
            "_id": "p1", "name": null, "images": null, "variants": null,
            "pricingMode": "custom-weight"
        }))
        .unwrap();
        assert!(p.name.is_empty());
        assert!(p.images.is_empty());
        assert!(p.variants.is_empty());
        assert_eq!(p.pricing_mode, PricingMode::CustomWeight);
        assert_eq!(p.category_id(), None);
    }

    #[test]
    fn cart_item_reads_populated_product_and_variant_key() {
        let item: CartItem = serde_json::from_value(json!({
            "_id": "line-1",
            "product": { "_id": "p1", "name": "Tomato", "images": ["t.png"] },
            "variant": "v1",
            "quantity": 2,
            "price": 60,
            "offerPrice": 45
        }))
        .unwrap();
        assert_eq!(item.key(), LineKey::new("p1", "v1"));
        assert_eq!(item.product.name(), "Tomato");
        assert_eq!(item.product.image(), Some("t.png"));
        assert_eq!(item.line_total(), 90.0);
    }

    #[test]
    fn cart_item_accepts_bare_product_id() {
        let item: CartItem = serde_json::from_value(json!({
            "product": "p9", "variant": "v9", "quantity": 1, "price": 10
        }))
        .unwrap();
        assert_eq!(item.product.id(), "p9");
        assert_eq!(item.product.name(), "Product");
    }

    #[test]
    fn cart_item_with_deleted_product_still_decodes() {
        let cart: Cart = serde_json::from_value(json!({
            "items": [
                { "product": "p1", "variant": "v1", "quantity": 1, "price": 10 },
                { "product": null, "variant": "v2", "quantity": 2, "price": 5 },
                { "variant": "v3", "quantity": 1, "price": 5 }
            ],
            "totalItems": 4
        }))
        .unwrap();
        assert_eq!(cart.items.len(), 3);
        assert!(!cart.items[0].product.is_missing());
        assert_eq!(cart.items[1].product, ProductRef::Missing);
        assert_eq!(cart.items[1].product.name(), "Product");
        assert_eq!(cart.items[1].product.image(), None);
        assert!(cart.items[2].product.is_missing());
    }

    #[test]
    fn order_item_with_deleted_product_still_decodes() {
        let order: Order = serde_json::from_value(json!({
            "_id": "o1",
            "orderStatus": "delivered",
            "items": [{ "product": null, "variant": "v1", "quantity": 1, "price": 40 }]
        }))
        .unwrap();
        assert!(order.items[0].product.is_missing());
        assert_eq!(order.items[0].line_total(), 40.0);
    }

    #[test]
    fn address_fields_accept_numbers() {
        let saved: SavedAddress = serde_json::from_value(json!({
            "_id": "a1", "name": "Asha", "phone": 9876543210u64,
            "address": "12 MG Road", "city": "Kochi", "pincode": 682001,
            "isDefault": true
        }))
        .unwrap();
        assert_eq!(saved.address.phone, "9876543210");
        assert_eq!(saved.address.pincode, "682001");
        assert_eq!(saved.address.landmark, None);
        assert!(saved.is_default);
    }

    #[test]
    fn missing_fields_lists_blank_mandatory_fields_only() {
        let address = Address {
            name: "Asha".into(),
            phone: "98".into(),
            address: "12 MG Road".into(),
            city: "  ".into(),
            pincode: String::new(),
            landmark: None,
        };
        assert_eq!(address.missing_fields(), vec!["city", "pincode"]);
    }

    #[test]
    fn order_statuses_parse_and_unknowns_do_not_fail() {
        let order: Order = serde_json::from_value(json!({
            "_id": "o1",
            "items": [],
            "totalAmount": 340,
            "orderStatus": "shipped",
            "deliveryStatus": "in-transit",
            "paymentStatus": "refunded",
            "address": { "name": "A", "phone": "1", "address": "x", "city": "y", "pincode": "z" },
            "createdAt": "2025-03-01T10:15:00.000Z",
            "deliveryPerson": "dp1"
        }))
        .unwrap();
        assert_eq!(order.order_status, OrderStatus::Shipped);
        assert_eq!(order.delivery_status, Some(DeliveryStatus::InTransit));
        assert_eq!(order.payment_status, PaymentStatus::Unknown);
        assert!(order.has_delivery_person());
        assert!(order.created_at.is_some());
    }

    #[test]
    fn assignment_tracks_person_and_progress() {
        let order = |person: Value, status: Value| -> Order {
            serde_json::from_value(json!({
                "_id": "o1", "orderStatus": "placed",
                "deliveryPerson": person, "deliveryStatus": status
            }))
            .unwrap()
        };

        let open = order(json!({ "_id": "dp1", "name": "Ravi" }), json!("in-transit")).assignment();
        assert_eq!(open.order_id, "o1");
        assert!(open.is_assigned());
        assert!(open.is_open());

        let done = order(json!("dp1"), json!("delivered")).assignment();
        assert!(done.is_assigned());
        assert!(!done.is_open());

        let blank = order(json!(""), Value::Null).assignment();
        assert!(!blank.is_assigned());
        assert_eq!(blank.delivery_status, None);
    }

    #[test]
    fn role_defaults_to_user_and_unknown_roles_parse() {
        let u: User = serde_json::from_value(json!({ "_id": "u1", "name": "A" })).unwrap();
        assert_eq!(u.role, Role::User);
        let u: User = serde_json::from_value(json!({ "_id": "u1", "role": "vendor" })).unwrap();
        assert_eq!(u.role, Role::Unknown);
    }

    #[test]
    fn payment_method_parses_from_cli_text() {
        assert_eq!("COD".parse::<PaymentMethod>(), Ok(PaymentMethod::Cod));
        assert_eq!("online".parse::<PaymentMethod>(), Ok(PaymentMethod::Online));
        assert!("upi".parse::<PaymentMethod>().is_err());
        assert_eq!(
            serde_json::to_value(PaymentMethod::Online).unwrap(),
            json!("online")
        );
    }
}
