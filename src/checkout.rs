//! Checkout: address acquisition, payment choice and order placement.
//!
//! A `CheckoutFlow` lives for one visit to the checkout screen. The address
//! comes from exactly one of three modes; see [`AddressMode`].

use serde::Serialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::cart::CartStore;
use crate::catalog::decode_list;
use crate::error::{LocationError, StoreError, StoreResult};
use crate::geo::{locate, DeviceLocator, ReverseGeocoder};
use crate::models::{Address, CartItem, PaymentMethod, SavedAddress};
use crate::pricing::CartTotals;

pub const MISSING_FIELDS: &str = "Please fill all required fields";
pub const EMPTY_CART: &str = "Your cart is empty";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressMode {
    /// A stored address, displayed read-only.
    Saved,
    /// Blank or user-edited form.
    #[default]
    Manual,
    /// Form filled from the device position.
    Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressField {
    Name,
    Phone,
    Address,
    City,
    Pincode,
    Landmark,
}

impl FromStr for AddressField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(AddressField::Name),
            "phone" => Ok(AddressField::Phone),
            "address" | "street" => Ok(AddressField::Address),
            "city" => Ok(AddressField::City),
            "pincode" | "pin" | "postcode" => Ok(AddressField::Pincode),
            "landmark" => Ok(AddressField::Landmark),
            other => Err(format!("Unknown address field: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order_id: Option<String>,
    pub total_amount: f64,
    pub payment_method: PaymentMethod,
    pub address_saved: bool,
}

pub struct CheckoutFlow {
    api: Arc<ApiClient>,
    cart: Arc<CartStore>,
    items: Vec<CartItem>,
    mode: AddressMode,
    form: Address,
    selected_address_id: Option<String>,
    saved_addresses: Vec<SavedAddress>,
    payment_method: PaymentMethod,
    location_error: Option<LocationError>,
}

impl CheckoutFlow {
    pub fn new(api: Arc<ApiClient>, cart: Arc<CartStore>) -> Self {
        Self {
            api,
            cart,
            items: Vec::new(),
            mode: AddressMode::default(),
            form: Address::default(),
            selected_address_id: None,
            saved_addresses: Vec::new(),
            payment_method: PaymentMethod::default(),
            location_error: None,
        }
    }

    pub fn mode(&self) -> AddressMode {
        self.mode
    }

    pub fn form(&self) -> &Address {
        &self.form
    }

    pub fn selected_address_id(&self) -> Option<&str> {
        self.selected_address_id.as_deref()
    }

    pub fn saved_addresses(&self) -> &[SavedAddress] {
        &self.saved_addresses
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn set_payment_method(&mut self, method: PaymentMethod) {
        self.payment_method = method;
    }

    pub fn location_error(&self) -> Option<&LocationError> {
        self.location_error.as_ref()
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals::for_items(&self.items)
    }

    /// Fetch the cart and saved addresses, then preselect the default
    /// address (or the first one). Lines whose product no longer exists are
    /// left out of the order.
    pub async fn load(&mut self) -> StoreResult<()> {
        let cart = self.cart.fetch_cart().await?;
        let (items, gone): (Vec<_>, Vec<_>) = cart
            .items
            .into_iter()
            .partition(|item| !item.product.is_missing());
        if !gone.is_empty() {
            warn!(count = gone.len(), "cart lines without a product left out of checkout");
        }
        self.items = items;
        self.reload_addresses().await;

        let preselect = self
            .saved_addresses
            .iter()
            .find(|a| a.is_default)
            .or_else(|| self.saved_addresses.first())
            .map(|a| a.id.clone());
        match preselect {
            Some(id) => self.select_saved_address(&id)?,
            None => self.add_new_address(),
        }
        Ok(())
    }

    async fn reload_addresses(&mut self) {
        let fetched = match self.api.get("/api/addresses").await {
            Ok(value) => decode_list::<SavedAddress>(value),
            Err(e) => Err(e.into()),
        };
        match fetched {
            Ok(addresses) => self.saved_addresses = addresses,
            Err(e) => warn!(error = %e, "saved addresses unavailable"),
        }
    }

    // -----------------------------------------------------------------------
    // Address mode transitions
    // -----------------------------------------------------------------------

    pub fn select_saved_address(&mut self, id: &str) -> StoreResult<()> {
        let saved = self
            .saved_addresses
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::validation(format!("Saved address {id} not found")))?;
        self.form = saved.address.clone();
        self.selected_address_id = Some(saved.id.clone());
        self.mode = AddressMode::Saved;
        self.location_error = None;
        Ok(())
    }

    /// Always lands on a blank manual form with nothing selected.
    pub fn add_new_address(&mut self) {
        self.form = Address::default();
        self.selected_address_id = None;
        self.mode = AddressMode::Manual;
        self.location_error = None;
    }

    /// Switch to hand editing, keeping whatever the form holds.
    pub fn edit_manually(&mut self) {
        self.selected_address_id = None;
        self.mode = AddressMode::Manual;
    }

    /// Editing a saved address turns it into a new manual one.
    pub fn set_field(&mut self, field: AddressField, value: &str) {
        if self.mode == AddressMode::Saved {
            self.edit_manually();
        }
        let value = value.to_string();
        match field {
            AddressField::Name => self.form.name = value,
            AddressField::Phone => self.form.phone = value,
            AddressField::Address => self.form.address = value,
            AddressField::City => self.form.city = value,
            AddressField::Pincode => self.form.pincode = value,
            AddressField::Landmark => {
                self.form.landmark = Some(value).filter(|v| !v.trim().is_empty())
            }
        }
    }

    /// Resolve the device position into the form. On failure the mode and
    /// form are left as they were and the error is recorded.
    pub async fn use_current_location(
        &mut self,
        locator: &dyn DeviceLocator,
        geocoder: &dyn ReverseGeocoder,
    ) -> Result<(), LocationError> {
        self.location_error = None;
        let result = match locate(locator).await {
            Ok(at) => geocoder.reverse(at).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(found) => {
                self.form.address = found.address;
                self.form.city = found.city;
                self.form.pincode = found.pincode;
                self.form.landmark = found.landmark;
                self.selected_address_id = None;
                self.mode = AddressMode::Location;
                info!(city = %self.form.city, "address filled from current location");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "current location unavailable");
                self.location_error = Some(e.clone());
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> StoreResult<()> {
        if self.items.is_empty() {
            return Err(StoreError::validation(EMPTY_CART));
        }
        if !self.form.missing_fields().is_empty() {
            return Err(StoreError::validation(MISSING_FIELDS));
        }
        Ok(())
    }

    fn order_payload(&self) -> Value {
        let items: Vec<Value> = self
            .items
            .iter()
            .map(|item| {
                json!({
                    "product": item.product.id(),
                    "variant": item.variant_id,
                    "quantity": item.quantity,
                    "price": item.unit_price(),
                })
            })
            .collect();
        json!({
            "items": items,
            "totalAmount": self.totals().total,
            "address": self.form,
            "paymentMethod": self.payment_method,
        })
    }

    /// Validate, save a new address (best effort), create the order, then
    /// empty the cart. A failed order leaves the cart untouched.
    pub async fn place_order(&mut self) -> StoreResult<PlacedOrder> {
        self.validate()?;

        let mut address_saved = false;
        if self.mode != AddressMode::Saved {
            let mut body = json!(self.form);
            body["isDefault"] = json!(self.saved_addresses.is_empty());
            match self.api.post("/api/addresses", Some(body)).await {
                Ok(_) => {
                    address_saved = true;
                    self.reload_addresses().await;
                }
                Err(e) => warn!(error = %e, "address save failed, placing order anyway"),
            }
        }

        let payload = self.order_payload();
        let response = self.api.post("/api/orders", Some(payload)).await?;
        let placed = PlacedOrder {
            order_id: order_id_from(&response),
            total_amount: self.totals().total,
            payment_method: self.payment_method,
            address_saved,
        };
        info!(
            order_id = placed.order_id.as_deref().unwrap_or("-"),
            total = placed.total_amount,
            payment = %placed.payment_method,
            "order placed"
        );

        if let Err(e) = self.cart.clear().await {
            warn!(error = %e, "order placed but cart clear failed");
        }
        if let Err(e) = self.cart.refresh().await {
            warn!(error = %e, "cart refresh after order failed");
        }
        self.items.clear();
        Ok(placed)
    }
}

fn order_id_from(response: &Value) -> Option<String> {
    let order = response
        .get("order")
        .or_else(|| response.get("data"))
        .unwrap_or(response);
    order
        .get("_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{DeniedLocator, FixedLocator, GeocodedAddress};
    use crate::testing::{FakeTransport, StaticGeocoder};
    use reqwest::Method;

    fn flow(fake: &Arc<FakeTransport>) -> CheckoutFlow {
        let api = Arc::new(ApiClient::new(fake.clone()));
        let cart = Arc::new(CartStore::new(api.clone()));
        CheckoutFlow::new(api, cart)
    }

    fn cart_with_item(fake: &FakeTransport) {
        fake.respond(
            Method::GET,
            "/api/cart",
            json!({
                "items": [{
                    "product": { "_id": "p1", "name": "Rice" },
                    "variant": "v1",
                    "quantity": 4,
                    "price": 200,
                    "offerPrice": 150
                }],
                "totalItems": 4
            }),
        );
    }

    fn saved(id: &str, is_default: bool) -> Value {
        json!({
            "_id": id, "name": "Asha", "phone": "9876543210",
            "address": format!("{id} MG Road"), "city": "Kochi", "pincode": "682011",
            "isDefault": is_default
        })
    }

    fn fill(flow: &mut CheckoutFlow, city: &str) {
        flow.set_field(AddressField::Name, "Asha");
        flow.set_field(AddressField::Phone, "9876543210");
        flow.set_field(AddressField::Address, "12 MG Road");
        flow.set_field(AddressField::City, city);
        flow.set_field(AddressField::Pincode, "682011");
    }

    #[tokio::test]
    async fn load_preselects_default_then_first_address() {
        let fake = Arc::new(FakeTransport::new());
        cart_with_item(&fake);
        fake.respond(Method::GET, "/api/addresses", json!([saved("a1", false), saved("a2", true)]));
        let mut checkout = flow(&fake);
        checkout.load().await.unwrap();
        assert_eq!(checkout.mode(), AddressMode::Saved);
        assert_eq!(checkout.selected_address_id(), Some("a2"));
        assert_eq!(checkout.form().address, "a2 MG Road");

        let fake = Arc::new(FakeTransport::new());
        cart_with_item(&fake);
        fake.respond(Method::GET, "/api/addresses", json!([saved("a1", false), saved("a2", false)]));
        let mut checkout = flow(&fake);
        checkout.load().await.unwrap();
        assert_eq!(checkout.selected_address_id(), Some("a1"));
    }

    #[tokio::test]
    async fn load_without_addresses_starts_manual() {
        let fake = Arc::new(FakeTransport::new());
        cart_with_item(&fake);
        fake.fail(Method::GET, "/api/addresses", 500, "boom");
        let mut checkout = flow(&fake);
        checkout.load().await.unwrap();
        assert_eq!(checkout.mode(), AddressMode::Manual);
        assert!(checkout.saved_addresses().is_empty());
        assert_eq!(checkout.totals().total, 600.0);
    }

    #[tokio::test]
    async fn add_new_address_always_blanks_the_form() {
        let fake = Arc::new(FakeTransport::new());
        cart_with_item(&fake);
        fake.respond(Method::GET, "/api/addresses", json!([saved("a1", true)]));
        let mut checkout = flow(&fake);
        checkout.load().await.unwrap();

        for _ in 0..2 {
            checkout.add_new_address();
            assert_eq!(checkout.mode(), AddressMode::Manual);
            assert_eq!(checkout.form(), &Address::default());
            assert_eq!(checkout.selected_address_id(), None);
        }

        let geocoder = StaticGeocoder(Some(GeocodedAddress {
            address: "Marine Drive".into(),
            city: "Kochi".into(),
            pincode: "682031".into(),
            landmark: None,
        }));
        checkout
            .use_current_location(&FixedLocator::new(9.98, 76.27), &geocoder)
            .await
            .unwrap();
        assert_eq!(checkout.mode(), AddressMode::Location);
        checkout.add_new_address();
        assert_eq!(checkout.form(), &Address::default());
    }

    #[tokio::test]
    async fn empty_city_blocks_order_without_network() {
        let fake = Arc::new(FakeTransport::new());
        cart_with_item(&fake);
        fake.fail(Method::GET, "/api/addresses", 404, "none");
        let mut checkout = flow(&fake);
        checkout.load().await.unwrap();
        fill(&mut checkout, "");

        let err = checkout.place_order().await.unwrap_err();
        assert_eq!(err, StoreError::validation(MISSING_FIELDS));
        assert_eq!(fake.calls_to(Method::POST, "/api/orders"), 0);
        assert_eq!(fake.calls_to(Method::POST, "/api/addresses"), 0);
    }

    #[tokio::test]
    async fn lines_for_deleted_products_are_left_out_of_the_order() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond(
            Method::GET,
            "/api/cart",
            json!({
                "items": [
                    { "product": { "_id": "p1", "name": "Rice" }, "variant": "v1", "quantity": 2, "price": 100 },
                    { "product": null, "variant": "v2", "quantity": 1, "price": 80 }
                ],
                "totalItems": 3
            }),
        );
        fake.respond(Method::GET, "/api/addresses", json!([saved("a1", true)]));
        fake.respond(Method::POST, "/api/orders", json!({ "order": { "_id": "o9" } }));
        fake.respond(Method::DELETE, "/api/cart/clear", json!({ "totalItems": 0 }));
        let mut checkout = flow(&fake);
        checkout.load().await.unwrap();
        assert_eq!(checkout.items().len(), 1);

        checkout.place_order().await.unwrap();
        let body = fake.last_body(Method::POST, "/api/orders").unwrap();
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
        assert_eq!(body["items"][0]["product"], json!("p1"));
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond(Method::GET, "/api/cart", json!({ "items": [], "totalItems": 0 }));
        let mut checkout = flow(&fake);
        checkout.load().await.unwrap();
        fill(&mut checkout, "Kochi");
        assert_eq!(
            checkout.place_order().await.unwrap_err(),
            StoreError::validation(EMPTY_CART)
        );
    }

    #[tokio::test]
    async fn manual_order_saves_first_address_as_default_and_clears_cart() {
        let fake = Arc::new(FakeTransport::new());
        cart_with_item(&fake);
        fake.respond(Method::GET, "/api/addresses", json!([]));
        fake.respond(Method::POST, "/api/addresses", json!({ "_id": "a9" }));
        fake.respond(Method::POST, "/api/orders", json!({ "_id": "665f1c2e9b1d4a0012ab34cd" }));
        fake.respond(Method::DELETE, "/api/cart/clear", json!({}));
        let mut checkout = flow(&fake);
        checkout.load().await.unwrap();
        fill(&mut checkout, "Kochi");
        checkout.set_payment_method(PaymentMethod::Online);

        let placed = checkout.place_order().await.unwrap();

        assert!(placed.address_saved);
        assert_eq!(placed.order_id.as_deref(), Some("665f1c2e9b1d4a0012ab34cd"));
        let saved_body = fake.last_body(Method::POST, "/api/addresses").unwrap();
        assert_eq!(saved_body["isDefault"], json!(true));
        assert_eq!(saved_body["city"], json!("Kochi"));

        let order = fake.last_body(Method::POST, "/api/orders").unwrap();
        assert_eq!(order["items"][0]["price"], json!(150.0));
        assert_eq!(order["items"][0]["product"], json!("p1"));
        assert_eq!(order["totalAmount"], json!(600.0));
        assert_eq!(order["paymentMethod"], json!("online"));
        assert_eq!(order["address"]["pincode"], json!("682011"));
        assert_eq!(fake.calls_to(Method::DELETE, "/api/cart/clear"), 1);
        assert!(checkout.items().is_empty());
    }

    #[tokio::test]
    async fn address_save_failure_does_not_block_the_order() {
        let fake = Arc::new(FakeTransport::new());
        cart_with_item(&fake);
        fake.respond(Method::GET, "/api/addresses", json!([saved("a1", true)]));
        fake.fail(Method::POST, "/api/addresses", 500, "db down");
        fake.respond(Method::POST, "/api/orders", json!({ "order": { "_id": "o1" } }));
        fake.respond(Method::DELETE, "/api/cart/clear", json!({}));
        let mut checkout = flow(&fake);
        checkout.load().await.unwrap();
        checkout.add_new_address();
        fill(&mut checkout, "Kochi");

        let placed = checkout.place_order().await.unwrap();
        assert!(!placed.address_saved);
        assert_eq!(placed.order_id.as_deref(), Some("o1"));
        assert_eq!(
            fake.last_body(Method::POST, "/api/addresses").unwrap()["isDefault"],
            json!(false)
        );
    }

    #[tokio::test]
    async fn saved_mode_skips_address_save_and_failed_order_keeps_cart() {
        let fake = Arc::new(FakeTransport::new());
        cart_with_item(&fake);
        fake.respond(Method::GET, "/api/addresses", json!([saved("a1", true)]));
        fake.fail(Method::POST, "/api/orders", 500, "Failed to create order");
        let mut checkout = flow(&fake);
        checkout.load().await.unwrap();

        let err = checkout.place_order().await.unwrap_err();
        assert_eq!(err.user_message(), "Failed to create order");
        assert_eq!(fake.calls_to(Method::POST, "/api/addresses"), 0);
        assert_eq!(fake.calls_to(Method::DELETE, "/api/cart/clear"), 0);
        assert_eq!(checkout.items().len(), 1);
    }

    #[tokio::test]
    async fn location_failures_leave_mode_unchanged() {
        let fake = Arc::new(FakeTransport::new());
        let mut checkout = flow(&fake);
        checkout.set_field(AddressField::City, "Kochi");

        let err = checkout
            .use_current_location(&DeniedLocator, &StaticGeocoder(None))
            .await
            .unwrap_err();
        assert_eq!(err, LocationError::PermissionDenied);
        assert_eq!(checkout.mode(), AddressMode::Manual);
        assert_eq!(checkout.location_error(), Some(&LocationError::PermissionDenied));

        let err = checkout
            .use_current_location(&FixedLocator::new(0.0, 0.0), &StaticGeocoder(None))
            .await
            .unwrap_err();
        assert_eq!(err, LocationError::AddressNotFound);
        assert_eq!(checkout.mode(), AddressMode::Manual);
        assert_eq!(checkout.form().city, "Kochi");
    }

    #[tokio::test]
    async fn located_address_can_be_edited_by_hand() {
        let fake = Arc::new(FakeTransport::new());
        let mut checkout = flow(&fake);
        checkout.set_field(AddressField::Name, "Asha");
        let geocoder = StaticGeocoder(Some(GeocodedAddress {
            address: "Marine Drive".into(),
            city: "Kochi".into(),
            pincode: "682031".into(),
            landmark: Some("Near boat jetty".into()),
        }));

        checkout
            .use_current_location(&FixedLocator::new(9.98, 76.27), &geocoder)
            .await
            .unwrap();
        assert_eq!(checkout.form().name, "Asha");
        assert_eq!(checkout.form().landmark.as_deref(), Some("Near boat jetty"));

        checkout.edit_manually();
        assert_eq!(checkout.mode(), AddressMode::Manual);
        assert_eq!(checkout.form().address, "Marine Drive");
    }

    #[test]
    fn address_field_names_parse() {
        assert_eq!("PIN".parse::<AddressField>(), Ok(AddressField::Pincode));
        assert!("zip".parse::<AddressField>().is_err());
    }
}
