use clap::Args;
use serde_json::{json, Value};

use super::{require_login, to_json, user_error};
use crate::checkout::{AddressField, CheckoutFlow};
use crate::error::StoreError;
use crate::geo::{DeviceLocator, FixedLocator, IpLocator, NominatimGeocoder, ReverseGeocoder};
use crate::models::PaymentMethod;
use crate::storefront::Storefront;

#[derive(Debug, Args)]
pub struct CheckoutArgs {
    /// Id of a saved address; the default one is used otherwise.
    #[arg(long, conflicts_with = "new_address")]
    pub saved: Option<String>,
    /// Ignore saved addresses and fill a new one.
    #[arg(long)]
    pub new_address: bool,

    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub city: Option<String>,
    #[arg(long)]
    pub pincode: Option<String>,
    #[arg(long)]
    pub landmark: Option<String>,

    /// Fill street, city and pincode from this position.
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,
    /// Fill the address from the approximate IP location.
    #[arg(long, conflicts_with = "lat")]
    pub ip_locate: bool,

    #[arg(long, default_value = "cod")]
    pub payment: PaymentMethod,

    /// Validate and print the summary without placing the order.
    #[arg(long)]
    pub dry_run: bool,
}

impl CheckoutArgs {
    fn field_overrides(&self) -> Vec<(AddressField, &str)> {
        [
            (AddressField::Name, &self.name),
            (AddressField::Phone, &self.phone),
            (AddressField::Address, &self.address),
            (AddressField::City, &self.city),
            (AddressField::Pincode, &self.pincode),
            (AddressField::Landmark, &self.landmark),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|v| (field, v)))
        .collect()
    }

    fn locator(&self) -> Result<Option<Box<dyn DeviceLocator>>, StoreError> {
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            return Ok(Some(Box::new(FixedLocator::new(lat, lon))));
        }
        if self.ip_locate {
            return Ok(Some(Box::new(IpLocator::new()?)));
        }
        Ok(None)
    }
}

pub async fn run(shop: &Storefront, args: CheckoutArgs) -> Result<Value, String> {
    require_login(shop)?;
    let mut flow = shop.checkout();
    flow.load().await.map_err(user_error)?;
    prepare(shop, &mut flow, &args).await?;

    let summary = summary(&flow)?;
    if args.dry_run {
        flow.validate().map_err(user_error)?;
        return Ok(summary);
    }

    let placed = flow.place_order().await.map_err(user_error)?;
    Ok(json!({
        "success": true,
        "order": to_json(&placed)?,
        "summary": summary,
        "cartItems": shop.cart.total_items(),
    }))
}

async fn prepare(shop: &Storefront, flow: &mut CheckoutFlow, args: &CheckoutArgs) -> Result<(), String> {
    if let Some(id) = &args.saved {
        flow.select_saved_address(id).map_err(user_error)?;
    } else if args.new_address {
        flow.add_new_address();
    }

    if let Some(locator) = args.locator().map_err(user_error)? {
        let geocoder = NominatimGeocoder::from_config(shop.config())
            .map_err(|e| user_error(e.into()))?;
        locate_into(flow, locator.as_ref(), &geocoder).await?;
    }

    for (field, value) in args.field_overrides() {
        flow.set_field(field, value);
    }
    flow.set_payment_method(args.payment);
    Ok(())
}

async fn locate_into(
    flow: &mut CheckoutFlow,
    locator: &dyn DeviceLocator,
    geocoder: &dyn ReverseGeocoder,
) -> Result<(), String> {
    flow.use_current_location(locator, geocoder)
        .await
        .map_err(|e| user_error(e.into()))
}

fn summary(flow: &CheckoutFlow) -> Result<Value, String> {
    Ok(json!({
        "mode": to_json(&flow.mode())?,
        "selectedAddressId": flow.selected_address_id(),
        "address": to_json(flow.form())?,
        "missingFields": flow.form().missing_fields(),
        "paymentMethod": flow.payment_method().to_string(),
        "items": flow.items().len(),
        "totals": to_json(&flow.totals())?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests_support;
    use crate::testing::{FakeTransport, StaticGeocoder};
    use crate::geo::GeocodedAddress;
    use reqwest::Method;
    use std::sync::Arc;

    fn args() -> CheckoutArgs {
        CheckoutArgs {
            saved: None,
            new_address: false,
            name: None,
            phone: None,
            address: None,
            city: None,
            pincode: None,
            landmark: None,
            lat: None,
            lon: None,
            ip_locate: false,
            payment: PaymentMethod::Cod,
            dry_run: false,
        }
    }

    fn signed_in_with_cart(fake: &Arc<FakeTransport>) -> Storefront {
        fake.respond(Method::GET, "/api/auth/me", json!({ "_id": "u1", "name": "Asha" }));
        fake.respond(Method::GET, "/api/wishlist", json!({ "products": [] }));
        fake.respond(
            Method::GET,
            "/api/cart",
            json!({
                "items": [{ "product": "p1", "variant": "v1", "quantity": 1, "price": 600 }],
                "totalItems": 1
            }),
        );
        tests_support::shop(fake, Some("tok"))
    }

    #[tokio::test]
    async fn dry_run_reports_missing_fields_without_posting() {
        let fake = Arc::new(FakeTransport::new());
        let shop = signed_in_with_cart(&fake);
        fake.respond(Method::GET, "/api/addresses", json!([]));
        shop.initialize().await.unwrap();

        let mut a = args();
        a.dry_run = true;
        a.name = Some("Asha".into());
        let err = run(&shop, a).await.unwrap_err();
        assert_eq!(err, "Please fill all required fields");
        assert_eq!(fake.calls_to(Method::POST, "/api/orders"), 0);
    }

    #[tokio::test]
    async fn flags_override_the_default_saved_address() {
        let fake = Arc::new(FakeTransport::new());
        let shop = signed_in_with_cart(&fake);
        fake.respond(
            Method::GET,
            "/api/addresses",
            json!([{
                "_id": "a1", "name": "Asha", "phone": "9000000001", "address": "12 MG Road",
                "city": "Bengaluru", "pincode": "560001", "isDefault": true
            }]),
        );
        shop.initialize().await.unwrap();

        let mut a = args();
        a.dry_run = true;
        a.phone = Some("9000000002".into());
        let out = run(&shop, a).await.unwrap();
        assert_eq!(out["mode"], json!("manual"));
        assert_eq!(out["selectedAddressId"], Value::Null);
        assert_eq!(out["address"]["phone"], json!("9000000002"));
        assert_eq!(out["address"]["city"], json!("Bengaluru"));
        assert_eq!(out["totals"]["deliveryFee"], json!(0.0));
    }

    #[tokio::test]
    async fn located_address_feeds_the_form() {
        let fake = Arc::new(FakeTransport::new());
        let shop = signed_in_with_cart(&fake);
        fake.respond(Method::GET, "/api/addresses", json!([]));
        shop.initialize().await.unwrap();

        let mut flow = shop.checkout();
        flow.load().await.unwrap();
        let geocoder = StaticGeocoder(Some(GeocodedAddress {
            address: "5 Brigade Road".into(),
            city: "Bengaluru".into(),
            pincode: "560025".into(),
            landmark: None,
        }));
        locate_into(&mut flow, &FixedLocator::new(12.97, 77.6), &geocoder)
            .await
            .unwrap();
        assert_eq!(flow.form().pincode, "560025");

        let failing = StaticGeocoder(None);
        let err = locate_into(&mut flow, &FixedLocator::new(0.0, 0.0), &failing)
            .await
            .unwrap_err();
        assert_eq!(err, "Could not fetch address. Please enter manually.");
        assert_eq!(flow.form().city, "Bengaluru");
    }
}
