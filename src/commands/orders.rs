use clap::Args;
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::warn;

use super::{emit, require_login, to_json, user_error};
use crate::orders::{is_trackable, short_order_number};
use crate::storefront::Storefront;
use crate::tracking::{open_in_browser, MapLinks, TrackingState};

#[derive(Debug, Args)]
pub struct TrackArgs {
    pub order_id: String,
    /// Keep polling and print every change until interrupted.
    #[arg(long)]
    pub follow: bool,
    /// Open the courier position in the browser.
    #[arg(long)]
    pub open_map: bool,
}

pub async fn list(shop: &Storefront) -> Result<Value, String> {
    require_login(shop)?;
    let orders = shop.orders.list().await.map_err(user_error)?;
    let mut out = Vec::with_capacity(orders.len());
    for order in &orders {
        let mut entry = to_json(order)?;
        entry["orderNumber"] = json!(short_order_number(&order.id));
        entry["trackable"] = json!(is_trackable(order));
        out.push(entry);
    }
    Ok(Value::Array(out))
}

pub async fn track(shop: &Storefront, args: TrackArgs) -> Result<Value, String> {
    require_login(shop)?;
    let view = shop.tracking();
    let mut states = view.subscribe();
    view.open(&args.order_id);
    let mut map_opened = false;

    if !args.follow {
        let wait = shop.config().request_timeout + shop.config().tracking_interval;
        let state = tokio::time::timeout(wait, first_settled(&mut states))
            .await
            .unwrap_or_else(|_| view.state());
        view.close();
        return describe(&state, args.open_map, &mut map_opened);
    }

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);
    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                emit(&describe(&state, args.open_map, &mut map_opened)?);
            }
            _ = &mut interrupted => break,
        }
    }
    view.close();
    describe(&view.state(), false, &mut map_opened)
}

/// Wait past `Loading` to the first poll outcome.
async fn first_settled(states: &mut watch::Receiver<TrackingState>) -> TrackingState {
    loop {
        if states.changed().await.is_err() {
            return states.borrow().clone();
        }
        let state = states.borrow_and_update().clone();
        if state != TrackingState::Loading {
            return state;
        }
    }
}

fn describe(state: &TrackingState, open_map: bool, map_opened: &mut bool) -> Result<Value, String> {
    let maps = state.snapshot().and_then(MapLinks::for_snapshot);
    if open_map && !*map_opened {
        if let Some(links) = &maps {
            match open_in_browser(&links.google) {
                Ok(()) => *map_opened = true,
                Err(e) => warn!(error = %e, "could not open map"),
            }
        }
    }
    Ok(json!({
        "tracking": to_json(state)?,
        "maps": to_json(&maps)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests_support;
    use crate::testing::FakeTransport;
    use reqwest::Method;
    use std::sync::Arc;

    fn signed_in(fake: &Arc<FakeTransport>) -> Storefront {
        fake.respond(Method::GET, "/api/auth/me", json!({ "_id": "u1", "name": "Asha" }));
        fake.respond(Method::GET, "/api/cart", json!({ "items": [], "totalItems": 0 }));
        fake.respond(Method::GET, "/api/wishlist", json!({ "products": [] }));
        tests_support::shop(fake, Some("tok"))
    }

    #[tokio::test]
    async fn list_adds_order_number_and_trackable_flag() {
        let fake = Arc::new(FakeTransport::new());
        let shop = signed_in(&fake);
        fake.respond(
            Method::GET,
            "/api/orders",
            json!([{ "_id": "665f1c2e9b1d4a0012ab34cd", "orderStatus": "shipped" }]),
        );
        shop.initialize().await.unwrap();

        let out = list(&shop).await.unwrap();
        assert_eq!(out[0]["orderNumber"], json!("12AB34CD"));
        assert_eq!(out[0]["trackable"], json!(true));
    }

    #[tokio::test(start_paused = true)]
    async fn track_once_returns_first_live_snapshot_with_map_links() {
        let fake = Arc::new(FakeTransport::new());
        let shop = signed_in(&fake);
        fake.respond(
            Method::GET,
            "/api/delivery/orders/o1/tracking",
            json!({
                "deliveryStatus": "in-transit",
                "location": { "latitude": 12.97, "longitude": 77.59 }
            }),
        );
        shop.initialize().await.unwrap();

        let out = track(
            &shop,
            TrackArgs {
                order_id: "o1".into(),
                follow: false,
                open_map: false,
            },
        )
        .await
        .unwrap();
        assert_eq!(out["tracking"]["state"], json!("live"));
        assert!(out["maps"]["google"]
            .as_str()
            .unwrap()
            .starts_with("https://www.google.com/maps?q=12.97,77.59"));
    }
}
