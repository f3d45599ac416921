use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{require_login, to_json, user_error};
use crate::delivery::{navigation_url, DeliveryDashboard};
use crate::error::StoreError;
use crate::geo::{DeniedLocator, DeviceLocator, FixedLocator, IpLocator};
use crate::models::{Order, Role};
use crate::session::DELIVERY_ACCESS_DENIED;
use crate::storefront::Storefront;

#[derive(Debug, Subcommand)]
pub enum DeliveryCommand {
    /// Sign in as a delivery partner.
    Login(super::auth::LoginArgs),
    /// Available and active deliveries.
    List,
    Accept { order_id: String },
    /// Pick up an order and share your position once (or until interrupted
    /// with --follow).
    Start(StartArgs),
    Complete { order_id: String },
}

const FIRST_PUSH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Args)]
pub struct StartArgs {
    pub order_id: String,
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,
    /// Keep pushing the position until interrupted.
    #[arg(long)]
    pub follow: bool,
}

impl StartArgs {
    fn locator(&self) -> Arc<dyn DeviceLocator> {
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            return Arc::new(FixedLocator::new(lat, lon));
        }
        match IpLocator::new() {
            Ok(locator) => Arc::new(locator),
            Err(e) => {
                warn!(error = %e, "no locator available, position will not be shared");
                Arc::new(DeniedLocator)
            }
        }
    }
}

pub async fn run(shop: &Storefront, cmd: DeliveryCommand) -> Result<Value, String> {
    match cmd {
        DeliveryCommand::Login(args) => {
            let user = shop
                .session
                .login_delivery_partner(&args.email, &args.password)
                .await
                .map_err(user_error)?;
            Ok(json!({ "user": to_json(&user)?, "home": "delivery-dashboard" }))
        }
        DeliveryCommand::List => {
            require_partner(shop)?;
            let dashboard = shop.delivery(Arc::new(DeniedLocator));
            dashboard.refresh().await.map_err(user_error)?;
            board(&dashboard)
        }
        DeliveryCommand::Accept { order_id } => {
            require_partner(shop)?;
            let dashboard = shop.delivery(Arc::new(DeniedLocator));
            dashboard.accept(&order_id).await.map_err(user_error)?;
            board(&dashboard)
        }
        DeliveryCommand::Complete { order_id } => {
            require_partner(shop)?;
            let dashboard = shop.delivery(Arc::new(DeniedLocator));
            dashboard.complete(&order_id).await.map_err(user_error)?;
            board(&dashboard)
        }
        DeliveryCommand::Start(args) => {
            require_partner(shop)?;
            start(shop, args).await
        }
    }
}

fn require_partner(shop: &Storefront) -> Result<(), String> {
    require_login(shop)?;
    match shop.session.current_user() {
        Some(user) if user.role == Role::Delivery => Ok(()),
        _ => Err(user_error(StoreError::Forbidden(DELIVERY_ACCESS_DENIED.to_string()))),
    }
}

async fn start(shop: &Storefront, args: StartArgs) -> Result<Value, String> {
    let dashboard = shop.delivery(args.locator());
    dashboard
        .start_delivery(&args.order_id)
        .await
        .map_err(user_error)?;

    if !dashboard.is_pushing_location() {
        return board(&dashboard);
    }
    let shared = match tokio::time::timeout(FIRST_PUSH_TIMEOUT, dashboard.first_location_push()).await {
        Ok(sent) => sent,
        Err(_) => {
            warn!(order_id = %args.order_id, "first location push timed out");
            false
        }
    };
    if args.follow {
        info!(order_id = %args.order_id, "sharing location until interrupted");
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "could not listen for interrupt");
        }
    }
    dashboard.stop_location_push();

    let mut out = board(&dashboard)?;
    out["locationShared"] = json!(shared);
    Ok(out)
}

fn with_navigation(order: &Order) -> Result<Value, String> {
    let mut entry = to_json(order)?;
    if !order.address.address.trim().is_empty() {
        entry["navigationUrl"] = json!(navigation_url(&order.address));
    }
    Ok(entry)
}

fn board(dashboard: &DeliveryDashboard) -> Result<Value, String> {
    let available = dashboard
        .available()
        .iter()
        .map(to_json)
        .collect::<Result<Vec<_>, _>>()?;
    let active = dashboard
        .active()
        .iter()
        .map(with_navigation)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({
        "available": available,
        "active": active,
        "locationPushing": dashboard.is_pushing_location(),
    }))
}
