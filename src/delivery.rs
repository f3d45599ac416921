//! Delivery-partner dashboard and live location push.
//!
//! Assignments move `unassigned → accepted → in-transit → delivered`, one
//! explicit action at a time. While a delivery is in transit the partner's
//! position is posted on a fixed interval.

use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{path_with_query, ApiClient};
use crate::catalog::decode_list;
use crate::error::{LocationError, StoreError, StoreResult};
use crate::geo::{locate, DeviceLocator};
use crate::models::{Address, DeliveryStatus, Order};
use crate::task::PeriodicTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryAction {
    Accept,
    StartDelivery,
    Complete,
}

impl DeliveryAction {
    fn endpoint(self) -> &'static str {
        match self {
            DeliveryAction::Accept => "accept",
            DeliveryAction::StartDelivery => "start-delivery",
            DeliveryAction::Complete => "complete",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            DeliveryAction::Accept => "accept",
            DeliveryAction::StartDelivery => "start",
            DeliveryAction::Complete => "complete",
        }
    }

    pub fn allowed_from(self, status: Option<DeliveryStatus>) -> bool {
        matches!(
            (self, status),
            (DeliveryAction::Accept, None)
                | (DeliveryAction::Accept, Some(DeliveryStatus::Assigned))
                | (DeliveryAction::StartDelivery, Some(DeliveryStatus::Accepted))
                | (DeliveryAction::Complete, Some(DeliveryStatus::InTransit))
        )
    }
}

fn status_label(status: Option<DeliveryStatus>) -> &'static str {
    status.map(|s| s.as_str()).unwrap_or("unassigned")
}

/// Google Maps search for the drop-off address.
pub fn navigation_url(address: &Address) -> String {
    let query = path_with_query(
        "/maps/search/",
        &[("api", "1".to_string()), ("query", address.one_line())],
    );
    format!("https://www.google.com{query}")
}

// ---------------------------------------------------------------------------
// Location push
// ---------------------------------------------------------------------------

/// Posts the device position to the backend: once immediately, then every
/// interval until stopped. A tick without permission or a fix is skipped.
pub struct LocationPusher {
    task: PeriodicTask,
    last_push: watch::Receiver<Option<bool>>,
}

impl LocationPusher {
    pub fn start(api: Arc<ApiClient>, locator: Arc<dyn DeviceLocator>, interval: Duration) -> Self {
        let (pushed_tx, last_push) = watch::channel(None);
        let pushed_tx = Arc::new(pushed_tx);
        let task = PeriodicTask::spawn("location-push", interval, move || {
            let api = api.clone();
            let locator = locator.clone();
            let pushed_tx = pushed_tx.clone();
            async move {
                let sent = push_once(&api, locator.as_ref()).await;
                pushed_tx.send_replace(Some(sent));
            }
        });
        Self { task, last_push }
    }

    /// Outcome of the most recent tick, `None` before the first one ends.
    pub fn last_push(&self) -> Option<bool> {
        *self.last_push.borrow()
    }

    /// Wait for the first tick to finish. `false` when it skipped or failed,
    /// or when the task stopped first.
    pub async fn first_push(&self) -> bool {
        first_outcome(self.last_push.clone()).await
    }

    pub fn stop(&self) {
        self.task.stop();
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    pub async fn shutdown(self) {
        self.task.shutdown().await;
    }
}

async fn first_outcome(mut rx: watch::Receiver<Option<bool>>) -> bool {
    match rx.wait_for(Option::is_some).await {
        Ok(outcome) => (*outcome).unwrap_or(false),
        Err(_) => false,
    }
}

async fn push_once(api: &ApiClient, locator: &dyn DeviceLocator) -> bool {
    let at = match locate(locator).await {
        Ok(at) => at,
        Err(LocationError::PermissionDenied) => {
            debug!("location push skipped: permission denied");
            return false;
        }
        Err(e) => {
            warn!(error = %e, "location push skipped");
            return false;
        }
    };
    let body = json!({ "latitude": at.latitude, "longitude": at.longitude });
    match api.post("/api/delivery/location", Some(body)).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "location push failed");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

pub struct DeliveryDashboard {
    api: Arc<ApiClient>,
    locator: Arc<dyn DeviceLocator>,
    push_interval: Duration,
    orders: Mutex<Vec<Order>>,
    pusher: Mutex<Option<LocationPusher>>,
}

impl DeliveryDashboard {
    pub fn new(api: Arc<ApiClient>, locator: Arc<dyn DeviceLocator>, push_interval: Duration) -> Self {
        Self {
            api,
            locator,
            push_interval,
            orders: Mutex::new(Vec::new()),
            pusher: Mutex::new(None),
        }
    }

    fn lock_orders(&self) -> MutexGuard<'_, Vec<Order>> {
        self.orders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pusher(&self) -> MutexGuard<'_, Option<LocationPusher>> {
        self.pusher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn orders(&self) -> Vec<Order> {
        self.lock_orders().clone()
    }

    /// Orders nobody has picked up yet.
    pub fn available(&self) -> Vec<Order> {
        self.lock_orders()
            .iter()
            .filter(|o| !o.assignment().is_assigned())
            .cloned()
            .collect()
    }

    /// Orders assigned to this partner that are not delivered yet.
    pub fn active(&self) -> Vec<Order> {
        self.lock_orders()
            .iter()
            .filter(|o| o.assignment().is_open())
            .cloned()
            .collect()
    }

    pub fn is_pushing_location(&self) -> bool {
        self.lock_pusher()
            .as_ref()
            .map(LocationPusher::is_running)
            .unwrap_or(false)
    }

    pub async fn refresh(&self) -> StoreResult<Vec<Order>> {
        let value = self.api.get("/api/delivery/orders").await?;
        let orders: Vec<Order> = decode_list(value)?;
        let in_transit = orders
            .iter()
            .any(|o| o.delivery_status == Some(DeliveryStatus::InTransit));
        *self.lock_orders() = orders.clone();
        if !in_transit {
            self.stop_location_push();
        }
        debug!(count = orders.len(), "delivery orders refreshed");
        Ok(orders)
    }

    pub async fn accept(&self, order_id: &str) -> StoreResult<Vec<Order>> {
        self.perform(order_id, DeliveryAction::Accept).await
    }

    pub async fn start_delivery(&self, order_id: &str) -> StoreResult<Vec<Order>> {
        self.perform(order_id, DeliveryAction::StartDelivery).await
    }

    pub async fn complete(&self, order_id: &str) -> StoreResult<Vec<Order>> {
        self.perform(order_id, DeliveryAction::Complete).await
    }

    async fn perform(&self, order_id: &str, action: DeliveryAction) -> StoreResult<Vec<Order>> {
        let known = self.lock_orders().iter().find(|o| o.id == order_id).cloned();
        let order = match known {
            Some(order) => order,
            None => self
                .refresh()
                .await?
                .into_iter()
                .find(|o| o.id == order_id)
                .ok_or_else(|| StoreError::validation(format!("Order {order_id} not found")))?,
        };
        if !action.allowed_from(order.delivery_status) {
            return Err(StoreError::InvalidTransition {
                action: action.verb().to_string(),
                status: status_label(order.delivery_status).to_string(),
            });
        }

        self.api
            .post(
                &format!("/api/delivery/orders/{order_id}/{}", action.endpoint()),
                None,
            )
            .await?;
        info!(order_id, action = action.endpoint(), "delivery status updated");

        match action {
            DeliveryAction::StartDelivery => self.start_location_push(),
            DeliveryAction::Complete => self.stop_location_push(),
            DeliveryAction::Accept => {}
        }
        self.refresh().await
    }

    fn start_location_push(&self) {
        let mut pusher = self.lock_pusher();
        if pusher.as_ref().map(LocationPusher::is_running).unwrap_or(false) {
            return;
        }
        *pusher = Some(LocationPusher::start(
            self.api.clone(),
            self.locator.clone(),
            self.push_interval,
        ));
        info!(interval_ms = self.push_interval.as_millis() as u64, "location push started");
    }

    /// Wait for the running pusher's first tick. `false` when nothing is
    /// pushing or the first position could not be sent.
    pub async fn first_location_push(&self) -> bool {
        let last_push = self.lock_pusher().as_ref().map(|p| p.last_push.clone());
        match last_push {
            Some(rx) => first_outcome(rx).await,
            None => false,
        }
    }

    /// Stopping an idle pusher is a no-op.
    pub fn stop_location_push(&self) {
        if let Some(pusher) = self.lock_pusher().take() {
            pusher.stop();
            info!("location push stopped");
        }
    }
}
