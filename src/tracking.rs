//! Delivery tracking for a customer order.
//!
//! While a tracking view is open the backend is polled on a fixed interval.
//! At most one poll task exists per view: opening another order stops the
//! previous task before the new one starts.

use reqwest::Url;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::catalog::decode_one;
use crate::models::{Coordinates, TrackingSnapshot};
use crate::task::PeriodicTask;

const MAP_URL_MAX_LEN: usize = 2048;
const ALLOWED_MAP_HOSTS: &[&str] = &[
    "google.com",
    "www.google.com",
    "maps.google.com",
    "openstreetmap.org",
    "www.openstreetmap.org",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "snapshot", rename_all = "lowercase")]
pub enum TrackingState {
    Closed,
    Loading,
    /// A location is known.
    Live(TrackingSnapshot),
    /// The last poll failed; the snapshot is from an earlier one.
    Stale(TrackingSnapshot),
    /// The delivery person has not reported a location yet.
    Unavailable(TrackingSnapshot),
}

impl TrackingState {
    pub fn snapshot(&self) -> Option<&TrackingSnapshot> {
        match self {
            TrackingState::Live(s) | TrackingState::Stale(s) | TrackingState::Unavailable(s) => {
                Some(s)
            }
            TrackingState::Closed | TrackingState::Loading => None,
        }
    }

    /// Next state after a poll. A failed poll keeps whatever was shown.
    pub fn after_poll(&self, polled: Option<TrackingSnapshot>) -> TrackingState {
        match polled {
            Some(snapshot) if snapshot.location.is_some() => TrackingState::Live(snapshot),
            Some(snapshot) => TrackingState::Unavailable(snapshot),
            None => match self.snapshot() {
                Some(held) => TrackingState::Stale(held.clone()),
                None => self.clone(),
            },
        }
    }
}

struct ActivePoll {
    order_id: String,
    task: PeriodicTask,
}

pub struct TrackingView {
    api: Arc<ApiClient>,
    interval: Duration,
    state_tx: Arc<watch::Sender<TrackingState>>,
    generation: Arc<AtomicU64>,
    active: Mutex<Option<ActivePoll>>,
}

impl TrackingView {
    pub fn new(api: Arc<ApiClient>, interval: Duration) -> Self {
        let (state_tx, _) = watch::channel(TrackingState::Closed);
        Self {
            api,
            interval,
            state_tx: Arc::new(state_tx),
            generation: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
        }
    }

    pub fn state(&self) -> TrackingState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackingState> {
        self.state_tx.subscribe()
    }

    pub fn active_order(&self) -> Option<String> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|a| a.order_id.clone())
    }

    pub fn is_polling(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|a| a.task.is_running())
            .unwrap_or(false)
    }

    /// Start tracking `order_id`, replacing any order being tracked.
    pub fn open(&self, order_id: &str) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = active.take() {
            previous.task.stop();
            debug!(order_id = %previous.order_id, "tracking poll replaced");
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state_tx.send_replace(TrackingState::Loading);

        let api = self.api.clone();
        let state_tx = self.state_tx.clone();
        let current = self.generation.clone();
        let path = format!("/api/delivery/orders/{order_id}/tracking");
        let task_order = order_id.to_string();

        let task = PeriodicTask::spawn(
            format!("tracking:{order_id}"),
            self.interval,
            move || {
                let api = api.clone();
                let state_tx = state_tx.clone();
                let current = current.clone();
                let path = path.clone();
                let order_id = task_order.clone();
                async move {
                    let polled = match api.get(&path).await {
                        Ok(value) => match decode_one::<TrackingSnapshot>(value) {
                            Ok(snapshot) => Some(snapshot),
                            Err(e) => {
                                warn!(order_id = %order_id, error = %e, "tracking payload rejected");
                                None
                            }
                        },
                        Err(e) => {
                            debug!(order_id = %order_id, error = %e, "tracking poll skipped");
                            None
                        }
                    };
                    state_tx.send_if_modified(|state| {
                        if current.load(Ordering::SeqCst) != generation {
                            return false;
                        }
                        let next = state.after_poll(polled);
                        if *state == next {
                            return false;
                        }
                        *state = next;
                        true
                    });
                }
            },
        );

        info!(order_id, interval_ms = self.interval.as_millis() as u64, "tracking opened");
        *active = Some(ActivePoll {
            order_id: order_id.to_string(),
            task,
        });
    }

    /// Stop polling. Closing a closed view is a no-op.
    pub fn close(&self) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = active.take() {
            previous.task.stop();
            info!(order_id = %previous.order_id, "tracking closed");
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state_tx.send_if_modified(|state| {
            if *state == TrackingState::Closed {
                false
            } else {
                *state = TrackingState::Closed;
                true
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Map hand-off
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLinks {
    pub google: String,
    pub openstreetmap: String,
}

impl MapLinks {
    pub fn for_location(at: Coordinates) -> Self {
        Self {
            google: format!(
                "https://www.google.com/maps?q={},{}",
                at.latitude, at.longitude
            ),
            openstreetmap: format!(
                "https://www.openstreetmap.org/?mlat={}&mlon={}&zoom=15",
                at.latitude, at.longitude
            ),
        }
    }

    pub fn for_snapshot(snapshot: &TrackingSnapshot) -> Option<Self> {
        snapshot
            .location
            .as_ref()
            .map(|l| Self::for_location(l.coordinates()))
    }
}

/// Only https links to the known map providers may be handed to the browser.
pub fn validate_map_url(url_raw: &str) -> Result<Url, String> {
    let trimmed = url_raw.trim();
    if trimmed.is_empty() {
        return Err("Map URL cannot be empty".into());
    }
    if trimmed.len() > MAP_URL_MAX_LEN {
        return Err("Map URL is too long".into());
    }

    let parsed = Url::parse(trimmed).map_err(|e| format!("Invalid map URL: {e}"))?;
    if parsed.scheme() != "https" {
        return Err("Only https map URLs are allowed".into());
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err("Credentialed URLs are not allowed".into());
    }
    let host = parsed
        .host_str()
        .ok_or("Map URL is missing a host")?
        .to_ascii_lowercase();
    if !ALLOWED_MAP_HOSTS.contains(&host.as_str()) {
        return Err(format!("Map host is not allowlisted: {host}"));
    }
    Ok(parsed)
}

pub fn open_in_browser(url: &str) -> Result<(), String> {
    let parsed = validate_map_url(url)?;
    webbrowser::open(parsed.as_str()).map_err(|e| format!("Failed to open browser: {e}"))?;
    info!(host = parsed.host_str().unwrap_or(""), "map opened in browser");
    Ok(())
}
