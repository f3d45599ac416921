//! Scripted in-memory backend used by the unit tests.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::api::{ApiRequest, Transport};
use crate::error::{ApiError, LocationError};
use crate::geo::{GeocodedAddress, ReverseGeocoder};
use crate::models::Coordinates;

type Route = (Method, String);

/// Responses are queued per `(method, path)`. The last queued response for a
/// route keeps being returned, so a polled endpoint needs only one entry.
/// Unscripted routes answer 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<Route, VecDeque<Result<Value, ApiError>>>>,
    log: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: Method, path: &str, value: Value) {
        self.push(method, path, Ok(value));
    }

    pub fn fail(&self, method: Method, path: &str, status: u16, message: &str) {
        self.push(
            method,
            path,
            Err(ApiError::Status {
                status,
                message: message.to_string(),
            }),
        );
    }

    pub fn fail_with(&self, method: Method, path: &str, err: ApiError) {
        self.push(method, path, Err(err));
    }

    fn push(&self, method: Method, path: &str, result: Result<Value, ApiError>) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(result);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn last_body(&self, method: Method, path: &str) -> Option<Value> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.method == method && r.path == path)
            .and_then(|r| r.body.clone())
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let route = (request.method.clone(), request.path.clone());
        self.log.lock().unwrap().push(request);

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&route) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if queue.len() == 1 => queue.front().cloned().unwrap(),
            _ => Err(ApiError::Status {
                status: 404,
                message: format!("no fake route for {} {}", route.0, route.1),
            }),
        }
    }
}

/// Geocoder that answers every lookup with the same address, or with
/// `AddressNotFound` when built with `None`.
pub struct StaticGeocoder(pub Option<GeocodedAddress>);

#[async_trait]
impl ReverseGeocoder for StaticGeocoder {
    async fn reverse(&self, _at: Coordinates) -> Result<GeocodedAddress, LocationError> {
        self.0.clone().ok_or(LocationError::AddressNotFound)
    }
}
