//! Device location and reverse geocoding.
//!
//! A [`DeviceLocator`] provides coordinates (after a permission check), and a
//! [`ReverseGeocoder`] turns them into a postal address for checkout.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::LocationError;
use crate::models::Coordinates;

const IP_LOOKUP_TIMEOUT: Duration = Duration::from_secs(8);
pub const IP_PROVIDERS: [&str; 2] = ["https://ipapi.co/json/", "https://ipwho.is/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

#[async_trait]
pub trait DeviceLocator: Send + Sync {
    async fn request_permission(&self) -> Permission;
    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// Permission check followed by a position fix.
pub async fn locate(locator: &dyn DeviceLocator) -> Result<Coordinates, LocationError> {
    if locator.request_permission().await != Permission::Granted {
        info!("location permission denied");
        return Err(LocationError::PermissionDenied);
    }
    locator.current_position().await
}

// ---------------------------------------------------------------------------
// Locators
// ---------------------------------------------------------------------------

/// Coordinates supplied up front (command-line flags, tests).
#[derive(Debug, Clone, Copy)]
pub struct FixedLocator(pub Coordinates);

impl FixedLocator {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self(Coordinates {
            latitude,
            longitude,
        })
    }
}

#[async_trait]
impl DeviceLocator for FixedLocator {
    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

/// A device on which the user refused location access.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeniedLocator;

#[async_trait]
impl DeviceLocator for DeniedLocator {
    async fn request_permission(&self) -> Permission {
        Permission::Denied
    }

    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Err(LocationError::PermissionDenied)
    }
}

/// Coarse position from the public IP, primary provider then fallback.
pub struct IpLocator {
    client: Client,
    providers: Vec<String>,
}

impl IpLocator {
    pub fn new() -> Result<Self, LocationError> {
        let client = Client::builder()
            .timeout(IP_LOOKUP_TIMEOUT)
            .build()
            .map_err(|e| LocationError::Failed(format!("HTTP client error: {e}")))?;
        Ok(Self {
            client,
            providers: IP_PROVIDERS.iter().map(|p| p.to_string()).collect(),
        })
    }
}

#[async_trait]
impl DeviceLocator for IpLocator {
    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        for provider in &self.providers {
            let resp = match self.client.get(provider).send().await {
                Ok(resp) if resp.status().is_success() => resp,
                Ok(resp) => {
                    debug!(provider = %provider, status = resp.status().as_u16(), "ip lookup rejected");
                    continue;
                }
                Err(e) => {
                    debug!(provider = %provider, error = %e, "ip lookup failed");
                    continue;
                }
            };
            if let Ok(body) = resp.json::<Value>().await {
                if let Some(coords) = coordinates_from(&body) {
                    return Ok(coords);
                }
            }
        }
        warn!("no ip geolocation provider answered");
        Err(LocationError::Failed("no location provider available".into()))
    }
}

fn coordinates_from(body: &Value) -> Option<Coordinates> {
    Some(Coordinates {
        latitude: body.get("latitude").and_then(Value::as_f64)?,
        longitude: body.get("longitude").and_then(Value::as_f64)?,
    })
}

// ---------------------------------------------------------------------------
// Reverse geocoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeocodedAddress {
    pub address: String,
    pub city: String,
    pub pincode: String,
    pub landmark: Option<String>,
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, at: Coordinates) -> Result<GeocodedAddress, LocationError>;
}

pub struct NominatimGeocoder {
    client: Client,
    url: String,
    user_agent: String,
}

impl NominatimGeocoder {
    pub fn new(url: &str, user_agent: &str, timeout: Duration) -> Result<Self, LocationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LocationError::Failed(format!("HTTP client error: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
            user_agent: user_agent.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, LocationError> {
        Self::new(
            &config.geocoder_url,
            &config.geocoder_user_agent,
            config.request_timeout,
        )
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, at: Coordinates) -> Result<GeocodedAddress, LocationError> {
        let result = self
            .client
            .get(&self.url)
            .header("User-Agent", &self.user_agent)
            .query(&[
                ("format", "json".to_string()),
                ("lat", at.latitude.to_string()),
                ("lon", at.longitude.to_string()),
                ("zoom", "18".to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .send()
            .await;

        let body = match result {
            Ok(resp) => resp.json::<Value>().await.ok(),
            Err(e) => {
                warn!(error = %e, "reverse geocoding failed");
                None
            }
        };
        body.as_ref()
            .and_then(address_from_nominatim)
            .ok_or(LocationError::AddressNotFound)
    }
}

/// Street line is house number + road, then suburb and neighbourhood. With
/// none of those the first segment of `display_name` is used.
pub fn address_from_nominatim(body: &Value) -> Option<GeocodedAddress> {
    let addr = body.get("address")?.as_object()?;
    let field = |key: &str| {
        addr.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let mut street = String::new();
    if let Some(house) = field("house_number") {
        street.push_str(house);
        street.push(' ');
    }
    if let Some(road) = field("road") {
        street.push_str(road);
    }
    for key in ["suburb", "neighbourhood"] {
        if let Some(part) = field(key) {
            street.push_str(", ");
            street.push_str(part);
        }
    }
    let mut street = street.trim().to_string();
    if street.is_empty() {
        street = body
            .get("display_name")
            .or_else(|| addr.get("display_name"))
            .and_then(Value::as_str)
            .and_then(|name| name.split(',').next())
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
    }

    let city = ["city", "town", "village", "county"]
        .into_iter()
        .find_map(field)
        .unwrap_or_default()
        .to_string();

    Some(GeocodedAddress {
        address: street,
        city,
        pincode: field("postcode").unwrap_or_default().to_string(),
        landmark: field("landmark").map(str::to_string),
    })
}
