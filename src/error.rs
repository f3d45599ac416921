//! Error types shared by the stores and the network boundary.

use thiserror::Error;

/// Fallback shown when the backend gives no usable message.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("{0}")]
    Network(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("Invalid JSON from storefront backend: {0}")]
    InvalidJson(String),

    #[error("Invalid storefront URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// A failed current-user check with one of these codes means the token
    /// is stale and the session must be dropped.
    pub fn is_auth_expiry(&self) -> bool {
        matches!(self.status(), Some(401) | Some(404))
    }

    /// The wishlist endpoint answers 400 "... already ..." for duplicates.
    pub fn is_already_present(&self) -> bool {
        match self {
            ApiError::Status { status: 400, message } => {
                message.to_ascii_lowercase().contains("already")
            }
            _ => false,
        }
    }

    /// Message suitable for an alert: the backend's own text when it sent
    /// one, otherwise the generic fallback.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { message, .. } if !message.trim().is_empty() => message.clone(),
            ApiError::Network(m) | ApiError::Timeout(m) => m.clone(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Could not fetch address. Please enter manually.")]
    AddressNotFound,

    #[error("Failed to get location. Please try again. ({0})")]
    Failed(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error("Another update for this item is still in progress")]
    MutationPending,

    #[error("Please login to continue")]
    NotAuthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("Cannot {action} a delivery that is {status}")]
    InvalidTransition { action: String, status: String },
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }

    pub fn user_message(&self) -> String {
        match self {
            StoreError::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
