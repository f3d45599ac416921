//! Session lifecycle: login, register, logout and restore on start.
//!
//! The session owns the durable access token. Every other store reads
//! [`SessionStore::subscribe`] to learn when the user signs in or out.

use serde_json::{json, Value};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::error::{ApiError, StoreError, StoreResult};
use crate::models::{Role, User};
use crate::storage::TokenStore;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const DELIVERY_ACCESS_DENIED: &str = "This account is not authorized for delivery access";

/// Where a freshly signed-in user lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Home {
    Shop,
    DeliveryDashboard,
}

/// Landing flow for a role. Admins shop like regular users.
pub fn home_for(role: Role) -> Home {
    match role {
        Role::Delivery => Home::DeliveryDashboard,
        _ => Home::Shop,
    }
}

pub struct SessionStore {
    api: Arc<ApiClient>,
    tokens: Arc<dyn TokenStore>,
    user: Mutex<Option<User>>,
    auth_tx: watch::Sender<bool>,
}

impl SessionStore {
    pub fn new(api: Arc<ApiClient>, tokens: Arc<dyn TokenStore>) -> Self {
        let (auth_tx, _) = watch::channel(false);
        Self {
            api,
            tokens,
            user: Mutex::new(None),
            auth_tx,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        *self.auth_tx.borrow()
    }

    pub fn current_user(&self) -> Option<User> {
        self.user
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Receiver that yields the auth flag whenever it changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.auth_tx.subscribe()
    }

    fn set_user(&self, user: Option<User>) {
        *self.user.lock().unwrap_or_else(PoisonError::into_inner) = user;
    }

    fn set_authenticated(&self, authenticated: bool) {
        self.auth_tx.send_if_modified(|current| {
            if *current == authenticated {
                false
            } else {
                *current = authenticated;
                true
            }
        });
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Load a persisted token and validate it against the backend.
    ///
    /// 401/404 on the current-user check drops the token. Any other failure
    /// keeps it so an offline start stays signed in.
    pub async fn restore(&self) -> StoreResult<bool> {
        let Some(token) = self.tokens.load() else {
            info!("no persisted session");
            self.set_authenticated(false);
            return Ok(false);
        };
        self.api.set_token(&token);

        match self.fetch_current_user().await {
            Ok(user) => {
                info!(user_id = %user.id, role = ?user.role, "session restored");
                self.set_user(Some(user));
                self.set_authenticated(true);
                Ok(true)
            }
            Err(StoreError::Api(e)) if e.is_auth_expiry() => {
                warn!(error = %e, "persisted token rejected, signing out");
                self.drop_session();
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "could not validate persisted token, keeping session");
                self.set_authenticated(true);
                Ok(true)
            }
        }
    }

    /// The user is `None` when the backend issued a token but the profile
    /// could not be loaded.
    pub async fn login(&self, email: &str, password: &str) -> StoreResult<Option<User>> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(StoreError::validation("Please fill all fields"));
        }

        let response = self
            .api
            .post(
                "/api/auth/login",
                Some(json!({ "email": email, "password": password })),
            )
            .await?;
        self.start_session(&response).await
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> StoreResult<Option<User>> {
        validate_registration(name, email, password, confirm_password)?;

        let response = self
            .api
            .post(
                "/api/auth/register",
                Some(json!({
                    "name": name.trim(),
                    "email": email.trim(),
                    "password": password,
                })),
            )
            .await?;
        self.start_session(&response).await
    }

    /// Sign in on the delivery-partner surface. Non-delivery accounts, and
    /// accounts whose role could not be loaded, are signed straight back out.
    pub async fn login_delivery_partner(&self, email: &str, password: &str) -> StoreResult<User> {
        match self.login(email, password).await? {
            Some(user) if user.role == Role::Delivery => Ok(user),
            other => {
                warn!(role = ?other.map(|u| u.role), "delivery login refused");
                self.logout();
                Err(StoreError::Forbidden(DELIVERY_ACCESS_DENIED.to_string()))
            }
        }
    }

    /// Always succeeds: local state is cleared even when storage fails.
    pub fn logout(&self) {
        self.drop_session();
        info!("signed out");
    }

    fn drop_session(&self) {
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "failed to clear persisted token");
        }
        self.api.clear_token();
        self.set_user(None);
        self.set_authenticated(false);
    }

    /// Persist and attach the issued token. Only an auth rejection of the
    /// follow-up profile check undoes the sign-in.
    async fn start_session(&self, response: &Value) -> StoreResult<Option<User>> {
        let token = response
            .get("accessToken")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApiError::InvalidJson("response has no accessToken".into()))?;

        self.tokens.save(token).map_err(StoreError::Storage)?;
        self.api.set_token(token);

        let user = match self.fetch_current_user().await {
            Ok(user) => Some(user),
            Err(StoreError::Api(e)) if e.is_auth_expiry() => {
                warn!(error = %e, "issued token rejected, signing out");
                self.drop_session();
                return Err(e.into());
            }
            Err(e) => {
                let fallback = response
                    .get("user")
                    .cloned()
                    .and_then(|v| serde_json::from_value::<User>(v).ok());
                warn!(error = %e, from_response = fallback.is_some(), "profile unavailable after sign-in");
                fallback
            }
        };

        match &user {
            Some(u) => info!(user_id = %u.id, role = ?u.role, "signed in"),
            None => info!("signed in without profile"),
        }
        self.set_user(user.clone());
        self.set_authenticated(true);
        Ok(user)
    }

    /// `GET /api/auth/me`; accepts a bare user or `{ user: {...} }`.
    pub async fn fetch_current_user(&self) -> StoreResult<User> {
        let value = self.api.get("/api/auth/me").await?;
        let body = value.get("user").cloned().unwrap_or(value);
        serde_json::from_value(body)
            .map_err(|e| StoreError::Api(ApiError::InvalidJson(e.to_string())))
    }
}

pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> StoreResult<()> {
    if name.trim().is_empty()
        || email.trim().is_empty()
        || password.is_empty()
        || confirm_password.is_empty()
    {
        return Err(StoreError::validation("Please fill all fields"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(StoreError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password != confirm_password {
        return Err(StoreError::validation("Passwords do not match"));
    }
    Ok(())
}
