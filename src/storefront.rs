//! Composition root: builds the shared client and every store, and keeps the
//! per-user collections in step with the session.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, HttpTransport, Transport};
use crate::cart::CartStore;
use crate::catalog::CatalogService;
use crate::checkout::CheckoutFlow;
use crate::config::Config;
use crate::delivery::DeliveryDashboard;
use crate::error::{ApiError, StoreResult};
use crate::geo::DeviceLocator;
use crate::orders::OrdersService;
use crate::session::SessionStore;
use crate::storage::TokenStore;
use crate::tracking::TrackingView;
use crate::wishlist::WishlistStore;

pub struct Storefront {
    config: Config,
    api: Arc<ApiClient>,
    pub session: Arc<SessionStore>,
    pub cart: Arc<CartStore>,
    pub wishlist: Arc<WishlistStore>,
    pub catalog: Arc<CatalogService>,
    pub orders: Arc<OrdersService>,
    auth_watch: Mutex<Option<JoinHandle<()>>>,
}

impl Storefront {
    pub fn new(config: Config, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(&config.base_url, config.request_timeout)?;
        info!(base_url = %transport.base_url(), "storefront backend configured");
        Ok(Self::with_transport(config, Arc::new(transport), tokens))
    }

    pub fn with_transport(
        config: Config,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let api = Arc::new(ApiClient::new(transport));
        Self {
            session: Arc::new(SessionStore::new(api.clone(), tokens)),
            cart: Arc::new(CartStore::new(api.clone())),
            wishlist: Arc::new(WishlistStore::new(api.clone())),
            catalog: Arc::new(CatalogService::new(api.clone())),
            orders: Arc::new(OrdersService::new(api.clone())),
            api,
            config,
            auth_watch: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Restore the session, load the user's collections, then follow later
    /// sign-in/sign-out transitions.
    pub async fn initialize(&self) -> StoreResult<bool> {
        let signed_in = self.session.restore().await?;
        sync_collections(&self.cart, &self.wishlist, signed_in).await;
        self.watch_auth();
        Ok(signed_in)
    }

    fn watch_auth(&self) {
        let mut guard = self.auth_watch.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return;
        }
        let mut auth = self.session.subscribe();
        auth.mark_unchanged();
        let cart = self.cart.clone();
        let wishlist = self.wishlist.clone();
        *guard = Some(tokio::spawn(async move {
            while auth.changed().await.is_ok() {
                let signed_in = *auth.borrow_and_update();
                debug!(signed_in, "auth state changed");
                sync_collections(&cart, &wishlist, signed_in).await;
            }
        }));
    }

    pub fn checkout(&self) -> CheckoutFlow {
        CheckoutFlow::new(self.api.clone(), self.cart.clone())
    }

    pub fn tracking(&self) -> TrackingView {
        TrackingView::new(self.api.clone(), self.config.tracking_interval)
    }

    pub fn delivery(&self, locator: Arc<dyn DeviceLocator>) -> DeliveryDashboard {
        DeliveryDashboard::new(self.api.clone(), locator, self.config.location_push_interval)
    }

    pub fn shutdown(&self) {
        if let Some(handle) = self
            .auth_watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl Drop for Storefront {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Signed in: re-read cart and wishlist. Signed out: forget them.
pub async fn sync_collections(cart: &CartStore, wishlist: &WishlistStore, signed_in: bool) {
    if !signed_in {
        cart.reset();
        wishlist.reset();
        return;
    }
    let (cart_result, wishlist_result) = tokio::join!(cart.refresh(), wishlist.refresh());
    if let Err(e) = cart_result {
        warn!(error = %e, "cart refresh after sign-in failed");
    }
    if let Err(e) = wishlist_result {
        warn!(error = %e, "wishlist refresh after sign-in failed");
    }
}
