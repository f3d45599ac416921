//! CLI command handlers.
//!
//! Each handler delegates to the stores on [`Storefront`] and returns the
//! JSON document printed to stdout, or a user-facing error message.

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;
use crate::storefront::Storefront;

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod delivery;
pub mod orders;
pub mod wishlist;

#[derive(Debug, Parser)]
#[command(name = "ktl", version, about = "KTL fresh-goods storefront")]
pub struct Cli {
    /// Backend base URL (overrides KTL_API_BASE_URL).
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Emit compact single-line JSON.
    #[arg(long, global = true)]
    pub compact: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in with email and password.
    Login(auth::LoginArgs),
    /// Create a customer account.
    Register(auth::RegisterArgs),
    /// Forget the stored session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Version, platform and configuration.
    About,
    /// List products, optionally in one category.
    Products(catalog::ProductsArgs),
    /// Show one product with its similar products.
    Product(catalog::ProductArgs),
    /// List categories.
    Categories(catalog::CategoriesArgs),
    /// List stores.
    Stores,
    /// Search products, categories and stores.
    Search(catalog::SearchArgs),
    #[command(subcommand)]
    Cart(cart::CartCommand),
    #[command(subcommand)]
    Wishlist(wishlist::WishlistCommand),
    /// Place an order for the current cart.
    Checkout(checkout::CheckoutArgs),
    /// List your orders.
    Orders,
    /// Live position of an order in transit.
    Track(orders::TrackArgs),
    #[command(subcommand)]
    Delivery(delivery::DeliveryCommand),
}

pub async fn dispatch(shop: &Storefront, command: Command) -> Result<Value, String> {
    match command {
        Command::Login(args) => auth::login(shop, args).await,
        Command::Register(args) => auth::register(shop, args).await,
        Command::Logout => auth::logout(shop),
        Command::Whoami => auth::whoami(shop).await,
        Command::About => Ok(crate::diagnostics::get_about_info(shop.config())),
        Command::Products(args) => catalog::products(shop, args).await,
        Command::Product(args) => catalog::product(shop, args).await,
        Command::Categories(args) => catalog::categories(shop, args).await,
        Command::Stores => catalog::stores(shop).await,
        Command::Search(args) => catalog::search(shop, args).await,
        Command::Cart(cmd) => cart::run(shop, cmd).await,
        Command::Wishlist(cmd) => wishlist::run(shop, cmd).await,
        Command::Checkout(args) => checkout::run(shop, args).await,
        Command::Orders => orders::list(shop).await,
        Command::Track(args) => orders::track(shop, args).await,
        Command::Delivery(cmd) => delivery::run(shop, cmd).await,
    }
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| format!("Failed to encode response: {e}"))
}

pub(crate) fn user_error(err: StoreError) -> String {
    err.user_message()
}

pub(crate) fn require_login(shop: &Storefront) -> Result<(), String> {
    if shop.session.is_authenticated() {
        Ok(())
    } else {
        Err(user_error(StoreError::NotAuthenticated))
    }
}

/// Print one JSON document per line for streaming commands.
pub(crate) fn emit(value: &Value) {
    println!("{value}");
}
