use clap::Args;
use serde_json::{json, Value};

use super::{to_json, user_error};
use crate::models::User;
use crate::session::{home_for, validate_registration, Home};
use crate::storefront::Storefront;

#[derive(Debug, Args)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "KTL_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "KTL_PASSWORD", hide_env_values = true)]
    pub password: String,
    /// Defaults to the password when omitted.
    #[arg(long)]
    pub confirm: Option<String>,
}

fn home_label(home: Home) -> &'static str {
    match home {
        Home::Shop => "shop",
        Home::DeliveryDashboard => "delivery-dashboard",
    }
}

pub async fn login(shop: &Storefront, args: LoginArgs) -> Result<Value, String> {
    let user = shop
        .session
        .login(&args.email, &args.password)
        .await
        .map_err(user_error)?;
    signed_in(user)
}

/// Without a loaded profile the user lands on the shop.
fn signed_in(user: Option<User>) -> Result<Value, String> {
    let home = user.as_ref().map(|u| home_for(u.role)).unwrap_or(Home::Shop);
    Ok(json!({
        "user": to_json(&user)?,
        "home": home_label(home),
    }))
}

pub async fn register(shop: &Storefront, args: RegisterArgs) -> Result<Value, String> {
    let confirm = args.confirm.unwrap_or_else(|| args.password.clone());
    validate_registration(&args.name, &args.email, &args.password, &confirm).map_err(user_error)?;
    let user = shop
        .session
        .register(&args.name, &args.email, &args.password, &confirm)
        .await
        .map_err(user_error)?;
    signed_in(user)
}

pub fn logout(shop: &Storefront) -> Result<Value, String> {
    shop.session.logout();
    Ok(json!({ "success": true }))
}

pub async fn whoami(shop: &Storefront) -> Result<Value, String> {
    if !shop.session.is_authenticated() {
        return Ok(json!({ "authenticated": false }));
    }
    // A session kept through an offline restore has no user loaded yet.
    let user = shop.session.current_user();
    Ok(json!({
        "authenticated": true,
        "user": to_json(&user)?,
        "home": user.map(|u| home_label(home_for(u.role))),
        "cartItems": shop.cart.total_items(),
        "wishlistItems": shop.wishlist.total_items(),
    }))
}
