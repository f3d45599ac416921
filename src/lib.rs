//! KTL Storefront - client for the fresh-goods delivery backend.
//!
//! The library holds the per-user stores (session, cart, wishlist), catalog
//! browsing, checkout, order tracking and the delivery-partner dashboard.
//! [`run`] is the `ktl` command-line shell on top of it.

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

pub mod api;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod commands;
pub mod config;
pub mod delivery;
pub mod diagnostics;
pub mod error;
pub mod geo;
pub mod models;
pub mod orders;
pub mod pricing;
pub mod session;
pub mod storage;
pub mod storefront;
pub mod task;
pub mod tracking;
pub mod wishlist;

#[cfg(test)]
mod testing;

use commands::Cli;
use config::Config;
use storage::KeyringTokenStore;
use storefront::Storefront;

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ktl_storefront_lib=debug"));

    // Prune old log files before setting up the appender
    diagnostics::prune_old_logs();

    let log_dir = diagnostics::get_log_dir();
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, diagnostics::LOG_FILE_PREFIX);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    // stdout carries command output; the console only sees warnings.
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(LevelFilter::WARN);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Flushed at process exit.
    std::mem::forget(_guard);
}

fn execute(cli: Cli) -> Result<Value> {
    let mut config = Config::load().context("invalid configuration")?;
    if let Some(url) = cli.api_url.as_deref() {
        config = config.with_base_url(url);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        let shop = Storefront::new(config, Arc::new(KeyringTokenStore))
            .context("failed to set up the backend client")?;
        shop.initialize().await.context("failed to restore session")?;
        let output = commands::dispatch(&shop, cli.command)
            .await
            .map_err(anyhow::Error::msg);
        shop.shutdown();
        output
    })
}

fn print(value: &Value, compact: bool) {
    let rendered = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    match rendered {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();
    info!("Starting KTL Storefront v{}", env!("CARGO_PKG_VERSION"));

    let compact = cli.compact;
    match execute(cli) {
        Ok(output) => {
            print(&output, compact);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "command failed");
            print(&json!({ "success": false, "error": format!("{e:#}") }), compact);
            ExitCode::FAILURE
        }
    }
}
