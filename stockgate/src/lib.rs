//! A credential-refreshing reverse proxy for the Zoho Inventory API
//!
//! Requests under `/zoho/` are forwarded to the inventory API with a valid
//! OAuth access token attached. The token is held by a
//! [`TokenSupplier`][stockgate_tokens::TokenSupplier], which refreshes it
//! lazily and persists it so that restarts do not cost a refresh.
//!
//! Alongside the proxy, the router serves a static JSON catalog of vehicles
//! and parts, and sends templated contact emails.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::sync::Arc;

use axum::{
    routing::{any, get, post},
    Router,
};
use stockgate_tokens::{
    refresh::RefreshTokenAuthority, store::FileTokenStore, TokenSupplier,
};
use tower_http::trace::TraceLayer;

pub mod catalog;
pub mod config;
pub mod email;
mod error;
pub mod inventory;

pub use error::ApiError;

/// The token supplier backing the proxy
pub type InventoryTokenSupplier = TokenSupplier<RefreshTokenAuthority, FileTokenStore>;

/// Shared state handed to every handler
#[derive(Clone, Debug)]
pub struct AppState {
    /// Source of access tokens for the inventory API
    pub tokens: Arc<InventoryTokenSupplier>,
    /// The upstream inventory API
    pub inventory: Arc<inventory::InventoryApi>,
    /// Static JSON documents
    pub catalog: Arc<catalog::Catalog>,
    /// Contact email delivery
    pub contact: Arc<email::ContactMailer>,
}

/// Builds the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/zoho/*path", any(inventory::proxy))
        .route("/vehicles/:id", get(catalog::vehicle))
        .route("/parts/:id", get(catalog::part))
        .route("/email-contact/", post(email::email_contact))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
