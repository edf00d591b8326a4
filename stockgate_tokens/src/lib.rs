//! Lazily refreshed, file-persisted OAuth2 access tokens
//!
//! This crate keeps one access token usable for one set of client
//! credentials. It is meant to sit between an HTTP entry point and an
//! upstream API that wants a short-lived bearer token on every request.
//!
//! The moving parts are:
//!
//! * a [`TokenStore`][store::TokenStore] that durably holds the current
//!   [`StoredCredential`] so a restart does not cost a refresh;
//! * a [`TokenAuthority`][refresh::TokenAuthority] that mints a new token,
//!   usually a [`RefreshTokenAuthority`][refresh::RefreshTokenAuthority]
//!   exchanging a long-lived refresh token;
//! * the [`TokenSupplier`], which hands out the current token and refreshes
//!   it through the authority only once it has expired.
//!
//! Refreshing is lazy: the first request after expiry pays for the refresh,
//! and concurrent requests arriving at that moment wait for that one refresh
//! rather than starting their own.
//!
//! ```
//! use stockgate_tokens::{
//!     refresh::{RefreshTokenAuthority, RefreshTokenCredentials},
//!     store::FileTokenStore,
//!     ClientId, ClientSecret, RefreshToken, TokenSupplier,
//! };
//!
//! let credentials = RefreshTokenCredentials {
//!     client_id: ClientId::from_static("1000.CLIENT"),
//!     client_secret: ClientSecret::from_static("secret"),
//!     refresh_token: RefreshToken::from_static("1000.refresh"),
//!     redirect_uri: "https://example.com/callback".to_owned(),
//! };
//!
//! let authority = RefreshTokenAuthority::new(
//!     reqwest::Client::new(),
//!     reqwest::Url::parse("https://accounts.zoho.com/oauth/v2/token").unwrap(),
//!     credentials,
//! );
//!
//! let supplier = TokenSupplier::new(authority, FileTokenStore::new("zoho_tokens.json"));
//! # /* Would contact the authority.
//! let token = supplier.access_token().await?;
//! # */
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
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

mod braids;
mod record;
pub mod refresh;
pub mod store;
mod supplier;

pub use braids::*;
pub use record::{StoredCredential, TokenStatus};
pub use supplier::{SupplyError, TokenSupplier};
