//! Handing out a currently valid access token

use std::{error, fmt, sync::Arc};

use arc_swap::ArcSwapOption;
use stockgate_clock::{Clock, System};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    refresh::{RefreshError, TokenAuthority},
    store::{LoadError, PersistError, TokenStore},
    AccessToken, AccessTokenRef, StoredCredential, TokenStatus,
};

/// Supplies a valid access token, refreshing it lazily when it expires
///
/// Valid tokens are served from an in-memory snapshot without taking any
/// lock. When the snapshot is absent or expired, callers queue on a single
/// refresh guard; the first one in consults the store and, if that does not
/// hold a valid token either, asks the authority for a new one and persists
/// it. Callers that queued behind it find the fresh snapshot and return
/// without refreshing again.
pub struct TokenSupplier<A, S, C = System> {
    authority: A,
    store: S,
    clock: C,
    current: ArcSwapOption<StoredCredential>,
    refresh_guard: Mutex<()>,
}

impl<A, S> TokenSupplier<A, S, System> {
    /// Constructs a new supplier using the system clock
    ///
    /// Nothing is read from `store` until the first token is requested.
    pub fn new(authority: A, store: S) -> Self {
        Self {
            authority,
            store,
            clock: System,
            current: ArcSwapOption::empty(),
            refresh_guard: Mutex::new(()),
        }
    }
}

impl<A, S, C> TokenSupplier<A, S, C> {
    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> TokenSupplier<A, S, D> {
        TokenSupplier {
            authority: self.authority,
            store: self.store,
            clock,
            current: self.current,
            refresh_guard: self.refresh_guard,
        }
    }

    /// The record most recently loaded or persisted by this supplier
    pub fn current(&self) -> Option<StoredCredential> {
        self.current.load_full().map(|record| (*record).clone())
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<A, S, C> TokenSupplier<A, S, C>
where
    A: TokenAuthority,
    S: TokenStore,
    C: Clock,
{
    /// Gets an access token that is valid right now
    ///
    /// Refreshes the token through the authority only when neither memory nor
    /// the store holds a valid one. Nothing is retried; any failure is
    /// returned to the caller.
    pub async fn access_token(&self) -> Result<AccessToken, SupplyError> {
        if let Some(token) = self.valid_snapshot() {
            return Ok(token);
        }

        let _guard = self.refresh_guard.lock().await;

        if let Some(token) = self.valid_snapshot() {
            tracing::trace!("token was refreshed while waiting on refresh guard");
            return Ok(token);
        }

        if let Some(token) = self.adopt_stored().await {
            return Ok(token);
        }

        self.refresh_and_persist().await
    }

    fn valid_snapshot(&self) -> Option<AccessToken> {
        let guard = self.current.load();
        let record = guard.as_deref()?;

        if record.status_with_clock(&self.clock) == TokenStatus::Valid {
            Some(record.access_token().to_owned())
        } else {
            None
        }
    }

    async fn adopt_stored(&self) -> Option<AccessToken> {
        let record = match self.store.load().await {
            Ok(record) => record,
            Err(LoadError::NotFound) => {
                tracing::debug!("no stored credential, refreshing");
                return None;
            }
            Err(error) => {
                tracing::warn!(
                    error = (&error as &dyn error::Error),
                    "stored credential unusable, refreshing"
                );
                return None;
            }
        };

        let now = self.clock.now();
        if !record.is_valid_at(now) {
            tracing::debug!(
                now = now.0,
                expiry = record.expiry_time().0,
                "stored credential expired, refreshing"
            );
            return None;
        }

        tracing::debug!(
            expiry = record.expiry_time().0,
            remaining = record.until_expired_at(now).0,
            "adopted stored credential"
        );

        let token = record.access_token().to_owned();
        self.current.store(Some(Arc::new(record)));
        Some(token)
    }

    async fn refresh_and_persist(&self) -> Result<AccessToken, SupplyError> {
        let grant = self.authority.refresh().await?;

        let record =
            StoredCredential::issue(grant.access_token, self.clock.now(), grant.expires_in);
        let token = record.access_token().to_owned();

        if let Err(source) = self.store.save(&record).await {
            tracing::error!(
                error = (&source as &dyn error::Error),
                "refreshed token could not be persisted"
            );
            return Err(SupplyError::Persist {
                access_token: token,
                source,
            });
        }

        tracing::info!(
            expiry = record.expiry_time().0,
            lifetime = grant.expires_in.0,
            "refreshed and persisted access token"
        );

        self.current.store(Some(Arc::new(record)));
        Ok(token)
    }
}

impl<A, S, C> fmt::Debug for TokenSupplier<A, S, C>
where
    A: fmt::Debug,
    S: fmt::Debug,
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenSupplier")
            .field("authority", &self.authority)
            .field("store", &self.store)
            .field("clock", &self.clock)
            .field(
                "current_expiry",
                &self.current.load().as_deref().map(StoredCredential::expiry_time),
            )
            .finish()
    }
}

/// A valid access token could not be supplied
#[derive(Debug, Error)]
pub enum SupplyError {
    /// The authority did not issue a new token
    #[error(transparent)]
    Refresh(#[from] RefreshError),
    /// A new token was issued but could not be persisted
    ///
    /// The token itself is valid and is carried here; later requests will
    /// refresh again because nothing was recorded.
    #[error("refreshed access token could not be persisted")]
    Persist {
        /// The freshly issued token
        access_token: AccessToken,
        /// Why persisting failed
        source: PersistError,
    },
}

impl SupplyError {
    /// The freshly issued token, when the failure happened after issuance
    pub fn fresh_token(&self) -> Option<&AccessTokenRef> {
        match self {
            Self::Persist { access_token, .. } => Some(&**access_token),
            Self::Refresh(_) => None,
        }
    }
}
