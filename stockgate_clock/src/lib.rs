//! Time values and clocks for the `stockgate` crates
//!
//! Token lifetimes are tracked in whole seconds since the Unix epoch. That is
//! the resolution the OAuth authority reports (`expires_in`) and the
//! resolution the credential file records (`expiry_time`), so nothing here
//! deals in anything finer.
//!
//! Anything that needs to know "now" takes a [`Clock`] so that tests can pin
//! or advance time with a [`ManualClock`] instead of sleeping.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_must_use
)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::{
    fmt, ops,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unix time
///
/// The number of seconds elapsed since 1970-01-01T00:00:00Z.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
#[repr(transparent)]
pub struct UnixTime(pub u64);

/// A span of whole seconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
#[repr(transparent)]
pub struct DurationSecs(pub u64);

impl From<SystemTime> for UnixTime {
    /// Converts a system time, clamping anything before the epoch to zero
    #[inline]
    fn from(t: SystemTime) -> Self {
        let secs = t
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        UnixTime(secs)
    }
}

impl fmt::Display for UnixTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Display for DurationSecs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

impl From<DurationSecs> for Duration {
    #[inline]
    fn from(d: DurationSecs) -> Self {
        Duration::from_secs(d.0)
    }
}

impl From<Duration> for DurationSecs {
    /// Truncates any sub-second remainder
    #[inline]
    fn from(d: Duration) -> Self {
        DurationSecs(d.as_secs())
    }
}

impl ops::Add<DurationSecs> for UnixTime {
    type Output = UnixTime;

    #[inline]
    fn add(self, rhs: DurationSecs) -> Self::Output {
        UnixTime(self.0.saturating_add(rhs.0))
    }
}

impl ops::AddAssign<DurationSecs> for UnixTime {
    #[inline]
    fn add_assign(&mut self, rhs: DurationSecs) {
        *self = *self + rhs;
    }
}

impl ops::Sub<DurationSecs> for UnixTime {
    type Output = UnixTime;

    #[inline]
    fn sub(self, rhs: DurationSecs) -> Self::Output {
        UnixTime(self.0.saturating_sub(rhs.0))
    }
}

impl ops::Sub for UnixTime {
    type Output = DurationSecs;

    /// The time elapsed from `rhs` to `self`, or zero if `rhs` is later
    #[inline]
    fn sub(self, rhs: UnixTime) -> Self::Output {
        DurationSecs(self.0.saturating_sub(rhs.0))
    }
}

impl ops::Add for DurationSecs {
    type Output = DurationSecs;

    #[inline]
    fn add(self, rhs: DurationSecs) -> Self::Output {
        DurationSecs(self.0.saturating_add(rhs.0))
    }
}

/// Represents a clock, which can tell the current time
pub trait Clock {
    /// Gets the current time according to this clock
    fn now(&self) -> UnixTime;
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline]
    fn now(&self) -> UnixTime {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    #[inline]
    fn now(&self) -> UnixTime {
        (**self).now()
    }
}

/// The wall clock as provided by `std::time::SystemTime`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct System;

impl Clock for System {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime::from(SystemTime::now())
    }
}

/// A clock that only moves when told to
///
/// Clones share the same reading, so a test can hand one clone to the code
/// under test and keep another to move time for every holder at once.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    /// Creates a new clock reading `time`
    pub fn new(time: UnixTime) -> Self {
        Self(Arc::new(AtomicU64::new(time.0)))
    }

    /// Moves the clock to `time`, forwards or backwards
    pub fn set(&self, time: UnixTime) {
        self.0.store(time.0, Ordering::SeqCst);
    }

    /// Moves the clock forward by `by`
    pub fn advance(&self, by: DurationSecs) {
        self.0.fetch_add(by.0, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime(self.0.load(Ordering::SeqCst))
    }
}
