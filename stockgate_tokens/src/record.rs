//! The access token record and its validity

use serde::{Deserialize, Serialize};
use stockgate_clock::{Clock, DurationSecs, UnixTime};

use crate::{AccessToken, AccessTokenRef};

/// An access token together with the instant it stops being usable
///
/// This is also the on-disk shape of the credential file:
///
/// ```json
/// {"access_token": "1000.8f3e…", "expiry_time": 1700003600}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    access_token: AccessToken,
    expiry_time: UnixTime,
}

/// Whether a token may still be presented upstream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
    /// The token is usable
    Valid,
    /// The token must be replaced before use
    Expired,
}

impl StoredCredential {
    /// Records a freshly granted token
    ///
    /// The expiry is always `issued_at + expires_in`; it is never carried over
    /// from a previous record.
    pub fn issue(access_token: AccessToken, issued_at: UnixTime, expires_in: DurationSecs) -> Self {
        Self {
            access_token,
            expiry_time: issued_at + expires_in,
        }
    }

    /// Gets the access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the instant at which the token expires
    #[inline]
    pub fn expiry_time(&self) -> UnixTime {
        self.expiry_time
    }

    /// Gets the token's status as of `time`
    ///
    /// A token is only valid strictly before its expiry; at the expiry
    /// instant itself it is already expired.
    #[inline]
    pub fn status_at(&self, time: UnixTime) -> TokenStatus {
        if time < self.expiry_time {
            TokenStatus::Valid
        } else {
            TokenStatus::Expired
        }
    }

    /// Gets the token's status according to `clock`
    #[inline]
    pub fn status_with_clock<C: Clock>(&self, clock: &C) -> TokenStatus {
        self.status_at(clock.now())
    }

    /// Whether the token is valid as of `time`
    #[inline]
    pub fn is_valid_at(&self, time: UnixTime) -> bool {
        self.status_at(time) == TokenStatus::Valid
    }

    /// How much longer the token is valid as of `time`
    #[inline]
    pub fn until_expired_at(&self, time: UnixTime) -> DurationSecs {
        self.expiry_time - time
    }
}

#[cfg(test)]
mod tests {
    use stockgate_clock::ManualClock;

    use super::*;

    const T0: UnixTime = UnixTime(1_700_000_000);

    fn one_hour_token() -> StoredCredential {
        StoredCredential::issue(AccessToken::from_static("T1"), T0, DurationSecs(3600))
    }

    #[test]
    fn expiry_is_issue_time_plus_lifetime() {
        assert_eq!(one_hour_token().expiry_time(), UnixTime(T0.0 + 3600));
    }

    #[test]
    fn valid_strictly_before_expiry() {
        let token = one_hour_token();
        assert_eq!(token.status_at(T0), TokenStatus::Valid);
        assert_eq!(token.status_at(UnixTime(T0.0 + 3599)), TokenStatus::Valid);
        assert_eq!(token.status_at(UnixTime(T0.0 + 3600)), TokenStatus::Expired);
        assert_eq!(token.status_at(UnixTime(T0.0 + 9000)), TokenStatus::Expired);
    }

    #[test]
    fn status_follows_the_clock() {
        let token = one_hour_token();
        let clock = ManualClock::new(T0);
        assert_eq!(token.status_with_clock(&clock), TokenStatus::Valid);

        clock.advance(DurationSecs(3600));
        assert_eq!(token.status_with_clock(&clock), TokenStatus::Expired);
    }

    #[test]
    fn remaining_lifetime_bottoms_out_at_zero() {
        let token = one_hour_token();
        assert_eq!(token.until_expired_at(UnixTime(T0.0 + 1800)), DurationSecs(1800));
        assert_eq!(token.until_expired_at(UnixTime(T0.0 + 7200)), DurationSecs(0));
    }

    #[test]
    fn file_format_uses_epoch_seconds() {
        let json = serde_json::to_value(one_hour_token()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"access_token": "T1", "expiry_time": 1_700_003_600u64})
        );
    }

    #[test]
    fn reads_file_written_by_earlier_deployments() {
        let record: StoredCredential =
            serde_json::from_str(r#"{"access_token":"1000.abc","expiry_time":1700003600}"#)
                .unwrap();
        assert_eq!(record.access_token().as_str(), "1000.abc");
        assert_eq!(record.expiry_time(), UnixTime(1_700_003_600));
    }
}
