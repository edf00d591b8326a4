//! DTOs for talking to the OAuth2 token endpoint

use serde::{Deserialize, Serialize, Serializer};
use stockgate_clock::DurationSecs;

use crate::{AccessToken, ClientId, ClientSecret, RefreshToken};

pub(super) const GRANT_TYPE: &str = "refresh_token";

/// Everything needed to exchange the refresh token for an access token
///
/// Serializes to the query string the token endpoint expects, including
/// `grant_type=refresh_token`.
#[derive(Debug, Clone)]
pub struct RefreshTokenCredentials {
    /// The client ID
    pub client_id: ClientId,

    /// The client secret
    pub client_secret: ClientSecret,

    /// The refresh token
    pub refresh_token: RefreshToken,

    /// The redirect URI registered for the client
    pub redirect_uri: String,
}

impl Serialize for RefreshTokenCredentials {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut ser = serializer.serialize_struct("RefreshTokenCredentials", 5)?;
        ser.serialize_field("refresh_token", &self.refresh_token)?;
        ser.serialize_field("client_id", &self.client_id)?;
        ser.serialize_field("client_secret", &self.client_secret)?;
        ser.serialize_field("redirect_uri", &self.redirect_uri)?;
        ser.serialize_field("grant_type", GRANT_TYPE)?;
        ser.end()
    }
}

/// A successful grant
#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: AccessToken,
    pub expires_in: DurationSecs,
}

/// An OAuth error object
///
/// Some authorities report a bad refresh token with `200 OK` and this body.
#[derive(Debug, Deserialize)]
pub(super) struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_carry_the_grant_type() {
        let credentials = RefreshTokenCredentials {
            client_id: ClientId::from_static("1000.ID"),
            client_secret: ClientSecret::from_static("s3cr3t"),
            refresh_token: RefreshToken::from_static("1000.refresh"),
            redirect_uri: "https://example.com/callback".to_owned(),
        };

        assert_eq!(
            serde_json::to_value(&credentials).unwrap(),
            serde_json::json!({
                "refresh_token": "1000.refresh",
                "client_id": "1000.ID",
                "client_secret": "s3cr3t",
                "redirect_uri": "https://example.com/callback",
                "grant_type": "refresh_token",
            })
        );
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let credentials = RefreshTokenCredentials {
            client_id: ClientId::from_static("1000.ID"),
            client_secret: ClientSecret::from_static("s3cr3t"),
            refresh_token: RefreshToken::from_static("1000.refresh"),
            redirect_uri: String::new(),
        };

        let debug = format!("{:?}", credentials);
        assert!(!debug.contains("s3cr3t"));
        assert!(!debug.contains("1000.refresh"));
    }

    #[test]
    fn token_response_ignores_extra_fields() {
        let resp: TokenResponse = serde_json::from_str(
            r#"{"access_token":"1000.abc","api_domain":"https://www.zohoapis.com","token_type":"Bearer","expires_in":3600}"#,
        )
        .unwrap();
        assert_eq!(resp.access_token.as_str(), "1000.abc");
        assert_eq!(resp.expires_in, DurationSecs(3600));
    }
}
