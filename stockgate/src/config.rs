//! Command line and environment configuration

use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use axum::http::HeaderValue;
use clap::{Args, Parser};
use lettre::message::Mailbox;
use reqwest::Url;
use stockgate_tokens::{refresh::RefreshTokenCredentials, ClientId, ClientSecret, RefreshToken};
use thiserror::Error;

use crate::email::SmtpSettings;

/// Credential-refreshing proxy for the Zoho Inventory API
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Opts {
    /// The OAuth client ID registered with Zoho
    #[arg(long, env = "ZOHO_CLIENT_ID")]
    pub client_id: ClientId,

    /// The OAuth client secret registered with Zoho
    #[arg(long, env = "ZOHO_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: ClientSecret,

    /// The inventory organization every proxied request acts on
    #[arg(long = "org-id", env = "ZOHO_ORG_ID")]
    pub organization_id: String,

    /// The long-lived refresh token exchanged for access tokens
    #[arg(long, env = "REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: RefreshToken,

    /// The redirect URI registered with the OAuth client
    #[arg(long, env = "REDIRECT_URI")]
    pub redirect_uri: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address to listen on
    #[arg(long, env = "BIND_ADDRESS", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind_address: IpAddr,

    /// The local file used to persist the current access token
    #[arg(long, env = "TOKEN_FILE", default_value = "./zoho_tokens.json")]
    pub token_file: PathBuf,

    /// The token endpoint of the OAuth authority
    #[arg(long, env = "ZOHO_TOKEN_URL", default_value = "https://accounts.zoho.com/oauth/v2/token")]
    pub token_url: Url,

    /// Base URL that `/zoho/{path}` requests are forwarded beneath
    #[arg(long, env = "ZOHO_API_BASE", default_value = "https://www.zohoapis.com/inventory/v1/")]
    pub api_base: Url,

    /// Seconds a token refresh may take before it fails
    #[arg(long, env = "REFRESH_TIMEOUT_SECS", default_value_t = 30)]
    pub refresh_timeout_secs: u64,

    /// Seconds a forwarded request may take before it fails
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 60)]
    pub upstream_timeout_secs: u64,

    /// Directory holding the `vehicles/` and `parts/` JSON documents
    #[arg(long, env = "CATALOG_DIR", default_value = "./json")]
    pub catalog_dir: PathBuf,

    /// HTML template for contact emails
    #[arg(long, env = "EMAIL_TEMPLATE", default_value = "./templates/contact_email.html")]
    pub email_template: PathBuf,

    #[command(flatten)]
    pub smtp: SmtpOpts,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

/// SMTP relay settings
#[derive(Args)]
pub struct SmtpOpts {
    /// SMTP relay host, reached with STARTTLS
    #[arg(long, env = "SMTP_HOST", default_value = "smtp.gmail.com")]
    pub smtp_host: String,

    /// SMTP relay port
    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    /// SMTP username
    #[arg(long, env = "SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    /// SMTP password
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Sender address; defaults to the SMTP username
    #[arg(long, env = "MAIL_FROM")]
    pub mail_from: Option<String>,
}

impl fmt::Debug for SmtpOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpOpts")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field(
                "smtp_password",
                &self.smtp_password.as_ref().map(|_| "***PASSWORD***"),
            )
            .field("mail_from", &self.mail_from)
            .finish()
    }
}

/// Configuration that parsed but cannot be used
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `MAIL_FROM` nor `SMTP_USERNAME` was given
    #[error("no sender address: set MAIL_FROM or SMTP_USERNAME")]
    MissingSender,
    /// The sender is not a valid mailbox
    #[error("invalid sender address {0:?}")]
    InvalidSender(String, #[source] lettre::address::AddressError),
    /// The organization id cannot be sent as a header
    #[error("organization id is not a valid header value")]
    InvalidOrganizationId(#[source] axum::http::header::InvalidHeaderValue),
}

impl Opts {
    /// The credentials presented when refreshing the access token
    pub fn credentials(&self) -> RefreshTokenCredentials {
        RefreshTokenCredentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            refresh_token: self.refresh_token.clone(),
            redirect_uri: self.redirect_uri.clone(),
        }
    }

    /// The socket address to serve on
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Bound on each token refresh
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    /// Bound on each forwarded request
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    /// The organization id, ready to be sent as a header
    pub fn organization_header(&self) -> Result<HeaderValue, ConfigError> {
        HeaderValue::from_str(&self.organization_id).map_err(ConfigError::InvalidOrganizationId)
    }

    /// Settings for the SMTP relay
    pub fn smtp_settings(&self) -> Result<SmtpSettings, ConfigError> {
        let smtp = &self.smtp;
        let sender = smtp
            .mail_from
            .as_ref()
            .or(smtp.smtp_username.as_ref())
            .ok_or(ConfigError::MissingSender)?;
        let from = sender
            .parse::<Mailbox>()
            .map_err(|err| ConfigError::InvalidSender(sender.clone(), err))?;

        let credentials = match (&smtp.smtp_username, &smtp.smtp_password) {
            (Some(username), Some(password)) => Some((username.clone(), password.clone())),
            _ => None,
        };

        Ok(SmtpSettings {
            host: smtp.smtp_host.clone(),
            port: smtp.smtp_port,
            credentials,
            from,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: &[&str] = &[
        "stockgate",
        "--client-id",
        "1000.CLIENT",
        "--client-secret",
        "hunter2",
        "--org-id",
        "60000000",
        "--refresh-token",
        "1000.refresh",
        "--redirect-uri",
        "https://example.com/callback",
    ];

    fn parse(extra: &[&str]) -> Opts {
        Opts::try_parse_from(REQUIRED.iter().chain(extra).copied()).unwrap()
    }

    #[test]
    fn refresh_credentials_come_from_options() {
        let opts = parse(&[]);
        let credentials = opts.credentials();

        assert_eq!(credentials.client_id.as_str(), "1000.CLIENT");
        assert_eq!(credentials.client_secret.as_str(), "hunter2");
        assert_eq!(credentials.refresh_token.as_str(), "1000.refresh");
        assert_eq!(credentials.redirect_uri, "https://example.com/callback");
    }

    #[test]
    fn secrets_do_not_appear_in_debug_output() {
        let opts = parse(&["--smtp-username", "shop@example.com", "--smtp-password", "pa55word"]);
        let debug = format!("{opts:?}");

        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("1000.refresh"));
        assert!(!debug.contains("pa55word"));
    }

    #[test]
    fn listen_address_combines_bind_address_and_port() {
        let opts = parse(&["--bind-address", "127.0.0.1", "--port", "9000"]);
        assert_eq!(opts.listen_addr(), "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn timeouts_are_seconds() {
        let opts = parse(&["--refresh-timeout-secs", "5", "--upstream-timeout-secs", "7"]);
        assert_eq!(opts.refresh_timeout(), Duration::from_secs(5));
        assert_eq!(opts.upstream_timeout(), Duration::from_secs(7));
    }

    #[test]
    fn sender_falls_back_to_smtp_username() {
        let opts = parse(&["--smtp-username", "shop@example.com", "--smtp-password", "pa55word"]);
        let settings = opts.smtp_settings().unwrap();

        assert_eq!(settings.from.email.to_string(), "shop@example.com");
        assert_eq!(
            settings.credentials,
            Some(("shop@example.com".to_owned(), "pa55word".to_owned()))
        );
    }

    #[test]
    fn mail_from_takes_precedence_over_username() {
        let opts = parse(&[
            "--smtp-username",
            "relay-user",
            "--mail-from",
            "Parts Desk <parts@example.com>",
        ]);
        let settings = opts.smtp_settings().unwrap();

        assert_eq!(settings.from.email.to_string(), "parts@example.com");
        assert_eq!(settings.credentials, None);
    }

    #[test]
    fn invalid_organization_id_is_rejected() {
        let mut opts = parse(&[]);
        opts.organization_id = "600\n00".to_owned();
        assert!(matches!(
            opts.organization_header(),
            Err(ConfigError::InvalidOrganizationId(_))
        ));
    }

    #[test]
    fn missing_required_option_is_an_error() {
        let result = Opts::try_parse_from(["stockgate", "--client-id", "1000.CLIENT"]);
        assert!(result.is_err());
    }
}
