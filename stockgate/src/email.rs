//! Contact emails rendered from an HTML template and delivered over SMTP

use std::{fmt, io, path::Path, sync::Arc};

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, Json};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use minijinja::Environment;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{ApiError, AppState};

const TEMPLATE_NAME: &str = "contact_email.html";

/// A request to email a contact about a set of parts
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ContactRequest {
    /// Subject line of the email
    pub subject: String,
    /// The recipient
    pub user: Contact,
    /// Parts listed in the email body
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// The person being emailed
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Contact {
    /// Contact identifier in the inventory system
    pub id: String,
    /// Recipient address
    pub email: String,
    /// Name used to greet the contact
    pub contact_name: String,
}

/// A part listed in a contact email
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Part {
    /// Stock keeping unit
    pub sku: String,
    /// Display title
    pub title: String,
    /// Unit price
    pub price: f64,
    /// Free-form description
    pub description: String,
}

/// A rendered email ready for delivery
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html_body: String,
}

/// Delivers rendered emails
#[async_trait]
pub trait Mailer: Send + Sync + fmt::Debug {
    /// Sends one email
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

/// An error delivering an email
#[derive(Debug, Error)]
pub enum MailError {
    /// An address could not be parsed
    #[error("invalid email address")]
    Address(#[source] lettre::address::AddressError),
    /// The message could not be assembled
    #[error("could not build message")]
    Message(#[source] lettre::error::Error),
    /// The SMTP relay refused or could not be reached
    #[error("smtp delivery failed")]
    Transport(#[source] lettre::transport::smtp::Error),
}

/// An error producing or delivering a contact email
#[derive(Debug, Error)]
pub enum EmailError {
    /// The template could not be rendered with the request
    #[error("could not render email template")]
    Render(#[source] minijinja::Error),
    /// The rendered email could not be delivered
    #[error(transparent)]
    Send(#[from] MailError),
}

/// An error loading the email template at startup
#[derive(Debug, Error)]
pub enum TemplateLoadError {
    /// The template file could not be read
    #[error("could not read email template {path}")]
    Read {
        /// Location of the template
        path: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },
    /// The template has a syntax error
    #[error("could not parse email template")]
    Parse(#[source] minijinja::Error),
}

/// Connection settings for the SMTP relay
#[derive(Clone)]
pub struct SmtpSettings {
    /// Relay host, reached with STARTTLS
    pub host: String,
    /// Relay port
    pub port: u16,
    /// Username and password, if the relay requires authentication
    pub credentials: Option<(String, String)>,
    /// Sender mailbox
    pub from: Mailbox,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.credentials.as_ref().map(|(user, _)| user))
            .field("from", &self.from.to_string())
            .finish()
    }
}

/// A [`Mailer`] that relays through an SMTP server
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds a STARTTLS transport for the given settings
    ///
    /// No connection is made until the first email is sent.
    pub fn new(settings: SmtpSettings) -> Result<Self, MailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(MailError::Transport)?
            .port(settings.port);

        if let Some((username, password)) = settings.credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            host: settings.host,
            from: settings.from,
        })
    }
}

impl fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("host", &self.host)
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[tracing::instrument(skip_all, fields(smtp.host = %self.host))]
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let to: Mailbox = email.to.parse().map_err(MailError::Address)?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html_body)
            .map_err(MailError::Message)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(MailError::Transport)?;

        tracing::info!(smtp.code = %response.code(), "email sent");
        Ok(())
    }
}

/// Renders the contact email template
///
/// The template is HTML auto-escaped, so request fields cannot inject markup.
#[derive(Debug)]
pub struct EmailRenderer {
    env: Environment<'static>,
}

impl EmailRenderer {
    /// Loads the template from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TemplateLoadError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| TemplateLoadError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_source(source)
    }

    /// Compiles the template from its source text
    pub fn from_source(source: impl Into<String>) -> Result<Self, TemplateLoadError> {
        let mut env = Environment::new();
        env.add_template_owned(TEMPLATE_NAME, source.into())
            .map_err(TemplateLoadError::Parse)?;
        Ok(Self { env })
    }

    /// Renders the email body for a request
    pub fn render(&self, request: &ContactRequest) -> Result<String, EmailError> {
        self.env
            .get_template(TEMPLATE_NAME)
            .and_then(|template| template.render(request))
            .map_err(EmailError::Render)
    }
}

/// Renders contact requests and hands them to a [`Mailer`]
#[derive(Debug)]
pub struct ContactMailer {
    renderer: EmailRenderer,
    mailer: Arc<dyn Mailer>,
}

impl ContactMailer {
    /// Combines a renderer with a delivery mechanism
    pub fn new(renderer: EmailRenderer, mailer: Arc<dyn Mailer>) -> Self {
        Self { renderer, mailer }
    }

    /// Renders and sends the email for `request` to its contact
    pub async fn send(&self, request: &ContactRequest) -> Result<(), EmailError> {
        let html_body = self.renderer.render(request)?;

        self.mailer
            .send(OutgoingEmail {
                to: request.user.email.clone(),
                subject: request.subject.clone(),
                html_body,
            })
            .await?;

        Ok(())
    }
}

/// Emails a contact about a selection of parts
#[tracing::instrument(skip_all, fields(contact.id = %request.user.id, parts = request.parts.len()))]
pub async fn email_contact(
    State(state): State<AppState>,
    Json(request): Json<ContactRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state.contact.send(&request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": "Email Sent Successfully" })),
    ))
}
