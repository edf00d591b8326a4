use std::{sync::Arc, time::Duration};

use clap::Parser;
use stockgate::{
    catalog::Catalog,
    config::Opts,
    email::{ContactMailer, EmailRenderer, SmtpMailer},
    inventory::InventoryApi,
    AppState, InventoryTokenSupplier,
};
use stockgate_tokens::{refresh::RefreshTokenAuthority, store::FileTokenStore};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "stockgate=info,stockgate_tokens=info,tower_http=info";

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;

    let opts = Opts::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if opts.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting stockgate");

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let authority =
        RefreshTokenAuthority::new(client.clone(), opts.token_url.clone(), opts.credentials())
            .with_timeout(opts.refresh_timeout());
    let store = FileTokenStore::new(opts.token_file.clone());
    let tokens = InventoryTokenSupplier::new(authority, store);

    let inventory = InventoryApi::new(client, opts.api_base.clone(), opts.organization_header()?)
        .with_timeout(opts.upstream_timeout());

    let renderer = EmailRenderer::from_file(&opts.email_template)?;
    let mailer = SmtpMailer::new(opts.smtp_settings()?)?;

    let state = AppState {
        tokens: Arc::new(tokens),
        inventory: Arc::new(inventory),
        catalog: Arc::new(Catalog::new(opts.catalog_dir.clone())),
        contact: Arc::new(ContactMailer::new(renderer, Arc::new(mailer))),
    };

    let addr = opts.listen_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        token_file = %opts.token_file.display(),
        api_base = %opts.api_base,
        "listening"
    );

    axum::serve(listener, stockgate::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "unable to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
