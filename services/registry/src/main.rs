//! `registry-panel`: serve the panel API for a Docker registry.

use std::net::SocketAddr;

use camino::Utf8PathBuf;
use clap::Parser;
use eyre::WrapErr as _;
use http::Uri;
use registry::{PanelConfig, RegistryClient};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "registry-panel", version, about = "Docker registry management panel API")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "REGISTRY_PANEL_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Registry base URL
    #[arg(long, env = "REGISTRY_URL")]
    url: Option<Uri>,

    /// Registry user name
    #[arg(long, env = "REGISTRY_USERNAME")]
    username: Option<String>,

    /// Registry password
    #[arg(long, env = "REGISTRY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Per-request timeout, in seconds
    #[arg(long, env = "REGISTRY_TIMEOUT_SECONDS")]
    timeout_seconds: Option<u64>,

    /// Address for the panel API
    #[arg(long, env = "PANEL_LISTEN")]
    listen: Option<SocketAddr>,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn load(&self) -> eyre::Result<PanelConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .wrap_err_with(|| format!("reading config file {path}"))?;
                toml_edit::de::from_str(&text)
                    .wrap_err_with(|| format!("parsing config file {path}"))?
            }
            None => PanelConfig::default(),
        };

        if let Some(url) = &self.url {
            eyre::ensure!(
                url.scheme().is_some() && url.authority().is_some(),
                "registry URL must be absolute: {url}"
            );
            config.registry.url = url.clone();
        }
        if let Some(username) = &self.username {
            config.registry.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            config.registry.password = Some(password.as_str().into());
        }
        if let Some(timeout) = self.timeout_seconds {
            config.registry.timeout_seconds = timeout;
        }
        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }

        Ok(config)
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let config = args.load()?;
    let client = RegistryClient::new(&config.registry);

    let shutdown = CancellationToken::new();
    let app = registry::api::router(client, shutdown.clone());

    let listener = tokio::net::TcpListener::bind(config.server.listen)
        .await
        .wrap_err_with(|| format!("binding {}", config.server.listen))?;
    tracing::info!(
        listen = %config.server.listen,
        registry = %config.registry.url,
        "registry panel listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(%error, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
