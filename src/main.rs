use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::{info, warn};

use clap::{Parser, Subcommand};
use http::{HeaderName, Method, header::CONTENT_TYPE};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use anyhow::anyhow;

use speech_router::{CustomModelCatalog, ServerConfig, routes, state::AppState};

/// Speech router - language-aware routing of speech synthesis requests
#[derive(Parser, Debug)]
#[command(name = "speech-router")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the custom model catalog and exit
    Models,
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(config_path) => {
            println!("Loading configuration from {}", config_path.display());
            ServerConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))
        }
        None => ServerConfig::from_env().map_err(|e| anyhow!(e.to_string())),
    }
}

fn print_catalog(config: &ServerConfig) {
    let catalog = CustomModelCatalog::load(&config.custom_models_path);
    if catalog.is_empty() {
        println!(
            "No custom models configured in {}",
            config.custom_models_path.display()
        );
        return;
    }

    println!("{:<24} {:<6} {:<8} CHECKPOINT", "MODEL", "LANG", "SPEAKER");
    for entry in catalog.iter() {
        println!(
            "{:<24} {:<6} {:<8} {}",
            entry.model_id,
            entry.language,
            entry.speaker_id,
            entry.ckpt_path.display()
        );
    }
}

fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let allowed_headers = [CONTENT_TYPE, HeaderName::from_static("x-request-id")];
    let exposed_headers = [
        HeaderName::from_static("x-request-id"),
        HeaderName::from_static("x-voice-language"),
        HeaderName::from_static("x-voice-id"),
    ];

    match origins {
        Some("*") => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(allowed_headers)
            .expose_headers(exposed_headers)
            .allow_credentials(false),
        Some(origins) => {
            // Parse comma-separated origins
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(allowed_headers)
                .expose_headers(exposed_headers)
                .allow_credentials(true)
        }
        None => {
            info!(
                "CORS not configured, defaulting to same-origin only. \
                 Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
            );
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(allowed_headers)
                .allow_credentials(false)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
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
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Parse CLI arguments
    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    if let Some(Commands::Models) = cli.command {
        print_catalog(&config);
        return Ok(());
    }

    let address = config.address();
    let default_language = config.default_language;
    let cors = cors_layer(config.cors_allowed_origins.as_deref());

    let app_state = AppState::new(config)?;

    // No request can be served without a default backend
    let backend = app_state
        .registry()
        .preload(default_language)
        .await
        .map_err(|e| anyhow!("Failed to load startup backend: {e}"))?;
    info!(
        language = %backend.language_tag(),
        speakers = backend.speakers().len(),
        "Startup backend ready"
    );
    drop(backend);

    // Security headers
    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            http::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_FRAME_OPTIONS,
            http::HeaderValue::from_static("DENY"),
        ));

    let app = routes::create_app(app_state.clone())
        .layer(cors)
        .layer(security_headers);

    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    println!("Server listening on http://{}", socket_addr);

    let listener = TcpListener::bind(&socket_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    app_state.registry().shutdown().await;
    info!("Server stopped");

    Ok(())
}
