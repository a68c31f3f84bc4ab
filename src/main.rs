use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keygate::store::{StoreConfig, TokenStore};
use keygate::{api, cli, config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "keygate=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Token { command }) => {
            let state = build_state(cfg).await?;
            handle_token_command(command, &state).await
        }
        Some(cli::Commands::Storage { command }) => {
            let state = build_state(cfg).await?;
            handle_storage_command(command, &state).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn build_state(cfg: config::Config) -> anyhow::Result<Arc<AppState>> {
    let tokens = TokenStore::open(&StoreConfig {
        url: cfg.store_url.clone(),
    })
    .await?;

    Ok(Arc::new(AppState {
        tokens,
        config: cfg,
    }))
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Opening token store...");
    let state = build_state(cfg).await?;

    let app = axum::Router::new()
        // Health endpoints (no auth)
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .route("/readyz", axum::routing::get(readiness_check))
        // Token API — nested under /api/v1 (preserves middleware + fallback)
        .nest("/api/v1", api::api_router(&state))
        .with_state(state.clone())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer({
            use axum::http::{HeaderName, Method};
            use tower_http::cors::AllowOrigin;
            let dashboard_origin = std::env::var("KEYGATE_DASHBOARD_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string());
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str == dashboard_origin
                        || origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                }))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("authorization"),
                    HeaderName::from_static("x-admin-key"),
                    HeaderName::from_static("x-api-key"),
                ])
        })
        .layer(axum::middleware::from_fn(request_id_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("keygate listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Middleware: injects a unique X-Request-Id into every response so clients
/// can correlate errors with server logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

async fn readiness_check() -> &'static str {
    "ok"
}

async fn handle_token_command(
    cmd: cli::TokenCommands,
    state: &Arc<AppState>,
) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Create {
            name,
            permissions,
            expires_in_days,
        } => {
            let permissions = permissions.unwrap_or_default();
            for tag in &permissions {
                if tag.trim().is_empty() || tag.chars().any(char::is_whitespace) {
                    anyhow::bail!("malformed permission tag: '{}'", tag);
                }
            }

            let (record, plaintext) = state
                .tokens
                .create(name.trim(), permissions, expires_in_days)
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;

            println!(
                "Token created:\n  ID:   {}\n  Name: {}\n  Use:  Authorization: Bearer {}",
                record.id, record.name, plaintext
            );
            println!("The secret above is shown once and cannot be recovered.");
            if let Some(expires_at) = record.expires_at {
                println!("Expires: {}", expires_at.to_rfc3339());
            }
        }
        cli::TokenCommands::List => {
            let tokens = state
                .tokens
                .list()
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            if tokens.is_empty() {
                println!("No tokens found.");
            } else {
                println!("{:<38} {:<20} {:<10}", "ID", "NAME", "STATUS");
                for t in tokens {
                    println!("{:<38} {:<20} {:<10?}", t.id, t.name, t.status);
                }
            }
        }
        cli::TokenCommands::Revoke { id } => {
            let deleted = state
                .tokens
                .delete(&id)
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            if deleted {
                println!("Token deleted.");
            } else {
                println!("Token not found.");
            }
        }
    }
    Ok(())
}

async fn handle_storage_command(
    cmd: cli::StorageCommands,
    state: &Arc<AppState>,
) -> anyhow::Result<()> {
    match cmd {
        cli::StorageCommands::Info => {
            let info = state.tokens.storage_info().await;
            println!("Backend:  {}", info.backend);
            println!("Location: {}", info.location);
            println!("Records:  {}", info.records);
            println!("Degraded: {}", info.degraded);
        }
    }
    Ok(())
}
