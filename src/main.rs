//! Field server binary entrypoint wiring the arena loop, driver station
//! listeners, and the HTTP/WebSocket surface.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldhub::arena::{Arena, SharedArena};
use fieldhub::config::AppConfig;
use fieldhub::ds::{DsTcpListener, DsUdpListener};
use fieldhub::network::NoopNetworkConfigurator;
use fieldhub::routes;
use fieldhub::store::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let store = Arc::new(MemoryStore::new());
    let network = Arc::new(NoopNetworkConfigurator);
    let rng = StdRng::try_from_os_rng().context("seeding bracket rng")?;

    let arena = Arena::new(store, config.clone(), network, rng).await?;
    tokio::spawn(arena.clone().run_tick_loop());

    let ds_tcp = DsTcpListener::bind(config.ds_tcp_addr())
        .await
        .context("binding driver station tcp listener")?;
    let ds_udp = DsUdpListener::bind(config.ds_udp_addr())
        .await
        .context("binding driver station udp socket")?;
    tokio::spawn(ds_tcp.run(arena.clone()));
    tokio::spawn(ds_udp.run(arena.clone()));

    let app = build_router(arena);

    let addr = config.http_addr();
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(arena: SharedArena) -> Router<()> {
    routes::router(arena)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
