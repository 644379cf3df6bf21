use std::net::Ipv4Addr;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(
                        "janua=debug,tower_http=debug",
                    )
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = match janua::initialize_state().await {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "state initialization failed");
            return;
        },
    };
    let port = state.config.port;

    let listener =
        match tokio::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
        {
            Ok(listener) => listener,
            Err(err) => {
                tracing::error!(error = %err, port, "cannot bind address");
                return;
            },
        };

    tracing::info!(port, "server started");

    if let Err(err) = axum::serve(listener, janua::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %err, "server stopped unexpectedly");
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot install shutdown handler");
    }
}
