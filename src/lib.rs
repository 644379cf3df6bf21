//! Janua is a dual-mode registration and authentication service: the
//! same endpoints serve rendered pages to browsers and JSON to API
//! clients, backed by one account store.

#![forbid(unsafe_code)]

pub mod config;
mod crypto;
mod database;
pub mod error;
mod router;
mod session;
mod templates;
mod token;
mod user;
mod validation;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::FromRef;
use axum::http::{Method, StatusCode, header};
use axum::routing::{get, post};
use axum_extra::extract::cookie::Key;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    /// Active configuration.
    pub config: Arc<config::Configuration>,
    pub(crate) db: database::Database,
    pub(crate) crypto: Arc<crypto::PasswordManager>,
    pub(crate) token: token::TokenManager,
    pub(crate) templates: Arc<tera::Tera>,
    pub(crate) key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Key {
        state.key.clone()
    }
}

/// Creates state from the configuration file.
///
/// # Errors
/// Fails when the database is unreachable or the schema cannot be
/// applied.
pub async fn initialize_state()
-> Result<AppState, Box<dyn std::error::Error>> {
    let config = config::Configuration::default().read()?;

    if config.secret_key.len() < config::MIN_SECRET_KEY_LENGTH {
        tracing::error!(
            "`secret_key` entry on `config.yaml` must hold at least 32 bytes"
        );
        std::process::exit(0);
    }

    let db = match config.database {
        Some(ref database) => {
            database::Database::new(
                &database.url,
                database.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
            )
            .await?
        },
        None => {
            tracing::warn!(
                "no `database` entry on `config.yaml`, using {}",
                database::DEFAULT_DATABASE_URL
            );
            database::Database::new(
                database::DEFAULT_DATABASE_URL,
                database::DEFAULT_POOL_SIZE,
            )
            .await?
        },
    };
    db.migrate().await?;

    Ok(AppState {
        token: token::TokenManager::new(
            &config.url,
            &config.secret_key,
            config.access_token_ttl,
            config.refresh_token_ttl,
        ),
        crypto: Arc::new(crypto::PasswordManager::new(config.argon2.clone())?),
        templates: Arc::new(templates::engine()?),
        key: Key::derive_from(config.secret_key.as_bytes()),
        config,
        db,
    })
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(
                    |chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                        tracing::trace!(
                            size_bytes = chunk.len(),
                            latency = ?latency,
                            "sending body chunk"
                        );
                    },
                )
                .make_span_with(
                    DefaultMakeSpan::new()
                        .include_headers(true)
                        .level(tracing::Level::INFO),
                )
                .on_request(DefaultOnRequest::new())
                .on_response(
                    DefaultOnResponse::new()
                        .include_headers(true)
                        .latency_unit(LatencyUnit::Micros),
                ),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(10),
        ))
        .layer(SetSensitiveHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
        ]))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::OPTIONS,
                ])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    Router::new()
        .route("/", get(router::home))
        .route(
            "/register/",
            get(router::register::page).post(router::register::submit),
        )
        .route(
            "/login/",
            get(router::login::page).post(router::login::submit),
        )
        .route("/logout/", get(router::logout::handler))
        .route(
            "/profile/",
            get(router::profile::retrieve)
                .put(router::profile::update)
                .patch(router::profile::update),
        )
        .route("/api/register/", post(router::register::api))
        .route(
            "/api/login/",
            get(router::login::page).post(router::login::submit),
        )
        .route("/api/logout/", get(router::logout::handler))
        .route(
            "/api/profile/",
            get(router::profile::retrieve)
                .put(router::profile::update)
                .patch(router::profile::update),
        )
        .route("/api/token/refresh/", post(router::refresh::handler))
        .route(
            "/validate-username/",
            get(router::validate::username).post(router::validate::username),
        )
        .route(
            "/validate-email/",
            get(router::validate::email).post(router::validate::email),
        )
        .route(
            "/validate-password/",
            get(router::validate::password).post(router::validate::password),
        )
        .fallback(router::fallback)
        .with_state(state)
        .layer(middleware)
}

/// Wrapper to make tests request with custom headers and body.
#[cfg(test)]
pub(crate) async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    headers: &[(header::HeaderName, &str)],
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use tower::util::ServiceExt;

    let mut request = axum::http::Request::builder()
        .method(method)
        .uri(path);
    for (name, value) in headers {
        request = request.header(name.clone(), *value);
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}
