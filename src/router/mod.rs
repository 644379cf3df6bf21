//! HTTP surface: request classification, extractors and the small
//! handlers that fit nowhere else.

pub mod login;
pub mod logout;
pub mod profile;
pub mod refresh;
pub mod register;
pub mod validate;

use axum::body::Body;
use axum::extract::{
    Form, FromRef, FromRequest, FromRequestParts, Json,
    OptionalFromRequestParts, Request,
};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::SignedCookieJar;
use axum_extra::extract::cookie::Key;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ServerError;
use crate::token::TokenKind;
use crate::user::User;
use crate::user::repository::UserRepository;
use crate::{AppState, session};

pub const REGISTER_ROUTE: &str = "/register/";
pub const LOGIN_ROUTE: &str = "/login/";

const BEARER: &str = "Bearer ";

/// How the client wants to talk to us. Decided once per request, from
/// headers only, then threaded through the handler.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClientMode {
    /// JSON bodies, bearer tokens, no redirects.
    Api,
    /// Rendered pages, session cookie, redirects.
    Html,
}

impl ClientMode {
    /// A JSON request body, a JSON preference in `Accept`, or an `Accept`
    /// that shuts HTML out entirely all select API behaviour. Everything
    /// else, browsers included, gets HTML.
    pub fn classify(headers: &HeaderMap) -> Self {
        if is_json_content(headers) {
            return ClientMode::Api;
        }

        let accept = headers
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("*/*");

        let json = accepted_quality(accept, "application", "json");
        let html = accepted_quality(accept, "text", "html");

        if json > html || html == 0.0 {
            ClientMode::Api
        } else {
            ClientMode::Html
        }
    }
}

impl<S> FromRequestParts<S> for ClientMode
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientMode::classify(&parts.headers))
    }
}

/// Whether the request body declares itself as JSON.
fn is_json_content(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|content_type| {
            let essence = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();

            essence == "application/json" || essence.ends_with("+json")
        })
}

/// Highest quality an `Accept` header grants to `kind/subtype`.
fn accepted_quality(accept: &str, kind: &str, subtype: &str) -> f32 {
    let mut best = 0.0_f32;

    for entry in accept.split(',') {
        let mut parts = entry.split(';');
        let Some(range) = parts.next().map(str::trim) else {
            continue;
        };

        let matches = match range.split_once('/') {
            Some(("*", "*")) => true,
            Some((main, "*")) => main.eq_ignore_ascii_case(kind),
            Some((main, sub)) => {
                main.eq_ignore_ascii_case(kind)
                    && sub.eq_ignore_ascii_case(subtype)
            },
            None => false,
        };
        if !matches {
            continue;
        }

        let quality = parts
            .find_map(|parameter| {
                let (name, value) = parameter.trim().split_once('=')?;
                if name.trim() != "q" {
                    return None;
                }
                value.trim().parse::<f32>().ok()
            })
            .unwrap_or(1.0);

        if quality > best {
            best = quality;
        }
    }

    best
}

/// Body extractor accepting JSON or urlencoded forms. `GET` and `HEAD`
/// read the query string, like [`Form`] does; a body without a declared
/// type counts as an empty form.
pub struct FormOrJson<T>(pub T);

impl<S, T> FromRequest<S> for FormOrJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ServerError;

    async fn from_request(
        req: Request,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let is_body_method =
            req.method() != Method::GET && req.method() != Method::HEAD;

        if is_body_method && is_json_content(req.headers()) {
            let Json(value) = Json::<T>::from_request(req, state).await?;
            return Ok(Self(value));
        }

        // A body that never declares its type reads as an empty form,
        // not a parse failure.
        let req = if is_body_method
            && !req.headers().contains_key(header::CONTENT_TYPE)
        {
            let (mut parts, _) = req.into_parts();
            parts.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            );
            Request::from_parts(parts, Body::empty())
        } else {
            req
        };

        let Form(value) = Form::<T>::from_request(req, state)
            .await
            .map_err(|err| ServerError::ParsingForm(Box::new(err)))?;

        Ok(Self(value))
    }
}

/// [`FormOrJson`], then derive-based validation.
pub struct Valid<T>(pub T);

impl<S, T> FromRequest<S> for Valid<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(
        req: Request,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let FormOrJson(value) =
            FormOrJson::<T>::from_request(req, state).await?;
        value.validate()?;

        Ok(Self(value))
    }
}

/// The authenticated account, resolved from a bearer access token or,
/// failing that, the session cookie.
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// A present but unusable `Authorization` header never falls back to
    /// cookies.
    async fn lookup(
        parts: &Parts,
        state: &AppState,
    ) -> Result<Option<User>, ServerError> {
        let user_id = if let Some(authorization) =
            parts.headers.get(header::AUTHORIZATION)
        {
            let token = authorization
                .to_str()
                .ok()
                .and_then(|value| value.strip_prefix(BEARER));
            let Some(token) = token else {
                return Ok(None);
            };

            match state.token.decode(token, TokenKind::Access) {
                Ok(claims) => claims.sub,
                Err(_) => return Ok(None),
            }
        } else {
            let jar = SignedCookieJar::from_headers(
                &parts.headers,
                Key::from_ref(state),
            );
            match session::user_id(&jar) {
                Some(user_id) => user_id,
                None => return Ok(None),
            }
        };

        let repository = UserRepository::new(state.db.pool.clone());
        let Some(user) = repository.find_by_id(&user_id).await? else {
            return Ok(None);
        };
        if !user.is_active {
            return Ok(None);
        }

        Ok(Some(user))
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match Self::lookup(parts, state).await? {
            Some(user) => Ok(Self(user)),
            None => Err(ServerError::Unauthorized),
        }
    }
}

impl OptionalFromRequestParts<AppState> for CurrentUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(Self::lookup(parts, state).await?.map(Self))
    }
}

/// Plain `302 Found` with a `Location` header. Form flows here keep the
/// classic code rather than `303`/`307`.
pub fn found(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.to_owned())],
    )
        .into_response()
}

/// `GET /`.
pub async fn home() -> Html<&'static str> {
    Html("Welcome to the home page!")
}

/// Any path without a route lands on the registration page.
pub async fn fallback() -> Response {
    found(REGISTER_ROUTE)
}

#[cfg(test)]
pub(crate) async fn state() -> AppState {
    use std::sync::Arc;

    let config = Arc::new(crate::config::Configuration::for_tests());
    let db = crate::database::Database::new("sqlite::memory:", 1)
        .await
        .unwrap();
    db.migrate().await.unwrap();

    AppState {
        token: crate::token::TokenManager::new(
            &config.url,
            &config.secret_key,
            config.access_token_ttl,
            config.refresh_token_ttl,
        ),
        crypto: Arc::new(
            crate::crypto::PasswordManager::new(config.argon2.clone())
                .unwrap(),
        ),
        templates: Arc::new(crate::templates::engine().unwrap()),
        key: Key::derive_from(config.secret_key.as_bytes()),
        config,
        db,
    }
}

#[cfg(test)]
pub(crate) async fn seed_user(
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
) -> User {
    let hash = state.crypto.hash_password(password).unwrap();
    let user = User::new(
        email,
        username,
        &hash,
        "",
        "",
        crate::token::unix_now().unwrap() as i64,
    );
    UserRepository::new(state.db.pool.clone())
        .insert(&user)
        .await
        .unwrap();

    user
}
