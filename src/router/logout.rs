//! Session teardown.

use axum::Json;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::SignedCookieJar;
use serde_json::json;

use crate::router::{ClientMode, LOGIN_ROUTE, found};
use crate::session;

/// `GET /logout/` and `GET /api/logout/`. Clears the session either way;
/// never fails, signed in or not. Bearer tokens are untouched since
/// nothing about them is stored server side.
pub async fn handler(mode: ClientMode, jar: SignedCookieJar) -> Response {
    let jar = session::clear(jar);

    match mode {
        ClientMode::Api => (
            jar,
            Json(json!({"detail": "Successfully logged out."})),
        )
            .into_response(),
        ClientMode::Html => (jar, found(LOGIN_ROUTE)).into_response(),
    }
}
