//! Browser sessions, carried by a signed cookie.
//!
//! The cookie value is `user_id:expiry`; the signature comes from the jar
//! key, so there is nothing to store server side.

use axum_extra::extract::SignedCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::error::Result;
use crate::token::unix_now;

/// Cookie holding the session claim.
pub const SESSION_COOKIE: &str = "sessionid";

/// Browser sessions last two weeks.
const SESSION_TTL: u64 = 14 * 24 * 60 * 60;

/// Open a session for `user_id` on the jar.
pub fn establish(jar: SignedCookieJar, user_id: &str) -> Result<SignedCookieJar> {
    let expires = unix_now()? + SESSION_TTL;
    let cookie = Cookie::build((SESSION_COOKIE, format!("{user_id}:{expires}")))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    Ok(jar.add(cookie))
}

/// Close whatever session the jar carries.
pub fn clear(jar: SignedCookieJar) -> SignedCookieJar {
    jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build())
}

/// User behind the session, if any. Tampered, malformed or expired
/// cookies all read as anonymous.
pub fn user_id(jar: &SignedCookieJar) -> Option<String> {
    let cookie = jar.get(SESSION_COOKIE)?;
    let (user_id, expires) = cookie.value().rsplit_once(':')?;
    let expires: u64 = expires.parse().ok()?;

    if user_id.is_empty() || expires <= unix_now().ok()? {
        return None;
    }

    Some(user_id.to_owned())
}
