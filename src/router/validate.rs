//! Live validation probes behind the registration form. The page calls
//! them on keyup through htmx; scripts can call them directly. Always
//! `200`, never an error status: a bad value is an answer, not a fault.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use crate::AppState;
use crate::error::Result;
use crate::router::FormOrJson;
use crate::user::repository::UserRepository;
use crate::validation::{self, PasswordVerdict, Verdict};

#[derive(Debug, Deserialize)]
pub struct UsernameProbe {
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailProbe {
    #[serde(default)]
    email: String,
}

/// Accepts both the API names and the form's `password1`/`password2`.
#[derive(Debug, Deserialize)]
pub struct PasswordProbe {
    #[serde(default, alias = "password1")]
    password: String,
    #[serde(default, alias = "password2")]
    password_confirm: Option<String>,
}

/// `GET`/`POST /validate-username/`.
pub async fn username(
    State(state): State<AppState>,
    FormOrJson(probe): FormOrJson<UsernameProbe>,
) -> Result<Json<Verdict>> {
    let repo = UserRepository::new(state.db.pool.clone());

    Ok(Json(validation::check_username(&repo, &probe.username).await?))
}

/// `GET`/`POST /validate-email/`.
pub async fn email(
    State(state): State<AppState>,
    FormOrJson(probe): FormOrJson<EmailProbe>,
) -> Result<Json<Verdict>> {
    let repo = UserRepository::new(state.db.pool.clone());

    Ok(Json(validation::check_email(&repo, &probe.email).await?))
}

/// `GET`/`POST /validate-password/`.
pub async fn password(
    FormOrJson(probe): FormOrJson<PasswordProbe>,
) -> Json<PasswordVerdict> {
    Json(validation::check_password(
        &probe.password,
        probe.password_confirm.as_deref(),
    ))
}
