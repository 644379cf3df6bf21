//! Unified login endpoint. One handler serves browsers and API clients;
//! only the response shape differs.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::SignedCookieJar;
use serde::Deserialize;
use validator::{ValidateEmail, ValidationError, ValidationErrors};

use crate::error::{Result, ServerError, grouped_errors};
use crate::router::register::TokenResponse;
use crate::router::{ClientMode, CurrentUser, FormOrJson, found};
use crate::user::repository::UserRepository;
use crate::user::{PublicUser, User};
use crate::{AppState, session, validation};

#[derive(Debug, Deserialize)]
pub struct Body {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    next: Option<String>,
}

/// Check credentials. Unknown email, wrong password and disabled account
/// all collapse into `None`; callers must not tell them apart.
async fn authenticate(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<Option<User>> {
    let repo = UserRepository::new(state.db.pool.clone());
    let Some(user) = repo.find_by_email(email).await? else {
        return Ok(None);
    };

    if state.crypto.verify_password(password, &user.password).is_err() {
        return Ok(None);
    }
    if !user.is_active {
        return Ok(None);
    }

    Ok(Some(user))
}

/// Only same-origin, absolute-path targets are honoured; anything else
/// falls back to the configured destination. Browsers read backslashes
/// as slashes, so `/\` is as scheme-relative as `//`.
fn safe_next(state: &AppState, next: Option<&str>) -> String {
    match next {
        Some(next)
            if next.starts_with('/')
                && !next.replace('\\', "/").starts_with("//") =>
        {
            next.to_owned()
        },
        _ => state.config.success_redirect.clone(),
    }
}

/// `GET /login/`. Browsers get the form, or a redirect when already
/// signed in. API clients have no business here.
pub async fn page(
    State(state): State<AppState>,
    mode: ClientMode,
    user: Option<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Result<Response> {
    if mode == ClientMode::Api {
        return Ok(StatusCode::METHOD_NOT_ALLOWED.into_response());
    }
    if user.is_some() {
        return Ok(found(&safe_next(&state, query.next.as_deref())));
    }

    Ok(render_form(&state, "", query.next.as_deref(), &ValidationErrors::new())?
        .into_response())
}

/// `POST /login/` and `POST /api/login/`.
pub async fn submit(
    State(state): State<AppState>,
    mode: ClientMode,
    jar: SignedCookieJar,
    FormOrJson(body): FormOrJson<Body>,
) -> Result<Response> {
    let email = body.email.as_deref().unwrap_or_default();
    let password = body.password.as_deref().unwrap_or_default();

    let mut errors = ValidationErrors::new();
    if email.is_empty() {
        errors.add("email", validation::required());
    } else if !email.validate_email() {
        errors.add(
            "email",
            ValidationError::new("email")
                .with_message(validation::EMAIL_INVALID.into()),
        );
    }
    if password.is_empty() {
        errors.add("password", validation::required());
    }

    let user = if errors.is_empty() {
        let user = authenticate(&state, email, password).await?;
        if user.is_none() {
            errors = validation::invalid_credentials();
        }
        user
    } else {
        None
    };

    let Some(user) = user else {
        return match mode {
            ClientMode::Api => Err(ServerError::Validation(errors)),
            ClientMode::Html => {
                let page =
                    render_form(&state, email, body.next.as_deref(), &errors)?;
                Ok((StatusCode::BAD_REQUEST, page).into_response())
            },
        };
    };

    tracing::info!(user_id = %user.id, "authenticated");

    match mode {
        ClientMode::Api => {
            let pair = state.token.issue_pair(&user.id)?;

            Ok(Json(TokenResponse {
                user: PublicUser::from(&user),
                refresh: pair.refresh,
                access: pair.access,
            })
            .into_response())
        },
        ClientMode::Html => {
            let jar = session::establish(jar, &user.id)?;
            let destination = safe_next(&state, body.next.as_deref());

            Ok((jar, found(&destination)).into_response())
        },
    }
}

fn render_form(
    state: &AppState,
    email: &str,
    next: Option<&str>,
    errors: &ValidationErrors,
) -> Result<Html<String>> {
    let mut context = tera::Context::new();
    context.insert("email", email);
    context.insert("next", next.unwrap_or_default());
    context.insert("errors", &grouped_errors(errors));

    Ok(Html(state.templates.render("login.html", &context)?))
}
