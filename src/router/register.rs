//! Account creation, as a JSON API and as a rendered form.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::SignedCookieJar;
use serde::{Deserialize, Serialize};
use validator::{ValidationError, ValidationErrors};

use crate::error::{Result, ServerError, grouped_errors};
use crate::router::{FormOrJson, found};
use crate::user::repository::UserRepository;
use crate::user::{PublicUser, User};
use crate::{AppState, session, token, validation};

const MAX_NAME_LENGTH: usize = 150;
const NAME_TOO_LONG: &str =
    "Ensure this field has no more than 150 characters.";

/// JSON registration body.
#[derive(Debug, Deserialize)]
pub struct Body {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    password_confirm: Option<String>,
}

/// Form fields. The page uses the classic `password1`/`password2` pair
/// and carries a terms checkbox the API does not have.
#[derive(Debug, Default, Deserialize)]
pub struct FormBody {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password1: Option<String>,
    #[serde(default)]
    password2: Option<String>,
    #[serde(default)]
    terms: Option<String>,
}

/// Tokens handed out when an account is created or logs in.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub user: PublicUser,
    pub refresh: String,
    pub access: String,
}

/// One submission, whichever surface it came through.
struct Submission {
    email: String,
    username: String,
    first_name: String,
    last_name: String,
    password: String,
    password_confirm: Option<String>,
}

impl From<Body> for Submission {
    fn from(body: Body) -> Self {
        Self {
            email: body.email.unwrap_or_default(),
            username: body.username.unwrap_or_default(),
            first_name: body.first_name.unwrap_or_default(),
            last_name: body.last_name.unwrap_or_default(),
            password: body.password.unwrap_or_default(),
            password_confirm: body.password_confirm,
        }
    }
}

impl From<&FormBody> for Submission {
    fn from(form: &FormBody) -> Self {
        Self {
            email: form.email.clone().unwrap_or_default(),
            username: form.username.clone().unwrap_or_default(),
            first_name: String::default(),
            last_name: String::default(),
            password: form.password1.clone().unwrap_or_default(),
            password_confirm: form.password2.clone(),
        }
    }
}

/// Run every field check and collect the failures together, instead of
/// stopping at the first bad field.
async fn validate_submission(
    repo: &UserRepository,
    submission: &Submission,
    password_field: &'static str,
    confirm_field: &'static str,
) -> Result<ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if submission.username.is_empty() {
        errors.add("username", validation::required());
    } else {
        let verdict =
            validation::check_username(repo, &submission.username).await?;
        if !verdict.valid {
            errors.add(
                "username",
                ValidationError::new("username")
                    .with_message(verdict.message.into()),
            );
        }
    }

    let verdict = validation::check_email(repo, &submission.email).await?;
    if !verdict.valid {
        errors.add(
            "email",
            ValidationError::new("email").with_message(verdict.message.into()),
        );
    }

    for (field, value) in [
        ("first_name", &submission.first_name),
        ("last_name", &submission.last_name),
    ] {
        if value.chars().count() > MAX_NAME_LENGTH {
            errors.add(
                field,
                ValidationError::new("length")
                    .with_message(NAME_TOO_LONG.into()),
            );
        }
    }

    // An empty confirmation counts as missing, not as a mismatch.
    let confirmation = submission
        .password_confirm
        .as_deref()
        .filter(|value| !value.is_empty());
    if confirmation.is_none() {
        errors.add(confirm_field, validation::required());
    }

    let checked = validation::check_password(&submission.password, confirmation);
    if !checked.verdict.valid {
        let field = if checked.verdict.message == validation::PASSWORD_MISMATCH
        {
            confirm_field
        } else {
            password_field
        };
        errors.add(
            field,
            ValidationError::new("password")
                .with_message(checked.verdict.message.into()),
        );
    }

    Ok(errors)
}

async fn create_account(
    state: &AppState,
    submission: &Submission,
) -> Result<User> {
    let hash = state.crypto.hash_password(&submission.password)?;
    let user = User::new(
        &submission.email,
        &submission.username,
        &hash,
        &submission.first_name,
        &submission.last_name,
        token::unix_now()? as i64,
    );

    UserRepository::new(state.db.pool.clone()).insert(&user).await?;
    tracing::info!(user_id = %user.id, "account created");

    Ok(user)
}

/// `POST /api/register/`.
pub async fn api(
    State(state): State<AppState>,
    FormOrJson(body): FormOrJson<Body>,
) -> Result<(StatusCode, Json<TokenResponse>)> {
    let submission = Submission::from(body);
    let repo = UserRepository::new(state.db.pool.clone());

    let errors =
        validate_submission(&repo, &submission, "password", "password_confirm")
            .await?;
    if !errors.is_empty() {
        return Err(ServerError::Validation(errors));
    }

    let user = create_account(&state, &submission).await?;
    let pair = state.token.issue_pair(&user.id)?;

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            user: PublicUser::from(&user),
            refresh: pair.refresh,
            access: pair.access,
        }),
    ))
}

/// `GET /register/`. The page renders for everyone, signed in or not.
pub async fn page(State(state): State<AppState>) -> Result<Html<String>> {
    render_form(&state, &FormBody::default(), &ValidationErrors::new())
}

/// `POST /register/`. On success the browser gets a session and a
/// redirect; on failure the form renders again with inline messages.
pub async fn submit(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    FormOrJson(form): FormOrJson<FormBody>,
) -> Result<Response> {
    let submission = Submission::from(&form);
    let repo = UserRepository::new(state.db.pool.clone());

    let mut errors =
        validate_submission(&repo, &submission, "password1", "password2")
            .await?;
    if form.terms.is_none() {
        errors.add(
            "terms",
            ValidationError::new("terms")
                .with_message(validation::TERMS_REQUIRED.into()),
        );
    }

    if !errors.is_empty() {
        return Ok(render_form(&state, &form, &errors)?.into_response());
    }

    let user = create_account(&state, &submission).await?;
    let jar = session::establish(jar, &user.id)?;

    Ok((jar, found(&state.config.success_redirect)).into_response())
}

fn render_form(
    state: &AppState,
    form: &FormBody,
    errors: &ValidationErrors,
) -> Result<Html<String>> {
    let mut context = tera::Context::new();
    context.insert("username", form.username.as_deref().unwrap_or_default());
    context.insert("email", form.email.as_deref().unwrap_or_default());
    context.insert("errors", &grouped_errors(errors));

    Ok(Html(state.templates.render("register.html", &context)?))
}

#[cfg(test)]
pub(super) mod tests {
    use axum::http::{Method, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};

    use crate::router::{seed_user, state};
    use crate::token::TokenKind;
    use crate::validation;
    use crate::{app, make_request};

    const FORM: &str = "application/x-www-form-urlencoded";

    pub(in crate::router) fn messages_for<'a>(
        body: &'a Value,
        field: &str,
    ) -> Vec<&'a str> {
        body["errors"]
            .as_array()
            .map(|errors| {
                errors
                    .iter()
                    .filter(|error| error["field"] == field)
                    .filter_map(|error| error["message"].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_api_registration_returns_tokens() {
        let state = state().await;
        let app = app(state.clone());

        let response = make_request(
            app,
            Method::POST,
            "/api/register/",
            &[(header::CONTENT_TYPE, "application/json")],
            json!({
                "email": "test@example.com",
                "username": "testuser",
                "first_name": "Testy",
                "password": "StrongPass123!",
                "password_confirm": "StrongPass123!",
            })
            .to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(body["user"]["email"], json!("test@example.com"));
        assert_eq!(body["user"]["username"], json!("testuser"));
        assert_eq!(body["user"]["first_name"], json!("Testy"));
        assert_eq!(body["user"]["is_verified"], json!(false));
        assert!(body["user"]["password"].is_null());

        // Both tokens must decode, each under its own kind.
        let access = body["access"].as_str().unwrap();
        let refresh = body["refresh"].as_str().unwrap();
        let claims =
            state.token.decode(access, TokenKind::Access).unwrap();
        assert_eq!(json!(claims.sub), body["user"]["id"]);
        assert!(state.token.decode(refresh, TokenKind::Refresh).is_ok());
    }

    #[tokio::test]
    async fn test_api_registration_collects_all_errors() {
        let app = app(state().await);

        let response = make_request(
            app,
            Method::POST,
            "/api/register/",
            &[(header::CONTENT_TYPE, "application/json")],
            json!({}).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();

        for field in ["username", "email", "password", "password_confirm"] {
            assert_eq!(
                messages_for(&body, field),
                vec![validation::REQUIRED],
                "{field}"
            );
        }
    }

    #[tokio::test]
    async fn test_api_registration_refuses_duplicates_case_insensitively() {
        let state = state().await;
        let app = app(state.clone());
        seed_user(&state, "ExistingUser", "Taken@Example.com", "StrongPass123!")
            .await;

        let response = make_request(
            app,
            Method::POST,
            "/api/register/",
            &[(header::CONTENT_TYPE, "application/json")],
            json!({
                "email": "taken@example.COM",
                "username": "EXISTINGUSER",
                "password": "StrongPass123!",
                "password_confirm": "StrongPass123!",
            })
            .to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(
            messages_for(&body, "email"),
            vec![validation::EMAIL_TAKEN]
        );
        assert_eq!(
            messages_for(&body, "username"),
            vec![validation::USERNAME_TAKEN]
        );
    }

    #[tokio::test]
    async fn test_api_registration_password_rules() {
        let app = app(state().await);

        for (password, confirm, field, message) in [
            (
                "short1",
                "short1",
                "password",
                validation::PASSWORD_TOO_SHORT,
            ),
            (
                "123456789",
                "123456789",
                "password",
                validation::PASSWORD_NUMERIC,
            ),
            (
                "StrongPass123!",
                "DifferentPass123!",
                "password_confirm",
                validation::PASSWORD_MISMATCH,
            ),
        ] {
            let response = make_request(
                app.clone(),
                Method::POST,
                "/api/register/",
                &[(header::CONTENT_TYPE, "application/json")],
                json!({
                    "email": "test@example.com",
                    "username": "testuser",
                    "password": password,
                    "password_confirm": confirm,
                })
                .to_string(),
            )
            .await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let body =
                response.into_body().collect().await.unwrap().to_bytes();
            let body: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(messages_for(&body, field), vec![message]);
        }
    }

    #[tokio::test]
    async fn test_registration_page_renders() {
        let app = app(state().await);

        let response = make_request(
            app,
            Method::GET,
            "/register/",
            &[],
            String::default(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("Create your account"));
        assert!(html.contains("hx-post=\"/validate-username/\""));
    }

    #[tokio::test]
    async fn test_form_registration_signs_the_browser_in() {
        let state = state().await;
        let app = app(state.clone());

        let response = make_request(
            app,
            Method::POST,
            "/register/",
            &[(header::CONTENT_TYPE, FORM)],
            "username=testuser&email=test%40example.com\
             &password1=StrongPass123%21&password2=StrongPass123%21&terms=on"
                .to_owned(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("sessionid="));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn test_form_registration_rerenders_on_errors() {
        let state = state().await;
        let app = app(state.clone());
        seed_user(&state, "existinguser", "taken@example.com", "StrongPass123!")
            .await;

        // Taken username, no terms checkbox.
        let response = make_request(
            app,
            Method::POST,
            "/register/",
            &[(header::CONTENT_TYPE, FORM)],
            "username=existinguser&email=new%40example.com\
             &password1=StrongPass123%21&password2=StrongPass123%21"
                .to_owned(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains(validation::USERNAME_TAKEN));
        assert!(html.contains(validation::TERMS_REQUIRED));
        // The submitted values survive the round trip.
        assert!(html.contains("value=\"existinguser\""));
    }
}
