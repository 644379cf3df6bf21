//! Authenticated profile retrieval and update.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::{CurrentUser, Valid};
use crate::user::PublicUser;
use crate::user::repository::UserRepository;

/// Update body. Only the name fields are writable; identity and
/// verification fields are silently ignored when clients send them.
#[derive(Debug, Deserialize, Validate)]
pub struct Body {
    #[validate(length(
        max = 150,
        message = "Ensure this field has no more than 150 characters."
    ))]
    first_name: Option<String>,
    #[validate(length(
        max = 150,
        message = "Ensure this field has no more than 150 characters."
    ))]
    last_name: Option<String>,
}

/// `GET /profile/` and `GET /api/profile/`.
pub async fn retrieve(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(PublicUser::from(&user))
}

/// `PUT`/`PATCH /profile/` and `/api/profile/`. Both verbs behave the
/// same: absent fields keep their value.
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(mut user): CurrentUser,
    Valid(body): Valid<Body>,
) -> Result<Json<PublicUser>> {
    if let Some(first_name) = body.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = body.last_name {
        user.last_name = last_name;
    }

    UserRepository::new(state.db.pool.clone())
        .update(&user)
        .await?;

    Ok(Json(PublicUser::from(&user)))
}
