//! Mint a fresh access token from a refresh token.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::router::FormOrJson;
use crate::token::TokenKind;
use crate::validation;

#[derive(Debug, Deserialize)]
pub struct Body {
    #[serde(default)]
    refresh: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub access: String,
}

/// `POST /api/token/refresh/`. Stateless: the refresh token itself is
/// the only proof, nothing is looked up or revoked.
pub async fn handler(
    State(state): State<AppState>,
    FormOrJson(body): FormOrJson<Body>,
) -> Result<Json<Response>> {
    let Some(refresh) = body.refresh.filter(|token| !token.is_empty())
    else {
        let mut errors = ValidationErrors::new();
        errors.add("refresh", validation::required());
        return Err(ServerError::Validation(errors));
    };

    let claims = state.token.decode(&refresh, TokenKind::Refresh)?;
    let access = state.token.create(TokenKind::Access, &claims.sub)?;

    Ok(Json(Response { access }))
}
