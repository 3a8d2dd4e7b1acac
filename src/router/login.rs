//! Password login.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::{ClientIp, Valid};

pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(min = 1, max = 64, message = "Invalid Username Format"))]
    username: String,
    #[validate(length(min = 1, max = 255, message = "Invalid Password Format"))]
    password: String,
}

/// Freshly issued token.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub token_type: String,
    pub token: String,
    pub expires_in: u64,
}

impl Response {
    pub(crate) fn bearer(state: &AppState, token: String) -> Self {
        Self {
            token_type: TOKEN_TYPE.to_owned(),
            token,
            expires_in: state.users.token.expires_in(),
        }
    }
}

/// Handler to log in.
pub async fn handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let token = state
        .users
        .login(&body.username, &body.password, ip)
        .await?;

    Ok(Json(Response::bearer(&state, token)))
}
