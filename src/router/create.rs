//! Account registration.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::auth::{Level, redact};
use crate::error::Result;
use crate::router::Valid;
use crate::user::{Registration, User};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(
        length(min = 1, max = 64, message = "Invalid Username Format"),
        custom(
            function = "crate::router::validate_name",
            message = "Invalid Username Format"
        )
    )]
    name: String,
    #[validate(length(
        min = 8,
        max = 255,
        message = "Invalid Password Format"
    ))]
    password: String,
    #[validate(email(message = "Invalid Email Format"))]
    email: String,
    #[validate(custom(
        function = "crate::router::validate_country",
        message = "Invalid Country Format"
    ))]
    country: Option<String>,
    #[validate(custom(
        function = "crate::router::validate_locale",
        message = "Invalid Locale Format"
    ))]
    locale: Option<String>,
}

/// Handler to create user.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<(StatusCode, Json<User>)> {
    let user = state
        .users
        .register(Registration {
            name: body.name,
            password: body.password,
            email: body.email,
            country: body.country,
            locale: body.locale,
        })
        .await?;

    // the caller owns the new account.
    Ok((StatusCode::CREATED, Json(redact(Level::User, user))))
}
