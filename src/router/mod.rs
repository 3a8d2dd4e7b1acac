//! HTTP handlers.
pub mod create;
pub mod login;
pub mod status;
pub mod users;
pub mod verify;

use std::net::SocketAddr;
use std::sync::LazyLock;

use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Json, Request};
use axum::http::request::Parts;
use regex_lite::Regex;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidateEmail, ValidationError};

use crate::error::ServerError;

const FORWARDED_FOR: &str = "x-forwarded-for";

static COUNTRY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{2}$").ok());
static LOCALE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]{2,3}([-_][A-Za-z0-9]{2,8})*$").ok()
});

/// JSON body validated with [`validator`].
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(
        req: Request,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Address of the client: first `X-Forwarded-For` hop, else the socket peer.
#[derive(Debug, Clone, Default)]
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get(FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(|ip| ip.trim().to_owned())
            .filter(|ip| !ip.is_empty());

        let ip = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

        Ok(ClientIp(ip))
    }
}

/// Names must not be numeric, to keep `/users/{id}` unambiguous, and must
/// not look like an email.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim() != name
        || name.parse::<f64>().is_ok_and(f64::is_finite)
        || name.validate_email()
    {
        return Err(ValidationError::new("invalid_name"));
    }

    Ok(())
}

/// ISO 3166-1 alpha-2.
pub fn validate_country(country: &str) -> Result<(), ValidationError> {
    match COUNTRY.as_ref() {
        Some(re) if re.is_match(country) => Ok(()),
        _ => Err(ValidationError::new("invalid_country")),
    }
}

/// Loose BCP 47 tag such as `en`, `fr-FR` or `zh_Hant_TW`.
pub fn validate_locale(locale: &str) -> Result<(), ValidationError> {
    match LOCALE.as_ref() {
        Some(re) if re.is_match(locale) => Ok(()),
        _ => Err(ValidationError::new("invalid_locale")),
    }
}
