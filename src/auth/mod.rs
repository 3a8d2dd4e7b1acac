//! Authorization: permission levels, token resolution and field policy.
mod level;
mod policy;
mod resolver;

pub use level::*;
pub use policy::*;
pub use resolver::*;

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

const BEARER: &str = "Bearer ";

/// Raw token from the `Authorization` header, with or without `Bearer `.
#[derive(Debug, Clone, Default)]
pub struct Credential(pub Option<String>);

impl Credential {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for Credential
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .map(|value| match value.strip_prefix(BEARER) {
                Some(token) => token.trim().to_owned(),
                None => value.trim().to_owned(),
            })
            .filter(|token| !token.is_empty());

        Ok(Credential(token))
    }
}
