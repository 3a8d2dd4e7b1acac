//! Resolve a request's token into a permission level.

use std::sync::Arc;

use crate::auth::Level;
use crate::error::{Result, ServerError, TOKEN_SUPERSEDED, TOKEN_USER_MISSING};
use crate::token::TokenManager;
use crate::user::{User, UserStore};

/// Turns bearer tokens into identities and levels.
///
/// Nothing is cached: every call reads the caller back from the store, so
/// bans and token rotation apply to the very next request.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn UserStore>,
    token: TokenManager,
}

impl Resolver {
    /// Create a new [`Resolver`].
    pub fn new(store: Arc<dyn UserStore>, token: TokenManager) -> Self {
        Self { store, token }
    }

    /// Load the identity behind `token`.
    ///
    /// `Ok(None)` is an anonymous caller. A token that cannot be verified,
    /// points to a missing user or is not the latest one issued is an error.
    pub async fn identify(&self, token: Option<&str>) -> Result<Option<User>> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };

        let claims = self.token.decode(token)?;
        let Some(id) = claims.user_id() else {
            return Ok(None);
        };

        let caller = self
            .store
            .find_by_id(id, true)
            .await?
            .ok_or(ServerError::Unauthorized(TOKEN_USER_MISSING))?;

        if caller.last_token.as_deref() != Some(token) {
            tracing::debug!(user_id = id, "superseded token presented");
            return Err(ServerError::Unauthorized(TOKEN_SUPERSEDED));
        }

        Ok(Some(caller))
    }

    /// Level of the caller behind `token` acting on `target`.
    pub async fn resolve(
        &self,
        token: Option<&str>,
        target: Option<i64>,
    ) -> Result<Level> {
        let caller = self.identify(token).await?;
        let level = Level::derive(caller.as_ref(), target);

        metrics::counter!("auth_resolutions_total", "level" => level.as_str())
            .increment(1);

        Ok(level)
    }
}
