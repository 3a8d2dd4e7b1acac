//! Users-related HTTP API.
mod delete;
mod get;
mod list;
pub mod refresh_token;
mod update;

use axum::Router;
use axum::routing::get;

use crate::AppState;
use crate::auth::Level;
use crate::error::Result;
use crate::user::User;

/// `/user` and `/user/{id}` routes, also served under `/users`.
pub fn router() -> Router<AppState> {
    let one = get(get::handler)
        .put(update::handler)
        .patch(update::handler)
        .delete(delete::handler);

    Router::new()
        // `GET /user` goes to `list`.
        .route("/user", get(list::handler))
        // `GET|PUT|PATCH|DELETE /user/{id}` act on one user.
        .route("/user/{id}", one.clone())
        .route("/users", get(list::handler))
        .route("/users/{id}", one)
}

/// User designated by a path segment, along with the caller's level on it.
struct Target {
    level: Level,
    user: Option<User>,
}

impl Target {
    /// Resolve `segment` as an ID when numeric, as a name otherwise.
    ///
    /// Deleted users are only visible from Admin rank.
    async fn resolve(
        state: &AppState,
        token: Option<&str>,
        segment: &str,
    ) -> Result<Self> {
        let store = &state.users.store;

        if let Ok(id) = segment.parse::<i64>() {
            let level = state.resolver.resolve(token, Some(id)).await?;
            let include_deleted = level.at_least(Level::Admin);
            let user = store.find_by_id(id, include_deleted).await?;
            return Ok(Target { level, user });
        }

        let user = store.find_by_name(segment, true).await?;
        let level = state
            .resolver
            .resolve(token, user.as_ref().map(|user| user.id))
            .await?;
        let user = user.filter(|user| {
            !user.is_deleted() || level.at_least(Level::Admin)
        });

        Ok(Target { level, user })
    }
}
