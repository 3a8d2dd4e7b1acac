//! Soft deletion. A later successful login restores the account.

use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::AppState;
use crate::auth::{Credential, Level};
use crate::error::{REQUIRES_USER, Result, ServerError, USER_NOT_FOUND};
use crate::router::users::Target;

pub async fn handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    credential: Credential,
) -> Result<StatusCode> {
    let Target { level, user } =
        Target::resolve(&state, credential.as_deref(), &id).await?;
    if !level.at_least(Level::User) {
        return Err(ServerError::Unauthorized(REQUIRES_USER));
    }
    let user = user.ok_or(ServerError::NotFound(USER_NOT_FOUND))?;

    state.users.store.soft_delete(user.id).await?;
    tracing::info!(user_id = user.id, %level, "user deleted");

    Ok(StatusCode::ACCEPTED)
}
