use axum::Json;
use axum::extract::{Path, State};

use crate::AppState;
use crate::auth::{Credential, Level, redact};
use crate::error::{REQUIRES_USER, Result, ServerError, USER_NOT_FOUND};
use crate::router::Valid;
use crate::router::users::Target;
use crate::user::{User, UserPatch};

/// Update a user. Fields the caller may not write are ignored.
pub async fn handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    credential: Credential,
    Valid(body): Valid<UserPatch>,
) -> Result<Json<User>> {
    let Target { level, user } =
        Target::resolve(&state, credential.as_deref(), &id).await?;
    if !level.at_least(Level::User) {
        return Err(ServerError::Unauthorized(REQUIRES_USER));
    }
    let user = user.ok_or(ServerError::NotFound(USER_NOT_FOUND))?;

    let user = state.users.update(level, user, body).await?;

    Ok(Json(redact(level, user)))
}
