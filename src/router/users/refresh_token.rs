use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::auth::Credential;
use crate::error::{MISSING_TOKEN, Result, ServerError};
use crate::router::ClientIp;
use crate::router::login::Response;

/// Swap a valid token for a new one. The old token stops working.
pub async fn handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    credential: Credential,
) -> Result<Json<Response>> {
    let caller = state
        .resolver
        .identify(credential.as_deref())
        .await?
        .ok_or(ServerError::Unauthorized(MISSING_TOKEN))?;

    let token = state.users.refresh(&caller, ip).await?;

    Ok(Json(Response::bearer(&state, token)))
}
