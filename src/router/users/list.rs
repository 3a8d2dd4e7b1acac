use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::auth::{Credential, Level, redact};
use crate::error::Result;
use crate::user::User;

const DEFAULT_COUNT: i64 = 10;
const MAX_COUNT: i64 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    start: Option<i64>,
    count: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct Page {
    start_index: i64,
    total_items: i64,
    users: Vec<User>,
}

/// Page through users, redacted for the caller.
pub async fn handler(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    credential: Credential,
) -> Result<Json<Page>> {
    let start = pagination.start.unwrap_or(0).max(0);
    let count = pagination
        .count
        .unwrap_or(DEFAULT_COUNT)
        .clamp(0, MAX_COUNT);

    let level = state.resolver.resolve(credential.as_deref(), None).await?;
    let include_deleted = level.at_least(Level::Admin);

    let store = &state.users.store;
    let total_items = store.count(include_deleted).await?;
    let users = store
        .list(start, count, include_deleted)
        .await?
        .into_iter()
        .map(|user| redact(level, user))
        .collect();

    Ok(Json(Page {
        start_index: start,
        total_items,
        users,
    }))
}
