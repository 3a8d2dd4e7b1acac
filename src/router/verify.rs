//! Email verification links.

use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};

use crate::AppState;
use crate::error::Result;

/// Consume a one-time code.
pub async fn handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Value>> {
    state.users.verify(&code).await?;

    Ok(Json(json!({ "verified": true })))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::router::tests::{json_body, register};
    use crate::*;

    #[tokio::test]
    async fn test_verify_handler() {
        let state = test_state().await;
        let app = app(state.clone());
        let id = register(&app, "alice", "alice@example.com").await;
        let code = state.users.codes.issue(id).await.unwrap();

        let path = format!("/verify/{code}");
        let response = make_request(
            None,
            app.clone(),
            Method::GET,
            &path,
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["verified"], true);

        let user = state
            .users
            .store
            .find_by_id(id, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.verified, Some(true));

        // codes are single use.
        let response = make_request(
            None,
            app,
            Method::GET,
            &path,
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
