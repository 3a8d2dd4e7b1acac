use axum::Json;
use axum::extract::{Path, State};

use crate::AppState;
use crate::auth::{Credential, redact};
use crate::error::{Result, ServerError, USER_NOT_FOUND};
use crate::router::users::Target;
use crate::user::User;

/// Get a user by ID or name, showing what the caller may see.
pub async fn handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    credential: Credential,
) -> Result<Json<User>> {
    let Target { level, user } =
        Target::resolve(&state, credential.as_deref(), &id).await?;
    let user = user.ok_or(ServerError::NotFound(USER_NOT_FOUND))?;

    Ok(Json(redact(level, user)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::router::tests::{json_body, login, register, set_flag};
    use crate::*;

    #[tokio::test]
    async fn test_get_handler_public() {
        let app = app(test_state().await);
        let id = register(&app, "alice", "alice@example.com").await;

        for path in [format!("/user/{id}"), "/user/alice".to_owned()] {
            let response = make_request(
                None,
                app.clone(),
                Method::GET,
                &path,
                String::default(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);

            let body = json_body(response).await;
            assert_eq!(body["id"], id);
            assert_eq!(body["name"], "alice");
            assert!(body.get("email").is_none());
            assert!(body.get("password_hash").is_none());
            assert!(body.get("last_token").is_none());
            assert!(body.get("deleted").is_none());
        }
    }

    #[tokio::test]
    async fn test_get_handler_self() {
        let app = app(test_state().await);
        let id = register(&app, "alice", "alice@example.com").await;
        let token = login(&app, "alice").await;

        let response = make_request(
            Some(&token),
            app,
            Method::GET,
            &format!("/user/{id}"),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["email"], "alice@example.com");
        assert!(body.get("last_ip").is_none());
        assert!(body.get("last_token").is_none());
    }

    #[tokio::test]
    async fn test_get_deleted_user() {
        let state = test_state().await;
        let app = app(state.clone());
        let id = register(&app, "alice", "alice@example.com").await;
        let admin = register(&app, "root", "root@example.com").await;
        set_flag(&state, admin, "admin", true).await;
        let token = login(&app, "root").await;
        state.users.store.soft_delete(id).await.unwrap();

        for path in [format!("/user/{id}"), "/user/alice".to_owned()] {
            let response = make_request(
                None,
                app.clone(),
                Method::GET,
                &path,
                String::default(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(
                json_body(response).await["title"],
                error::USER_NOT_FOUND
            );

            let response = make_request(
                Some(&token),
                app.clone(),
                Method::GET,
                &path,
                String::default(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);

            let body = json_body(response).await;
            assert_eq!(body["deleted"], true);
            assert_eq!(body["email"], "alice@example.com");
        }
    }

    #[tokio::test]
    async fn test_get_plural_alias() {
        let app = app(test_state().await);
        let id = register(&app, "alice", "alice@example.com").await;

        for path in [format!("/user/{id}"), format!("/users/{id}")] {
            let response = make_request(
                None,
                app.clone(),
                Method::GET,
                &path,
                String::default(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(json_body(response).await["name"], "alice");
        }
    }

    #[tokio::test]
    async fn test_get_unknown_user() {
        let app = app(test_state().await);

        let response = make_request(
            None,
            app,
            Method::GET,
            "/user/404",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_with_bad_token() {
        let app = app(test_state().await);
        register(&app, "alice", "alice@example.com").await;

        let response = make_request(
            Some("not.a.token"),
            app,
            Method::GET,
            "/user/alice",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
