//! Error handler for gatekeeper.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ServerError>;

pub const INVALID_PAYLOAD: &str = "Invalid Request Payload";
pub const INVALID_TOKEN_PROVIDED: &str = "Invalid Token Provided";
pub const TOKEN_IS_INVALID: &str = "Token Is Invalid";
pub const TOKEN_USER_MISSING: &str = "Token's User Doesn't Exist";
pub const TOKEN_SUPERSEDED: &str = "Token Has Been Superseded";
pub const MISSING_TOKEN: &str = "Authentication Required";
pub const USER_MISSING: &str = "User Doesn't Exist";
pub const WRONG_PASSWORD: &str = "Wrong Password";
pub const ACCOUNT_BANNED: &str = "Account Banned";
pub const REQUIRES_USER: &str = "Requires User Permissions";
pub const USER_NOT_FOUND: &str = "User Not Found";
pub const CODE_NOT_FOUND: &str = "Verification Code Not Found";
pub const USERNAME_TAKEN: &str = "Username Already Exists";
pub const EMAIL_TAKEN: &str = "Email Already In Use";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("query `{query}` failed with ({args})")]
    Sql {
        query: String,
        args: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("migration failed")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("token could not be signed")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Crypto(#[from] crate::crypto::CryptoError),

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<BoxError>,
    },
}

impl ServerError {
    /// Wrap a [`sqlx::Error`] with the query and its non-secret arguments.
    pub fn sql(
        query: impl Into<String>,
        args: impl std::fmt::Debug,
    ) -> impl FnOnce(sqlx::Error) -> Self {
        let query = query.into();
        move |source| ServerError::Sql {
            query,
            args: format!("{args:?}"),
            source,
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: String,
    instance: Option<String>,
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(
        self,
    ) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            instance: None,
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue.to_string(),
            })
        })
        .collect()
}

/// First validation message, used as the response title.
fn first_message(errors: &ValidationErrors) -> Option<String> {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    fields
        .into_iter()
        .flat_map(|(_, issues)| issues.iter())
        .find_map(|issue| issue.message.as_ref().map(|m| m.to_string()))
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .title(INVALID_PAYLOAD)
            .details(&self.to_string())
            .status(StatusCode::BAD_REQUEST);

        let response = match &self {
            ServerError::Validation(errors) => response
                .title(
                    &first_message(errors)
                        .unwrap_or_else(|| INVALID_PAYLOAD.to_owned()),
                )
                .errors(errors),

            ServerError::Axum(rejection) => {
                response.details(&rejection.body_text())
            },

            ServerError::BadRequest(message) => response.title(message),

            ServerError::Unauthorized(message) => response
                .title(message)
                .details("")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::NotFound(message) => response
                .title(message)
                .details("")
                .status(StatusCode::NOT_FOUND),

            ServerError::Conflict(message) => response
                .title(message)
                .details("")
                .status(StatusCode::CONFLICT),

            ServerError::Sql {
                query,
                args,
                source,
            } => {
                tracing::error!(
                    %query,
                    %args,
                    error = %source,
                    "server returned 500 status"
                );
                ResponseError::default()
            },

            ServerError::Internal { details, source } => {
                tracing::error!(
                    err = ?source,
                    %details,
                    "server returned 500 status"
                );
                ResponseError::default()
            },

            err @ (ServerError::Migrate(_)
            | ServerError::Token(_)
            | ServerError::Crypto(_)) => {
                tracing::error!(error = %err, "server returned 500 status");
                ResponseError::default()
            },
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

/// Response for a panic caught by the outermost layer.
pub fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic message".to_owned()
    };

    ServerError::Internal {
        details,
        source: None,
    }
    .into_response()
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "type": null,
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "instance": null,
                "errors": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: ServerError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let (status, body) =
            render(ServerError::Unauthorized(WRONG_PASSWORD)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["title"], WRONG_PASSWORD);

        let (status, _) = render(ServerError::NotFound(USER_NOT_FOUND)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            render(ServerError::Conflict(USERNAME_TAKEN)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["status"], 409);
    }

    #[tokio::test]
    async fn test_internal_errors_are_not_leaked() {
        let err = ServerError::sql("SELECT * FROM users WHERE id = ?", 7)(
            sqlx::Error::RowNotFound,
        );
        let (status, body) = render(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "");
        assert!(!body.to_string().contains("SELECT"));
    }

    #[tokio::test]
    async fn test_panic_is_internal_error() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
