mod builder;
mod repository;
mod service;
mod store;
mod verification;

pub use builder::*;
pub use repository::*;
pub use service::*;
pub use store::*;
pub use verification::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// User as saved on database.
///
/// Every attribute but `id` is optional so that redaction can remove it
/// from the serialized form.
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow,
)]
pub struct User {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip)]
    pub password_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_deleted: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.admin.unwrap_or(false)
    }

    pub fn is_banned(&self) -> bool {
        self.banned.unwrap_or(false)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.unwrap_or(false)
    }
}

/// Partial update of a [`User`]. `None` leaves the column untouched.
///
/// `password` holds the plain password as received and is replaced by its
/// hash before reaching the store.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Validate)]
pub struct UserPatch {
    #[validate(
        length(min = 1, max = 64, message = "Invalid Username Format"),
        custom(
            function = "crate::router::validate_name",
            message = "Invalid Username Format"
        )
    )]
    pub name: Option<String>,
    #[validate(length(
        min = 8,
        max = 255,
        message = "Invalid Password Format"
    ))]
    pub password: Option<String>,
    #[validate(email(message = "Invalid Email Format"))]
    pub email: Option<String>,
    #[validate(custom(
        function = "crate::router::validate_country",
        message = "Invalid Country Format"
    ))]
    pub country: Option<String>,
    #[validate(custom(
        function = "crate::router::validate_locale",
        message = "Invalid Locale Format"
    ))]
    pub locale: Option<String>,
    pub verified: Option<bool>,
    pub banned: Option<bool>,
    pub admin: Option<bool>,
    pub last_token: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub last_ip: Option<String>,
}

impl UserPatch {
    /// Whether the patch would write nothing.
    pub fn is_empty(&self) -> bool {
        *self == UserPatch::default()
    }
}
