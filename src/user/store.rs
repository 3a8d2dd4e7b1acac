//! Persistence port for users.

use async_trait::async_trait;

use crate::error::Result;
use crate::user::{User, UserPatch};

/// Port for user persistence operations.
///
/// Lookups return `Ok(None)` when nothing matches. Soft-deleted rows are
/// skipped unless `include_deleted` is set.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by ID.
    async fn find_by_id(
        &self,
        id: i64,
        include_deleted: bool,
    ) -> Result<Option<User>>;

    /// Find a user by name, case-insensitively.
    async fn find_by_name(
        &self,
        name: &str,
        include_deleted: bool,
    ) -> Result<Option<User>>;

    /// Find a user by email, case-insensitively. Deleted rows included.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Page of users ordered by ID.
    async fn list(
        &self,
        start: i64,
        count: i64,
        include_deleted: bool,
    ) -> Result<Vec<User>>;

    /// Number of users.
    async fn count(&self, include_deleted: bool) -> Result<i64>;

    /// Insert a new user and return its ID.
    async fn insert(&self, user: &User) -> Result<i64>;

    /// Write every `Some` field of `patch`. `password` must already be hashed.
    async fn update_fields(&self, id: i64, patch: &UserPatch) -> Result<()>;

    /// Flag a user as deleted.
    async fn soft_delete(&self, id: i64) -> Result<()>;

    /// Clear the deletion flag.
    async fn restore(&self, id: i64) -> Result<()>;
}
