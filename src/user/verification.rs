//! One-time email verification codes.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{Result, ServerError};

const CODE_LENGTH: usize = 32;

/// Issue and consume verification codes.
#[derive(Clone)]
pub struct VerificationRepository {
    pool: SqlitePool,
}

impl VerificationRepository {
    /// Create a new [`VerificationRepository`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a code for `user_id`, replacing any previous one.
    pub async fn issue(&self, user_id: i64) -> Result<String> {
        const QUERY: &str = r#"INSERT INTO verification_codes
            (code, user_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (user_id) DO UPDATE
            SET code = excluded.code, created_at = excluded.created_at"#;

        let code = crate::crypto::random_hex(CODE_LENGTH);
        sqlx::query(QUERY)
            .bind(&code)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(ServerError::sql(QUERY, user_id))?;

        Ok(code)
    }

    /// Remove `code` and return the user it belonged to.
    pub async fn consume(&self, code: &str) -> Result<Option<i64>> {
        const QUERY: &str =
            "DELETE FROM verification_codes WHERE code = ? RETURNING user_id";

        sqlx::query_scalar::<_, i64>(QUERY)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(ServerError::sql(QUERY, "<code>"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::user::{UserBuilder, UserRepository, UserStore};

    #[tokio::test]
    async fn test_issue_and_consume() {
        let db = Database::memory().await.unwrap();
        db.migrate().await.unwrap();
        let users = UserRepository::new(db.pool.clone());
        let id = users
            .insert(&UserBuilder::new().name("alice").email("a@x.com").build())
            .await
            .unwrap();

        let codes = VerificationRepository::new(db.pool);
        let first = codes.issue(id).await.unwrap();
        let second = codes.issue(id).await.unwrap();

        // reissuing replaces the previous code.
        assert_eq!(codes.consume(&first).await.unwrap(), None);
        assert_eq!(codes.consume(&second).await.unwrap(), Some(id));
        assert_eq!(codes.consume(&second).await.unwrap(), None);
    }
}
