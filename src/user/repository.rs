//! Handle database requests.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::{EMAIL_TAKEN, Result, ServerError, USERNAME_TAKEN};
use crate::user::{User, UserPatch, UserStore};

const COLUMNS: &str = "id, name, password_hash, email, country, locale, \
    date_created, verified, banned, admin, last_token, last_login, last_ip, \
    deleted, date_deleted";

/// SQLite implementation of [`UserStore`].
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new [`UserRepository`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_by_field(
        &self,
        field: Field,
        value: &str,
        include_deleted: bool,
    ) -> Result<Option<User>> {
        let query = get_by_field_query(field, include_deleted);

        sqlx::query_as::<_, User>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(ServerError::sql(&query, value))
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_id(
        &self,
        id: i64,
        include_deleted: bool,
    ) -> Result<Option<User>> {
        let query = get_by_field_query(Field::Id, include_deleted);

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ServerError::sql(&query, id))
    }

    async fn find_by_name(
        &self,
        name: &str,
        include_deleted: bool,
    ) -> Result<Option<User>> {
        self.find_by_field(Field::Name, name, include_deleted).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_by_field(Field::Email, email, true).await
    }

    async fn list(
        &self,
        start: i64,
        count: i64,
        include_deleted: bool,
    ) -> Result<Vec<User>> {
        let filter = if include_deleted { "" } else { "WHERE deleted = 0" };
        let query = format!(
            "SELECT {COLUMNS} FROM users {filter} ORDER BY id LIMIT ? OFFSET ?"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(count)
            .bind(start)
            .fetch_all(&self.pool)
            .await
            .map_err(ServerError::sql(&query, (start, count)))
    }

    async fn count(&self, include_deleted: bool) -> Result<i64> {
        let query = if include_deleted {
            "SELECT COUNT(*) FROM users"
        } else {
            "SELECT COUNT(*) FROM users WHERE deleted = 0"
        };

        sqlx::query_scalar::<_, i64>(query)
            .fetch_one(&self.pool)
            .await
            .map_err(ServerError::sql(query, ()))
    }

    async fn insert(&self, user: &User) -> Result<i64> {
        const QUERY: &str = r#"INSERT INTO users
            (name, password_hash, email, country, locale, date_created,
            verified, banned, admin)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#;

        let result = sqlx::query(QUERY)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(&user.email)
            .bind(&user.country)
            .bind(&user.locale)
            .bind(user.date_created.unwrap_or_else(Utc::now))
            .bind(user.verified.unwrap_or(false))
            .bind(user.banned.unwrap_or(false))
            .bind(user.admin.unwrap_or(false))
            .execute(&self.pool)
            .await
            .map_err(write_error(QUERY, &user.name))?;

        Ok(result.last_insert_rowid())
    }

    async fn update_fields(&self, id: i64, patch: &UserPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE users SET ");
        let mut set = builder.separated(", ");

        if let Some(name) = &patch.name {
            set.push("name = ").push_bind_unseparated(name.clone());
        }
        if let Some(hash) = &patch.password {
            set.push("password_hash = ").push_bind_unseparated(hash.clone());
        }
        if let Some(email) = &patch.email {
            set.push("email = ").push_bind_unseparated(email.clone());
        }
        if let Some(country) = &patch.country {
            set.push("country = ").push_bind_unseparated(country.clone());
        }
        if let Some(locale) = &patch.locale {
            set.push("locale = ").push_bind_unseparated(locale.clone());
        }
        if let Some(verified) = patch.verified {
            set.push("verified = ").push_bind_unseparated(verified);
        }
        if let Some(banned) = patch.banned {
            set.push("banned = ").push_bind_unseparated(banned);
        }
        if let Some(admin) = patch.admin {
            set.push("admin = ").push_bind_unseparated(admin);
        }
        if let Some(token) = &patch.last_token {
            set.push("last_token = ").push_bind_unseparated(token.clone());
        }
        if let Some(last_login) = patch.last_login {
            set.push("last_login = ").push_bind_unseparated(last_login);
        }
        if let Some(ip) = &patch.last_ip {
            set.push("last_ip = ").push_bind_unseparated(ip.clone());
        }

        builder.push(" WHERE id = ").push_bind(id);
        let query = builder.sql().to_owned();

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(write_error(&query, id))?;

        Ok(())
    }

    async fn soft_delete(&self, id: i64) -> Result<()> {
        // an already deleted row keeps its first deletion date.
        const QUERY: &str = "UPDATE users SET deleted = 1, date_deleted = ? \
            WHERE id = ? AND deleted = 0";

        sqlx::query(QUERY)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ServerError::sql(QUERY, id))?;

        Ok(())
    }

    async fn restore(&self, id: i64) -> Result<()> {
        const QUERY: &str =
            "UPDATE users SET deleted = 0, date_deleted = NULL WHERE id = ?";

        sqlx::query(QUERY)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ServerError::sql(QUERY, id))?;

        Ok(())
    }
}

/// Unique violations become conflicts, anything else is internal.
fn write_error(
    query: &str,
    args: impl std::fmt::Debug,
) -> impl FnOnce(sqlx::Error) -> ServerError {
    let query = query.to_owned();
    move |err| {
        let email = err
            .as_database_error()
            .filter(|db| db.is_unique_violation())
            .map(|db| db.message().contains("users.email"));

        match email {
            Some(true) => ServerError::Conflict(EMAIL_TAKEN),
            Some(false) => ServerError::Conflict(USERNAME_TAKEN),
            None => ServerError::sql(query, args)(err),
        }
    }
}

#[derive(Debug, Clone)]
enum Field {
    Id,
    Name,
    Email,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Field::Id => write!(f, "id"),
            Field::Name => write!(f, "name"),
            Field::Email => write!(f, "email"),
        }
    }
}

fn get_by_field_query(field: Field, include_deleted: bool) -> String {
    let filter = if include_deleted { "" } else { " AND deleted = 0" };
    format!("SELECT {COLUMNS} FROM users WHERE {field} = ?{filter}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    async fn repository() -> UserRepository {
        let db = Database::memory().await.unwrap();
        db.migrate().await.unwrap();
        UserRepository::new(db.pool)
    }

    fn user(name: &str, email: &str) -> User {
        User {
            name: Some(name.into()),
            email: Some(email.into()),
            password_hash: Some("$argon2id$stub".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = repository().await;
        let id = repo.insert(&user("alice", "a@x.com")).await.unwrap();

        let found = repo.find_by_id(id, false).await.unwrap().unwrap();
        assert_eq!(found.name.as_deref(), Some("alice"));
        assert_eq!(found.banned, Some(false));
        assert!(found.date_created.is_some());

        // case-insensitive lookups.
        assert!(repo.find_by_name("ALICE", false).await.unwrap().is_some());
        assert!(repo.find_by_email("A@X.COM").await.unwrap().is_some());
        assert!(repo.find_by_id(id + 1, true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_conflicts() {
        let repo = repository().await;
        repo.insert(&user("alice", "a@x.com")).await.unwrap();

        assert!(matches!(
            repo.insert(&user("Alice", "b@x.com")).await,
            Err(ServerError::Conflict(USERNAME_TAKEN))
        ));
        assert!(matches!(
            repo.insert(&user("bob", "a@x.com")).await,
            Err(ServerError::Conflict(EMAIL_TAKEN))
        ));
    }

    #[tokio::test]
    async fn test_soft_delete_and_restore() {
        let repo = repository().await;
        let id = repo.insert(&user("alice", "a@x.com")).await.unwrap();

        repo.soft_delete(id).await.unwrap();
        assert!(repo.find_by_id(id, false).await.unwrap().is_none());
        assert!(repo.find_by_name("alice", false).await.unwrap().is_none());

        let deleted = repo.find_by_id(id, true).await.unwrap().unwrap();
        assert_eq!(deleted.deleted, Some(true));
        assert!(deleted.date_deleted.is_some());

        repo.soft_delete(id).await.unwrap();
        let again = repo.find_by_id(id, true).await.unwrap().unwrap();
        assert_eq!(again.date_deleted, deleted.date_deleted);

        repo.restore(id).await.unwrap();
        let restored = repo.find_by_id(id, false).await.unwrap().unwrap();
        assert_eq!(restored.deleted, Some(false));
        assert!(restored.date_deleted.is_none());
    }

    #[tokio::test]
    async fn test_update_fields() {
        let repo = repository().await;
        let id = repo.insert(&user("alice", "a@x.com")).await.unwrap();

        let patch = UserPatch {
            country: Some("FR".into()),
            banned: Some(true),
            ..Default::default()
        };
        repo.update_fields(id, &patch).await.unwrap();

        let found = repo.find_by_id(id, false).await.unwrap().unwrap();
        assert_eq!(found.country.as_deref(), Some("FR"));
        assert_eq!(found.banned, Some(true));
        assert_eq!(found.name.as_deref(), Some("alice"));

        // empty patch is a no-op.
        repo.update_fields(id, &UserPatch::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let repo = repository().await;
        for i in 0..5 {
            repo.insert(&user(&format!("user{i}"), &format!("u{i}@x.com")))
                .await
                .unwrap();
        }
        repo.soft_delete(1).await.unwrap();

        assert_eq!(repo.count(false).await.unwrap(), 4);
        assert_eq!(repo.count(true).await.unwrap(), 5);

        let page = repo.list(1, 2, false).await.unwrap();
        let names: Vec<_> =
            page.iter().filter_map(|u| u.name.as_deref()).collect();
        assert_eq!(names, vec!["user2", "user3"]);

        assert_eq!(repo.list(0, 10, true).await.unwrap().len(), 5);
    }
}
