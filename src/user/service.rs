use std::sync::Arc;

use chrono::Utc;

use crate::auth::{Level, filter_write};
use crate::crypto::PasswordManager;
use crate::error::{
    ACCOUNT_BANNED, CODE_NOT_FOUND, EMAIL_TAKEN, Result, ServerError,
    USER_MISSING, USER_NOT_FOUND, USERNAME_TAKEN, WRONG_PASSWORD,
};
use crate::token::TokenManager;
use crate::user::{
    User, UserBuilder, UserPatch, UserStore, VerificationRepository,
};

/// Fields accepted when creating an account.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub password: String,
    pub email: String,
    pub country: Option<String>,
    pub locale: Option<String>,
}

/// User manager.
#[derive(Clone)]
pub struct UserService {
    pub store: Arc<dyn UserStore>,
    pub codes: VerificationRepository,
    pub pwd: Arc<PasswordManager>,
    pub token: TokenManager,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(
        store: Arc<dyn UserStore>,
        codes: VerificationRepository,
        pwd: Arc<PasswordManager>,
        token: TokenManager,
    ) -> Self {
        Self {
            store,
            codes,
            pwd,
            token,
        }
    }

    /// Create a user and issue its verification code.
    ///
    /// Hash password before saving.
    pub async fn register(&self, form: Registration) -> Result<User> {
        if self.store.find_by_name(&form.name, true).await?.is_some() {
            return Err(ServerError::Conflict(USERNAME_TAKEN));
        }
        if self.store.find_by_email(&form.email).await?.is_some() {
            return Err(ServerError::Conflict(EMAIL_TAKEN));
        }

        let mut user = UserBuilder::new()
            .name(form.name)
            .email(form.email)
            .password_hash(self.pwd.hash_password(&form.password)?)
            .country(form.country)
            .locale(form.locale)
            .build();
        user.id = self.store.insert(&user).await?;

        tracing::info!(user_id = user.id, "user registered");

        // the account exists either way, a code can be issued again later.
        match self.codes.issue(user.id).await {
            Ok(code) => {
                tracing::debug!(
                    user_id = user.id,
                    %code,
                    "verification code issued"
                )
            },
            Err(err) => {
                tracing::error!(
                    user_id = user.id,
                    error = %err,
                    "verification code not issued"
                )
            },
        }

        Ok(user)
    }

    /// Check credentials and issue a new token.
    ///
    /// A soft-deleted account is restored by a successful login.
    pub async fn login(
        &self,
        name: &str,
        password: &str,
        ip: Option<String>,
    ) -> Result<String> {
        let outcome = |outcome: &'static str| {
            metrics::counter!("login_attempts_total", "outcome" => outcome)
                .increment(1);
        };

        let Some(user) = self.store.find_by_name(name, true).await? else {
            outcome("unknown_user");
            return Err(ServerError::Unauthorized(USER_MISSING));
        };

        if user.is_banned() {
            outcome("banned");
            return Err(ServerError::Unauthorized(ACCOUNT_BANNED));
        }

        let hash = user.password_hash.as_deref().unwrap_or_default();
        if !self.pwd.verify_password(password, hash)? {
            outcome("wrong_password");
            return Err(ServerError::Unauthorized(WRONG_PASSWORD));
        }

        if user.is_deleted() {
            self.store.restore(user.id).await?;
            tracing::info!(user_id = user.id, "deleted user restored on login");
        }

        outcome("success");
        self.issue(user.id, ip).await
    }

    /// Issue a new token for an already resolved caller.
    pub async fn refresh(
        &self,
        caller: &User,
        ip: Option<String>,
    ) -> Result<String> {
        if caller.is_banned() {
            return Err(ServerError::Unauthorized(ACCOUNT_BANNED));
        }

        self.issue(caller.id, ip).await
    }

    /// Mint a token and record it as the only valid one.
    async fn issue(&self, user_id: i64, ip: Option<String>) -> Result<String> {
        let token = self.token.create(user_id)?;
        let patch = filter_write(
            Level::Server,
            UserPatch {
                last_token: Some(token.clone()),
                last_login: Some(Utc::now()),
                last_ip: ip,
                ..Default::default()
            },
        );
        self.store.update_fields(user_id, &patch).await?;

        Ok(token)
    }

    /// Consume a verification code and flag its owner as verified.
    pub async fn verify(&self, code: &str) -> Result<i64> {
        let user_id = self
            .codes
            .consume(code)
            .await?
            .ok_or(ServerError::NotFound(CODE_NOT_FOUND))?;

        let patch = filter_write(
            Level::Server,
            UserPatch {
                verified: Some(true),
                ..Default::default()
            },
        );
        self.store.update_fields(user_id, &patch).await?;
        tracing::info!(user_id, "email verified");

        Ok(user_id)
    }

    /// Apply `patch` to `target` with the rights of `level`.
    ///
    /// Forbidden fields are dropped. When nothing is left, `target` is
    /// returned untouched. Otherwise the stored user is read back.
    pub async fn update(
        &self,
        level: Level,
        target: User,
        patch: UserPatch,
    ) -> Result<User> {
        let mut patch = filter_write(level, patch);
        if patch.is_empty() {
            return Ok(target);
        }

        if let Some(name) = &patch.name {
            let owner = self.store.find_by_name(name, true).await?;
            if owner.is_some_and(|owner| owner.id != target.id) {
                return Err(ServerError::Conflict(USERNAME_TAKEN));
            }
        }
        if let Some(email) = &patch.email {
            let owner = self.store.find_by_email(email).await?;
            if owner.is_some_and(|owner| owner.id != target.id) {
                return Err(ServerError::Conflict(EMAIL_TAKEN));
            }
        }

        patch.country = patch.country.map(|country| country.to_uppercase());
        let patch = self.hash_password(patch)?;
        self.store.update_fields(target.id, &patch).await?;
        tracing::info!(user_id = target.id, %level, "user updated");

        self.store
            .find_by_id(target.id, true)
            .await?
            .ok_or(ServerError::NotFound(USER_NOT_FOUND))
    }

    /// Replace a plain password in `patch` by its hash.
    pub fn hash_password(&self, mut patch: UserPatch) -> Result<UserPatch> {
        if let Some(password) = patch.password.take() {
            patch.password = Some(self.pwd.hash_password(password)?);
        }

        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, email: &str) -> Registration {
        Registration {
            name: name.into(),
            password: "password123".into(),
            email: email.into(),
            country: None,
            locale: None,
        }
    }

    #[tokio::test]
    async fn test_register_conflicts() {
        let users = crate::test_state().await.users;
        users.register(form("alice", "a@x.com")).await.unwrap();

        assert!(matches!(
            users.register(form("ALICE", "b@x.com")).await,
            Err(ServerError::Conflict(USERNAME_TAKEN))
        ));
        assert!(matches!(
            users.register(form("bob", "a@x.com")).await,
            Err(ServerError::Conflict(EMAIL_TAKEN))
        ));
    }

    #[tokio::test]
    async fn test_register_without_verification_code() {
        let state = crate::test_state().await;
        sqlx::query("DROP TABLE verification_codes")
            .execute(&state.db.pool)
            .await
            .unwrap();

        let users = &state.users;
        let user = users.register(form("alice", "a@x.com")).await.unwrap();
        assert!(user.id > 0);
        let stored = users.store.find_by_id(user.id, false).await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_password_is_hashed() {
        let users = crate::test_state().await.users;
        let user = users.register(form("alice", "a@x.com")).await.unwrap();

        let stored =
            users.store.find_by_id(user.id, false).await.unwrap().unwrap();
        let hash = stored.password_hash.unwrap();
        assert_ne!(hash, "password123");
        assert!(users.pwd.verify_password("password123", &hash).unwrap());
    }

    #[tokio::test]
    async fn test_login_restores_deleted_user() {
        let users = crate::test_state().await.users;
        let user = users.register(form("alice", "a@x.com")).await.unwrap();
        users.store.soft_delete(user.id).await.unwrap();

        // wrong password leaves the account deleted.
        assert!(users.login("alice", "nope-nope", None).await.is_err());
        let hidden = users.store.find_by_id(user.id, false).await.unwrap();
        assert!(hidden.is_none());

        let token = users
            .login("alice", "password123", Some("10.0.0.1".into()))
            .await
            .unwrap();
        let stored =
            users.store.find_by_id(user.id, false).await.unwrap().unwrap();
        assert_eq!(stored.deleted, Some(false));
        assert_eq!(stored.last_token.as_deref(), Some(token.as_str()));
        assert_eq!(stored.last_ip.as_deref(), Some("10.0.0.1"));
        assert!(stored.last_login.is_some());
    }

    #[tokio::test]
    async fn test_update() {
        let users = crate::test_state().await.users;
        let alice = users.register(form("alice", "a@x.com")).await.unwrap();
        users.register(form("bob", "b@x.com")).await.unwrap();

        let patch = UserPatch {
            name: Some("alicia".into()),
            password: Some("new-password".into()),
            country: Some("de".into()),
            banned: Some(true),
            ..Default::default()
        };
        let user =
            users.update(Level::User, alice.clone(), patch).await.unwrap();
        assert_eq!(user.name.as_deref(), Some("alicia"));
        assert_eq!(user.country.as_deref(), Some("DE"));
        assert_eq!(user.banned, Some(false));
        let hash = user.password_hash.unwrap();
        assert!(users.pwd.verify_password("new-password", &hash).unwrap());

        let taken = UserPatch {
            email: Some("B@X.COM".into()),
            ..Default::default()
        };
        assert!(matches!(
            users.update(Level::User, alice.clone(), taken).await,
            Err(ServerError::Conflict(EMAIL_TAKEN))
        ));

        // nothing writable at public level.
        let ignored = UserPatch {
            name: Some("mallory".into()),
            ..Default::default()
        };
        let user =
            users.update(Level::Public, alice.clone(), ignored).await.unwrap();
        assert_eq!(user, alice);
    }

    #[tokio::test]
    async fn test_verify() {
        let users = crate::test_state().await.users;
        let user = users.register(form("alice", "a@x.com")).await.unwrap();
        let code = users.codes.issue(user.id).await.unwrap();

        assert_eq!(users.verify(&code).await.unwrap(), user.id);
        let stored =
            users.store.find_by_id(user.id, false).await.unwrap().unwrap();
        assert_eq!(stored.verified, Some(true));

        assert!(matches!(
            users.verify(&code).await,
            Err(ServerError::NotFound(CODE_NOT_FOUND))
        ));
    }
}
