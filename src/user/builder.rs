//! Typed builder for User.

use chrono::Utc;

use crate::user::User;

/// [`User`] builder.
///
/// A user can only be built once both `name` and `email` are set.
#[derive(Debug, Clone)]
pub struct UserBuilder<Name, Email> {
    name: Name,
    email: Email,
    password_hash: String,
    country: Option<String>,
    locale: Option<String>,
}

/// Value is missing on [`UserBuilder`].
#[derive(Debug, Clone)]
pub struct Missing;

/// Value is present on [`UserBuilder`].
#[derive(Debug, Clone)]
pub struct Present<T>(pub T);

impl Default for UserBuilder<Missing, Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl UserBuilder<Missing, Missing> {
    /// Create a new [`UserBuilder`].
    pub fn new() -> Self {
        Self {
            name: Missing,
            email: Missing,
            password_hash: String::default(),
            country: None,
            locale: None,
        }
    }
}

impl<Email> UserBuilder<Missing, Email> {
    /// Update `name` field on [`UserBuilder`].
    pub fn name(
        self,
        name: impl Into<String>,
    ) -> UserBuilder<Present<String>, Email> {
        UserBuilder {
            name: Present(name.into()),
            email: self.email,
            password_hash: self.password_hash,
            country: self.country,
            locale: self.locale,
        }
    }
}

impl<Name> UserBuilder<Name, Missing> {
    /// Update `email` field on [`UserBuilder`].
    pub fn email(
        self,
        email: impl Into<String>,
    ) -> UserBuilder<Name, Present<String>> {
        UserBuilder {
            name: self.name,
            email: Present(email.into()),
            password_hash: self.password_hash,
            country: self.country,
            locale: self.locale,
        }
    }
}

impl<Name, Email> UserBuilder<Name, Email> {
    /// Update `password_hash` field on [`UserBuilder`].
    pub fn password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = hash.into();
        self
    }

    /// Update `country` field on [`UserBuilder`].
    pub fn country(mut self, country: Option<String>) -> Self {
        self.country = country.map(|c| c.to_uppercase());
        self
    }

    /// Update `locale` field on [`UserBuilder`].
    pub fn locale(mut self, locale: Option<String>) -> Self {
        self.locale = locale;
        self
    }
}

impl UserBuilder<Present<String>, Present<String>> {
    /// Build a fresh, unsaved [`User`].
    pub fn build(self) -> User {
        User {
            id: 0,
            name: Some(self.name.0),
            password_hash: Some(self.password_hash),
            email: Some(self.email.0),
            country: self.country,
            locale: self.locale,
            date_created: Some(Utc::now()),
            verified: Some(false),
            banned: Some(false),
            admin: Some(false),
            deleted: Some(false),
            ..Default::default()
        }
    }
}
