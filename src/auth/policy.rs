//! Field visibility: what a level may read and write.

use crate::auth::Level;
use crate::user::{User, UserPatch};

/// Strip the fields `level` is not allowed to see.
pub fn redact(level: Level, mut user: User) -> User {
    user.password_hash = None;

    if level == Level::Public {
        user.email = None;
    }

    if !level.at_least(Level::Admin) {
        user.last_ip = None;
        user.deleted = None;
        user.date_deleted = None;
    }

    if level != Level::Server {
        user.last_token = None;
    }

    user
}

/// Drop the fields `level` is not allowed to set. Never fails.
pub fn filter_write(level: Level, patch: UserPatch) -> UserPatch {
    let owner = matches!(level, Level::User | Level::AdminUser | Level::Server);
    let admin = level == Level::Admin;
    let server = level == Level::Server;

    UserPatch {
        name: keep(level != Level::Public, patch.name),
        password: keep(owner, patch.password),
        email: keep(owner, patch.email),
        country: keep(owner, patch.country),
        locale: keep(owner, patch.locale),
        banned: keep(admin, patch.banned),
        verified: keep(server, patch.verified),
        last_token: keep(server, patch.last_token),
        last_login: keep(server, patch.last_login),
        last_ip: keep(server, patch.last_ip),
        // database only.
        admin: None,
    }
}

fn keep<T>(allowed: bool, value: Option<T>) -> Option<T> {
    value.filter(|_| allowed)
}
