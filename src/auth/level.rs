//! Permission levels.

use std::cmp::Ordering;

use serde::Serialize;

use crate::user::User;

/// Authorization tier of a caller relative to the user it acts upon.
///
/// `User` and `AdminUser` share the same rank: both mean the caller acts on
/// its own account, `AdminUser` additionally records that it is an admin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Public,
    User,
    AdminUser,
    Admin,
    /// Internal identity, never resolved from a request.
    Server,
}

impl Level {
    pub const fn rank(self) -> u8 {
        match self {
            Level::Public => 0,
            Level::User | Level::AdminUser => 1,
            Level::Admin => 2,
            Level::Server => 3,
        }
    }

    /// Total order over ranks.
    pub fn compare(self, other: Level) -> Ordering {
        self.rank().cmp(&other.rank())
    }

    pub fn at_least(self, other: Level) -> bool {
        self.compare(other) != Ordering::Less
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Public => "public",
            Level::User => "user",
            Level::AdminUser => "admin_user",
            Level::Admin => "admin",
            Level::Server => "server",
        }
    }

    /// Level of an already validated `caller` acting on `target`.
    ///
    /// Banned callers are always public. Self-identity wins over admin
    /// status, so an admin editing its own account gets `AdminUser`.
    pub fn derive(caller: Option<&User>, target: Option<i64>) -> Level {
        let Some(caller) = caller else {
            return Level::Public;
        };
        if caller.is_banned() {
            return Level::Public;
        }

        let admin = caller.is_admin();
        match target {
            None if admin => Level::Admin,
            None => Level::Public,
            Some(target) if target == caller.id => {
                if admin { Level::AdminUser } else { Level::User }
            },
            Some(_) if admin => Level::Admin,
            Some(_) => Level::Public,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(id: i64, admin: bool, banned: bool) -> User {
        User {
            id,
            admin: Some(admin),
            banned: Some(banned),
            ..Default::default()
        }
    }

    #[test]
    fn test_ordering() {
        assert_eq!(Level::User.compare(Level::AdminUser), Ordering::Equal);
        assert!(Level::Public.compare(Level::User).is_lt());
        assert!(Level::Admin.compare(Level::AdminUser).is_gt());
        assert!(Level::Server.at_least(Level::Admin));
        assert!(Level::AdminUser.at_least(Level::User));
        assert!(!Level::Public.at_least(Level::User));
    }

    #[test]
    fn test_anonymous() {
        assert_eq!(Level::derive(None, None), Level::Public);
        assert_eq!(Level::derive(None, Some(1)), Level::Public);
    }

    #[test]
    fn test_banned_is_public() {
        for admin in [false, true] {
            let user = caller(1, admin, true);
            assert_eq!(Level::derive(Some(&user), None), Level::Public);
            assert_eq!(Level::derive(Some(&user), Some(1)), Level::Public);
            assert_eq!(Level::derive(Some(&user), Some(2)), Level::Public);
        }
    }

    #[test]
    fn test_self() {
        let user = caller(1, false, false);
        assert_eq!(Level::derive(Some(&user), Some(1)), Level::User);

        let admin = caller(1, true, false);
        assert_eq!(Level::derive(Some(&admin), Some(1)), Level::AdminUser);
    }

    #[test]
    fn test_other() {
        let user = caller(1, false, false);
        assert_eq!(Level::derive(Some(&user), Some(2)), Level::Public);
        assert_eq!(Level::derive(Some(&user), None), Level::Public);

        let admin = caller(1, true, false);
        assert_eq!(Level::derive(Some(&admin), Some(2)), Level::Admin);
        assert_eq!(Level::derive(Some(&admin), None), Level::Admin);
    }

    #[test]
    fn test_unset_flags() {
        let user = User {
            id: 3,
            ..Default::default()
        };
        assert_eq!(Level::derive(Some(&user), Some(3)), Level::User);
    }
}
