//! The caller a request acts on behalf of.

use crate::data::User;

/// Identity attached to every request that passed the authenticate stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub activated: bool,
    anonymous: bool,
}

impl Principal {
    /// The unauthenticated caller. Never persisted.
    pub fn anonymous() -> Self {
        Self {
            id: 0,
            activated: false,
            anonymous: true,
        }
    }

    pub fn user(id: i64, activated: bool) -> Self {
        Self {
            id,
            activated,
            anonymous: false,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Principal::user(user.id, user.data.activated)
    }
}
