//! Authorization gates.
//!
//! Gates nest: a permission check first requires an activated user, which
//! first requires an authenticated one. The first failing check decides the
//! error, so an anonymous caller always sees `AuthenticationRequired`.

use std::time::Duration;

use tokio::time::timeout;

use crate::auth::principal::Principal;
use crate::data::PermissionRepository;
use crate::error::{AppError, AppResult};

pub fn ensure_authenticated(principal: &Principal) -> AppResult<()> {
    if principal.is_anonymous() {
        return Err(AppError::AuthenticationRequired);
    }
    Ok(())
}

pub fn ensure_activated(principal: &Principal) -> AppResult<()> {
    ensure_authenticated(principal)?;
    if !principal.activated {
        return Err(AppError::AccountNotActivated);
    }
    Ok(())
}

/// Requires an activated principal holding `code`.
#[derive(Debug, Clone)]
pub struct PermissionGate<S> {
    code: &'static str,
    store: S,
    query_timeout: Duration,
}

impl<S: PermissionRepository> PermissionGate<S> {
    pub fn new(code: &'static str, store: S, query_timeout: Duration) -> Self {
        Self {
            code,
            store,
            query_timeout,
        }
    }

    pub async fn check(&self, principal: &Principal) -> AppResult<()> {
        ensure_activated(principal)?;

        let permissions = timeout(self.query_timeout, self.store.get_all_for_user(principal.id))
            .await
            .map_err(|_| {
                AppError::internal(format!("permission lookup exceeded {:?}", self.query_timeout))
            })??;

        if !permissions.include(self.code) {
            return Err(AppError::PermissionDenied);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryStore;

    fn gate(store: &InMemoryStore) -> PermissionGate<InMemoryStore> {
        PermissionGate::new("movies:write", store.clone(), Duration::from_secs(3))
    }

    #[tokio::test]
    async fn anonymous_needs_authentication_never_permission() {
        let store = InMemoryStore::new();
        let err = gate(&store).check(&Principal::anonymous()).await.unwrap_err();
        assert!(matches!(err, AppError::AuthenticationRequired));
    }

    #[tokio::test]
    async fn unactivated_holder_is_not_activated() {
        let store = InMemoryStore::new();
        store.add_for_user(5, &["movies:write"]).await.unwrap();
        let err = gate(&store).check(&Principal::user(5, false)).await.unwrap_err();
        assert!(matches!(err, AppError::AccountNotActivated));
    }

    #[tokio::test]
    async fn activated_user_without_code_is_denied() {
        let store = InMemoryStore::new();
        store.add_for_user(5, &["movies:read"]).await.unwrap();
        let err = gate(&store).check(&Principal::user(5, true)).await.unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied));
    }

    #[tokio::test]
    async fn activated_holder_passes() {
        let store = InMemoryStore::new();
        store.add_for_user(5, &["movies:write"]).await.unwrap();
        gate(&store).check(&Principal::user(5, true)).await.unwrap();
    }

    #[test]
    fn activation_implies_authentication() {
        assert!(matches!(
            ensure_activated(&Principal::anonymous()),
            Err(AppError::AuthenticationRequired)
        ));
        assert!(ensure_authenticated(&Principal::user(1, false)).is_ok());
    }
}
