//! Bearer credential resolution and the request-scoped principal carrier.

use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderValue};
use tokio::time::timeout;

use crate::auth::principal::Principal;
use crate::data::models::validate_token_plaintext;
use crate::data::{TokenScope, UserRepository, Validator};
use crate::error::{AppError, AppResult};

/// Resolves an `Authorization` header to a [`Principal`].
#[derive(Debug, Clone)]
pub struct AuthenticationContext<S> {
    store: S,
    query_timeout: Duration,
}

impl<S: UserRepository> AuthenticationContext<S> {
    pub fn new(store: S, query_timeout: Duration) -> Self {
        Self {
            store,
            query_timeout,
        }
    }

    /// Absent header resolves to the anonymous principal.
    ///
    /// Anything but a well-formed `Bearer <token>` naming a live authentication
    /// token is [`AppError::InvalidAuthToken`]. Store failures and lookups that
    /// outlive the query timeout are [`AppError::Internal`].
    pub async fn resolve(&self, header: Option<&HeaderValue>) -> AppResult<Principal> {
        let Some(header) = header else {
            return Ok(Principal::anonymous());
        };

        let value = header.to_str().map_err(|_| AppError::InvalidAuthToken)?;
        let token = bearer_token(value)?;

        let mut v = Validator::new();
        validate_token_plaintext(&mut v, token);
        if !v.valid() {
            return Err(AppError::InvalidAuthToken);
        }

        let lookup = self.store.get_for_token(TokenScope::Authentication, token);
        match timeout(self.query_timeout, lookup).await {
            Ok(Ok(user)) => Ok(Principal::from(&user)),
            Ok(Err(AppError::RecordNotFound)) => Err(AppError::InvalidAuthToken),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AppError::internal(format!(
                "token lookup exceeded {:?}",
                self.query_timeout
            ))),
        }
    }
}

/// Exactly two space-separated parts, the first being `Bearer`.
fn bearer_token(value: &str) -> AppResult<&str> {
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(token),
        _ => Err(AppError::InvalidAuthToken),
    }
}

#[derive(Debug, Clone)]
struct RequestPrincipal(Principal);

/// Attach `principal` to the request. A second attach is a programming error.
pub fn attach_principal(extensions: &mut Extensions, principal: Principal) -> AppResult<()> {
    if extensions.get::<RequestPrincipal>().is_some() {
        return Err(AppError::internal("principal already attached to request"));
    }
    extensions.insert(RequestPrincipal(principal));
    Ok(())
}

/// The principal attached by the authenticate stage.
pub fn principal_of(extensions: &Extensions) -> AppResult<&Principal> {
    extensions
        .get::<RequestPrincipal>()
        .map(|carrier| &carrier.0)
        .ok_or_else(|| AppError::internal("missing principal in request context"))
}

/// Extractor for the request's [`Principal`].
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

impl<St: Send + Sync> FromRequestParts<St> for CurrentPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        principal_of(&parts.extensions).cloned().map(CurrentPrincipal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{InMemoryStore, TokenRepository, User, UserData};

    const TOKEN: &str = "Y3QMGX3PJ3WLRL2YRTQGQ6KRHU";

    async fn context_with_user(activated: bool) -> (AuthenticationContext<InMemoryStore>, i64) {
        let store = InMemoryStore::new();
        let user = store
            .insert_user(UserData {
                name: "Alice".into(),
                email: "alice@example.com".into(),
                activated,
            })
            .await
            .unwrap();
        store
            .insert_token(TOKEN, user.id, Duration::from_secs(3600), TokenScope::Authentication)
            .await
            .unwrap();
        (AuthenticationContext::new(store, Duration::from_secs(3)), user.id)
    }

    fn header(value: &str) -> HeaderValue {
        HeaderValue::from_str(value).unwrap()
    }

    #[tokio::test]
    async fn absent_header_is_anonymous() {
        let (auth, _) = context_with_user(true).await;
        assert!(auth.resolve(None).await.unwrap().is_anonymous());
    }

    #[tokio::test]
    async fn valid_bearer_token_resolves_the_owner() {
        let (auth, id) = context_with_user(true).await;
        let principal = auth.resolve(Some(&header(&format!("Bearer {TOKEN}")))).await.unwrap();
        assert_eq!(principal, Principal::user(id, true));
    }

    #[tokio::test]
    async fn malformed_headers_are_invalid_tokens() {
        let (auth, _) = context_with_user(true).await;
        for value in [
            format!("bearer {TOKEN}"),
            format!("Token {TOKEN}"),
            format!("Bearer  {TOKEN}"),
            format!("Bearer {TOKEN} extra"),
            "Bearer".to_string(),
            "Bearer SHORT".to_string(),
        ] {
            let err = auth.resolve(Some(&header(&value))).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidAuthToken), "{value:?} gave {err:?}");
        }
    }

    #[tokio::test]
    async fn unknown_token_is_invalid_not_missing() {
        let (auth, _) = context_with_user(true).await;
        let err = auth
            .resolve(Some(&header("Bearer AAAAAAAAAAAAAAAAAAAAAAAAAA")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidAuthToken));
    }

    #[derive(Clone)]
    struct SlowStore;

    impl UserRepository for SlowStore {
        async fn insert_user(&self, _data: UserData) -> AppResult<User> {
            Err(AppError::internal("unused"))
        }
        async fn get_user(&self, _id: i64) -> AppResult<User> {
            Err(AppError::internal("unused"))
        }
        async fn get_user_by_email(&self, _email: &str) -> AppResult<User> {
            Err(AppError::internal("unused"))
        }
        async fn update_user(&self, _user: &mut User) -> AppResult<i32> {
            Err(AppError::internal("unused"))
        }
        async fn get_for_token(&self, _scope: TokenScope, _plaintext: &str) -> AppResult<User> {
            std::future::pending().await
        }
    }

    #[derive(Clone)]
    struct BrokenStore;

    impl UserRepository for BrokenStore {
        async fn insert_user(&self, _data: UserData) -> AppResult<User> {
            Err(AppError::internal("unused"))
        }
        async fn get_user(&self, _id: i64) -> AppResult<User> {
            Err(AppError::internal("unused"))
        }
        async fn get_user_by_email(&self, _email: &str) -> AppResult<User> {
            Err(AppError::internal("unused"))
        }
        async fn update_user(&self, _user: &mut User) -> AppResult<i32> {
            Err(AppError::internal("unused"))
        }
        async fn get_for_token(&self, _scope: TokenScope, _plaintext: &str) -> AppResult<User> {
            Err(AppError::internal("connection reset"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_deadline_is_internal() {
        let auth = AuthenticationContext::new(SlowStore, Duration::from_secs(3));
        let err = auth.resolve(Some(&header(&format!("Bearer {TOKEN}")))).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn store_failure_is_internal() {
        let auth = AuthenticationContext::new(BrokenStore, Duration::from_secs(3));
        let err = auth.resolve(Some(&header(&format!("Bearer {TOKEN}")))).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn principal_is_attached_once() {
        let mut extensions = Extensions::new();
        assert!(matches!(principal_of(&extensions), Err(AppError::Internal(_))));

        attach_principal(&mut extensions, Principal::anonymous()).unwrap();
        assert!(principal_of(&extensions).unwrap().is_anonymous());

        let again = attach_principal(&mut extensions, Principal::user(1, true));
        assert!(matches!(again, Err(AppError::Internal(_))));
        assert!(principal_of(&extensions).unwrap().is_anonymous());
    }
}
