use crate::{
    error::AppError,
    models::{user::is_staff_role, User},
    utils::jwt::{verify_token, TokenType},
};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Extension,
};
use sea_orm::{DatabaseConnection, EntityTrait};
use std::convert::Infallible;

/// The authenticated voter/author behind a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub role: String,
}

impl AuthUser {
    pub fn is_staff(&self) -> bool {
        is_staff_role(&self.role)
    }

    /// Fails with `Forbidden` unless the user is a moderator or admin.
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// JWT authentication middleware
///
/// Verifies the bearer access token, rejects suspended accounts and stores
/// the caller as an [`AuthUser`] request extension.
pub async fn auth_middleware(
    Extension(db): Extension<DatabaseConnection>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&db, &headers)
        .await?
        .ok_or(AppError::Unauthorized)?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Like [`auth_middleware`], but a request without a token passes through
/// anonymously. A token that is present must still be valid.
pub async fn optional_auth_middleware(
    Extension(db): Extension<DatabaseConnection>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(user) = authenticate(&db, &headers).await? {
        request.extensions_mut().insert(user);
    }

    Ok(next.run(request).await)
}

/// `None` when no bearer token was sent.
async fn authenticate(
    db: &DatabaseConnection,
    headers: &HeaderMap,
) -> Result<Option<AuthUser>, AppError> {
    let Some(token) = extract_bearer_token(headers) else {
        return Ok(None);
    };
    let user_id = verify_token(token, TokenType::Access).ok_or(AppError::Unauthorized)?;

    // Token may outlive the account.
    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if user.is_suspended {
        return Err(AppError::Forbidden);
    }

    Ok(Some(AuthUser {
        user_id: user.id,
        role: user.role,
    }))
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// `Option<AuthUser>` on routes behind [`optional_auth_middleware`].
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthUser>().cloned())
    }
}
