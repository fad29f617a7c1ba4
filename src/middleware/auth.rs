use crate::{
    error::{AppError, AppResult},
    models::{User, UserModel},
    utils::jwt::decode_jwt,
};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Extension,
};
use sea_orm::{DatabaseConnection, EntityTrait};

/// Identity of the caller, resolved from a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i32,
}

/// JWT authentication middleware
///
/// Rejects the request unless it carries a valid bearer token for an
/// existing user, then stores the [`AuthUser`] in the request extensions.
pub async fn auth_middleware(
    Extension(db): Extension<DatabaseConnection>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user = authenticate(&db, &headers).await?;
    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Like [`auth_middleware`] but never rejects: anonymous callers, and callers
/// whose token does not check out, continue without an [`AuthUser`].
pub async fn optional_auth_middleware(
    Extension(db): Extension<DatabaseConnection>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    if extract_bearer_token(&headers).is_some() {
        match authenticate(&db, &headers).await {
            Ok(auth_user) => {
                request.extensions_mut().insert(auth_user);
            }
            Err(e) => tracing::debug!("Ignoring bearer token on public route: {}", e),
        }
    }
    next.run(request).await
}

async fn authenticate(db: &DatabaseConnection, headers: &HeaderMap) -> AppResult<AuthUser> {
    let token = extract_bearer_token(headers).ok_or(AppError::Unauthorized)?;
    let claims = decode_jwt(&token).map_err(|_| AppError::Unauthorized)?;
    let user_id = claims.user_id().ok_or(AppError::Unauthorized)?;

    // The token may outlive the account.
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(AuthUser { user_id })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;

    let token = auth_header.strip_prefix("Bearer ")?;
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Load the caller's user row.
pub async fn current_user(db: &DatabaseConnection, auth_user: &AuthUser) -> AppResult<UserModel> {
    User::find_by_id(auth_user.user_id)
        .one(db)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Verify the current user has admin role
pub async fn require_admin(db: &DatabaseConnection, auth_user: &AuthUser) -> AppResult<UserModel> {
    let user = current_user(db, auth_user).await?;
    if !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(user)
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
            .copied()
            .ok_or(AppError::Unauthorized)
    }
}

/// Lets public handlers take `Option<AuthUser>`.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthUser>().copied())
    }
}
