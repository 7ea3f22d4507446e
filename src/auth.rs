use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use tracing::error;

use crate::AppState;
use crate::db;
use crate::error::ApiError;
use crate::models::{Album, Image, Tag, User};

/// The acting user for a request, resolved by the session collaborator.
/// Everything beyond the identity itself (registration, login, password
/// handling) lives outside this service.
#[derive(Clone, Debug)]
pub struct CurrentUser {
  pub id: i32,
  pub username: String,
}

impl From<User> for CurrentUser {
  fn from(user: User) -> Self {
    CurrentUser { id: user.id, username: user.username }
  }
}

/// Resolves `Authorization: Bearer <token>` against `users.api_token` and
/// makes the acting user available to handlers as an extension.
pub async fn require_auth(
  State(state): State<AppState>,
  bearer: Option<TypedHeader<Authorization<Bearer>>>,
  mut request: Request,
  next: Next,
) -> Result<Response, StatusCode> {
  let Some(TypedHeader(Authorization(bearer))) = bearer else {
    return Err(StatusCode::UNAUTHORIZED);
  };

  let user = db::users::get_user_by_api_token(state.pool.get().await.unwrap(), bearer.token().to_string())
    .await
    .map_err(|e| {
      error!("DB error resolving api token: {e}");
      StatusCode::INTERNAL_SERVER_ERROR
    })?;

  let Some(user) = user else {
    return Err(StatusCode::UNAUTHORIZED);
  };

  request.extensions_mut().insert(Arc::new(CurrentUser::from(user)));
  Ok(next.run(request).await)
}

/// Owned records carry the id of the only user allowed to touch them.
pub trait Owned {
  fn owner_id(&self) -> i32;
}

impl Owned for Image {
  fn owner_id(&self) -> i32 { self.owner_id }
}

impl Owned for Album {
  fn owner_id(&self) -> i32 { self.owner_id }
}

impl Owned for Tag {
  fn owner_id(&self) -> i32 { self.owner_id }
}

/// Ownership check behind every mutating operation. A denial carries a
/// user-visible message and the operation must not have had side effects.
/// Restoring deleted records is never allowed, so no restore surface
/// exists anywhere in the API.
pub fn authorize(user: &CurrentUser, entity: &impl Owned, deny_message: &'static str) -> Result<(), ApiError> {
  if user.id == entity.owner_id() {
    Ok(())
  } else {
    Err(ApiError::Denied(deny_message))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Utc;

  fn tag_owned_by(owner_id: i32) -> Tag {
    Tag { id: 1, owner_id, name: "vacation".to_string(), created_at: Utc::now().naive_utc() }
  }

  #[test]
  fn owner_is_allowed() {
    let user = CurrentUser { id: 7, username: "ana".to_string() };
    assert!(authorize(&user, &tag_owned_by(7), "denied").is_ok());
  }

  #[test]
  fn other_user_is_denied() {
    let user = CurrentUser { id: 8, username: "bruno".to_string() };
    let result = authorize(&user, &tag_owned_by(7), "You are not allowed to edit this tag");
    assert!(matches!(result, Err(ApiError::Denied(_))));
  }
}
