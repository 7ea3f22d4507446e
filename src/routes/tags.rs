use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use axum_extra::routing::TypedPath;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::AppState;
use crate::auth::{CurrentUser, authorize};
use crate::db;
use crate::error::{ApiError, FieldErrors};
use crate::models::{NewTag, Tag};

#[derive(Serialize)]
pub struct TagResponse {
  pub id: i32,
  pub name: String,
  pub created_at: NaiveDateTime,
}

impl From<Tag> for TagResponse {
  fn from(tag: Tag) -> Self {
    TagResponse { id: tag.id, name: tag.name, created_at: tag.created_at }
  }
}

impl From<&Tag> for TagResponse {
  fn from(tag: &Tag) -> Self {
    TagResponse { id: tag.id, name: tag.name.clone(), created_at: tag.created_at }
  }
}

#[derive(Deserialize)]
pub struct TagInsertData {
  pub name: String,
}

#[derive(TypedPath)]
#[typed_path("/tags")]
pub struct TagsRoute;

#[derive(TypedPath, Deserialize)]
#[typed_path("/tags/{tag_id}")]
pub struct TagRoute {
  pub tag_id: i32,
}

/// Lists the user's tags, newest first.
pub async fn tag_list(
  _: TagsRoute,
  State(AppState { pool, .. }): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
) -> Result<Json<Vec<TagResponse>>, ApiError> {
  let tags = db::tags::get_tag_list(pool.get().await.unwrap(), user.id).await?;

  let result = tags.iter()
    .map(TagResponse::from)
    .collect::<Vec<TagResponse>>();

  Ok(Json(result))
}

/// Creates a new tag. Names are unique within the user's own tags only.
pub async fn store_tag(
  _: TagsRoute,
  State(AppState { pool, .. }): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
  Json(data): Json<TagInsertData>,
) -> Result<(StatusCode, Json<TagResponse>), ApiError> {
  let name = data.name.trim().to_string();
  validate_name(&pool, user.id, &name, None).await?;

  let tag = db::tags::insert_tag(pool.get().await.unwrap(), NewTag::new(user.id, name)).await?;
  info!("User {} created tag {}", user.username, tag.id);

  Ok((StatusCode::CREATED, Json(TagResponse::from(tag))))
}

/// Renames a tag.
pub async fn update_tag(
  TagRoute { tag_id }: TagRoute,
  State(AppState { pool, .. }): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
  Json(data): Json<TagInsertData>,
) -> Result<Json<TagResponse>, ApiError> {
  let Some(tag) = db::tags::select_tag(pool.get().await.unwrap(), tag_id).await? else {
    return Err(ApiError::NotFound);
  };

  authorize(&user, &tag, "You are not allowed to edit this tag")?;

  let name = data.name.trim().to_string();
  validate_name(&pool, user.id, &name, Some(tag_id)).await?;

  db::tags::update_tag(pool.get().await.unwrap(), tag_id, name.clone()).await?;

  Ok(Json(TagResponse { id: tag.id, name, created_at: tag.created_at }))
}

/// Deletes a tag. Only the association rows go with it.
pub async fn delete_tag(
  TagRoute { tag_id }: TagRoute,
  State(AppState { pool, .. }): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
) -> Result<StatusCode, ApiError> {
  let Some(tag) = db::tags::select_tag(pool.get().await.unwrap(), tag_id).await? else {
    return Err(ApiError::NotFound);
  };

  authorize(&user, &tag, "You are not allowed to delete this tag")?;

  db::tags::delete_tag(pool.get().await.unwrap(), tag_id).await?;

  Ok(StatusCode::NO_CONTENT)
}

async fn validate_name(
  pool: &crate::ConnectionPool,
  user_id: i32,
  name: &str,
  exclude_id: Option<i32>,
) -> Result<(), ApiError> {
  let mut errors = FieldErrors::default();

  if name.is_empty() {
    errors.push("name", "A tag name is required.");
  } else if name.len() > 255 {
    errors.push("name", "The tag name may not be longer than 255 characters.");
  } else if db::tags::name_taken(pool.get().await.unwrap(), user_id, name.to_string(), exclude_id).await? {
    errors.push("name", "You already have a tag with this name.");
  }

  errors.into_result()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::{seed_user, test_state};

  #[tokio::test]
  async fn duplicate_name_is_rejected_per_owner() {
    let state = test_state().await;
    let (_, ana) = seed_user(&state, "ana").await;
    let (_, bruno) = seed_user(&state, "bruno").await;
    let ana = Arc::new(ana);
    let bruno = Arc::new(bruno);

    store_tag(TagsRoute, State(state.clone()), Extension(ana.clone()), Json(TagInsertData { name: "vacation".into() }))
      .await
      .unwrap();

    // same owner, same name: per-field validation error
    let result = store_tag(TagsRoute, State(state.clone()), Extension(ana), Json(TagInsertData { name: "vacation".into() })).await;
    assert!(matches!(result, Err(ApiError::Validation(_))));

    // a different user may own the same name
    store_tag(TagsRoute, State(state.clone()), Extension(bruno), Json(TagInsertData { name: "vacation".into() }))
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn cross_user_edit_is_denied() {
    let state = test_state().await;
    let (_, ana) = seed_user(&state, "ana").await;
    let (_, bruno) = seed_user(&state, "bruno").await;

    let (_, Json(tag)) = store_tag(TagsRoute, State(state.clone()), Extension(Arc::new(ana)), Json(TagInsertData { name: "trips".into() }))
      .await
      .unwrap();

    let result = update_tag(
      TagRoute { tag_id: tag.id },
      State(state.clone()),
      Extension(Arc::new(bruno)),
      Json(TagInsertData { name: "stolen".into() }),
    ).await;
    assert!(matches!(result, Err(ApiError::Denied(_))));

    // the row is untouched
    let unchanged = crate::db::tags::select_tag(state.pool.get().await.unwrap(), tag.id).await.unwrap().unwrap();
    assert_eq!(unchanged.name, "trips");
  }

  #[tokio::test]
  async fn delete_twice_is_not_found() {
    let state = test_state().await;
    let (_, ana) = seed_user(&state, "ana").await;
    let ana = Arc::new(ana);

    let (_, Json(tag)) = store_tag(TagsRoute, State(state.clone()), Extension(ana.clone()), Json(TagInsertData { name: "old".into() }))
      .await
      .unwrap();

    let first = delete_tag(TagRoute { tag_id: tag.id }, State(state.clone()), Extension(ana.clone())).await;
    assert!(matches!(first, Ok(StatusCode::NO_CONTENT)));

    let second = delete_tag(TagRoute { tag_id: tag.id }, State(state.clone()), Extension(ana)).await;
    assert!(matches!(second, Err(ApiError::NotFound)));
  }
}
