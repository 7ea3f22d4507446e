use std::sync::Arc;

use axum::extract::State;
use axum::{Extension, Json};
use axum_extra::routing::TypedPath;
use serde::Serialize;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::db;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct DashboardResponse {
  pub username: String,
  pub images_count: i64,
  pub albums_count: i64,
  pub images_size: i64,
}

#[derive(TypedPath)]
#[typed_path("/dashboard")]
pub struct DashboardRoute;

/// Aggregate counts for the acting user: how many images and albums they
/// own and how many bytes their images occupy.
pub async fn dashboard(
  _: DashboardRoute,
  State(AppState { pool, .. }): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
) -> Result<Json<DashboardResponse>, ApiError> {
  let stats = db::general::user_stats(pool.get().await.unwrap(), user.id).await?;

  Ok(Json(DashboardResponse {
    username: user.username.clone(),
    images_count: stats.images_count,
    albums_count: stats.albums_count,
    images_size: stats.images_size,
  }))
}
