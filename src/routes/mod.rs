pub mod albums;
pub mod dashboard;
pub mod files;
pub mod images;
pub mod tags;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum_extra::routing::RouterExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::auth;

/// Uploads may carry several files, so the request bound sits above the
/// 50 MB per-file limit.
const MAX_REQUEST_BYTES: usize = 256 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
  let protected = Router::new()
    .typed_get(dashboard::dashboard)
    .typed_get(images::image_list)
    .typed_post(images::store_images)
    .typed_get(images::edit_image_data)
    .typed_patch(images::update_image)
    .typed_delete(images::delete_image)
    .typed_get(tags::tag_list)
    .typed_post(tags::store_tag)
    .typed_patch(tags::update_tag)
    .typed_delete(tags::delete_tag)
    .typed_get(albums::album_list)
    .typed_get(albums::create_album_data)
    .typed_post(albums::store_album)
    .typed_get(albums::edit_album_data)
    .typed_get(albums::add_images_data)
    .typed_post(albums::upload_into_album)
    .typed_patch(albums::update_album)
    .typed_delete(albums::delete_album)
    .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

  Router::new()
    .merge(protected)
    .typed_get(files::serve_file)
    .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
    .layer(CorsLayer::permissive())
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
