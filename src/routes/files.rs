use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::routing::TypedPath;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::AppState;

#[derive(TypedPath, Deserialize)]
#[typed_path("/files/{filename}")]
pub struct FileRoute {
  pub filename: String,
}

/// Streams a stored object. Objects live on the public disk, so this is
/// the one endpoint without an identity requirement.
pub async fn serve_file(
  FileRoute { filename }: FileRoute,
  State(AppState { store, .. }): State<AppState>,
) -> Result<Body, StatusCode> {
  let Ok(file) = store.open_object(&filename).await else {
    return Err(StatusCode::NOT_FOUND);
  };

  let stream = ReaderStream::new(file);
  Ok(Body::from_stream(stream))
}
