use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use axum_extra::routing::TypedPath;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::AppState;
use crate::auth::{CurrentUser, authorize};
use crate::db;
use crate::error::{ApiError, FieldErrors};
use crate::models::{Image, NewImage, Tag};
use crate::routes::tags::TagResponse;
use crate::storage::FileStore;

pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpeg", "jpg", "webp", "gif", "bmp", "tiff"];

/// 51200 KB upload bound per file.
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

#[derive(Serialize)]
pub struct ImageResponse {
  pub id: i32,
  pub title: String,
  pub description: Option<String>,
  pub filename: String,
  pub size: i64,
  pub url: String,
  pub created_at: NaiveDateTime,
  pub tags: Vec<TagResponse>,
}

impl ImageResponse {
  pub fn from_parts(image: Image, tags: Vec<Tag>, store: &FileStore) -> Self {
    ImageResponse {
      id: image.id,
      title: image.title,
      description: image.description,
      url: store.url(&image.filename),
      filename: image.filename,
      size: image.size,
      created_at: image.created_at,
      tags: tags.iter().map(TagResponse::from).collect(),
    }
  }
}

pub(crate) fn group_tags(pairs: Vec<(i32, Tag)>) -> HashMap<i32, Vec<Tag>> {
  let mut grouped: HashMap<i32, Vec<Tag>> = HashMap::new();

  for (id, tag) in pairs {
    grouped.entry(id).or_default().push(tag);
  }

  grouped
}

#[derive(TypedPath)]
#[typed_path("/images")]
pub struct ImagesRoute;

#[derive(TypedPath, Deserialize)]
#[typed_path("/images/{image_id}")]
pub struct ImageRoute {
  pub image_id: i32,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/images/{image_id}/edit")]
pub struct ImageEditRoute {
  pub image_id: i32,
}

/// Lists the user's images with their tags, newest first.
pub async fn image_list(
  _: ImagesRoute,
  State(AppState { pool, store }): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
) -> Result<Json<Vec<ImageResponse>>, ApiError> {
  let images = db::images::get_image_list(pool.get().await.unwrap(), user.id).await?;

  let ids = images.iter().map(|image| image.id).collect::<Vec<i32>>();
  let mut tags_by_image = group_tags(db::images::get_tags_for_images(pool.get().await.unwrap(), ids).await?);

  let result = images.into_iter()
    .map(|image| {
      let tags = tags_by_image.remove(&image.id).unwrap_or_default();
      ImageResponse::from_parts(image, tags, &store)
    })
    .collect::<Vec<ImageResponse>>();

  Ok(Json(result))
}

/// One file taken out of a multipart upload.
pub(crate) struct UploadedFile {
  pub filename: String,
  pub bytes: Vec<u8>,
}

#[derive(Default)]
pub(crate) struct UploadForm {
  pub title: Option<String>,
  pub description: Option<String>,
  pub tags: Vec<i32>,
  pub files: Vec<UploadedFile>,
}

/// Collects the fields the upload forms send. Field names arrive both
/// bare and with the `[]` suffix the SPA serializer appends.
pub(crate) async fn read_upload_form(multipart: &mut Multipart) -> Result<UploadForm, ApiError> {
  let mut form = UploadForm::default();

  while let Some(field) = multipart.next_field().await? {
    let name = field.name().unwrap_or_default().trim_end_matches("[]").to_string();

    match name.as_str() {
      "images" => {
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?.to_vec();
        form.files.push(UploadedFile { filename, bytes });
      }
      "title" => form.title = non_empty(field.text().await?),
      "description" => form.description = non_empty(field.text().await?),
      "tags" => {
        let text = field.text().await?;
        if let Some(value) = non_empty(text) {
          let id = value.parse::<i32>()
            .map_err(|_| ApiError::validation("tags", "Tags must be a list of ids."))?;
          form.tags.push(id);
        }
      }
      _ => {}
    }
  }

  Ok(form)
}

fn non_empty(text: String) -> Option<String> {
  let trimmed = text.trim().to_string();
  if trimmed.is_empty() { None } else { Some(trimmed) }
}

/// Validates and stores a single uploaded file, then records its row.
/// The title falls back to the client filename without its extension.
pub(crate) async fn store_uploaded_file(
  state: &AppState,
  user: &CurrentUser,
  file: UploadedFile,
  title_override: Option<&str>,
  description: Option<&str>,
) -> Result<Image, ApiError> {
  let client_name = file.filename.trim().to_string();

  if client_name.is_empty() {
    return Err(ApiError::validation("images", "Every uploaded file needs a filename."));
  }

  if file.bytes.len() > MAX_IMAGE_BYTES {
    return Err(ApiError::validation("images", format!("{client_name} exceeds the 50 MB upload limit.")));
  }

  let Some(extension) = extension_of(&client_name) else {
    return Err(ApiError::validation("images", format!("{client_name} has no usable image extension.")));
  };

  if !ALLOWED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
    return Err(ApiError::validation(
      "images",
      format!("{client_name} must be an image file ({}).", ALLOWED_IMAGE_EXTENSIONS.join(", ")),
    ));
  }

  let is_image = infer::get(&file.bytes)
    .map(|kind| kind.matcher_type() == infer::MatcherType::Image)
    .unwrap_or(false);

  if !is_image {
    return Err(ApiError::validation("images", format!("{client_name} is not a valid image.")));
  }

  let key = format!("{}.{extension}", Uuid::new_v4());
  state.store.write(&key, &file.bytes).await?;

  let title = match title_override {
    Some(title) => title.to_string(),
    None => title_from(&client_name),
  };

  let new_image = NewImage::new(user.id, title, description.map(str::to_string), key, file.bytes.len() as i64);
  let image = db::images::insert_image(state.pool.get().await.unwrap(), new_image).await?;

  Ok(image)
}

/// Uploads one or more image files. Files are processed independently and
/// in order; a failure aborts the request but files already stored in the
/// same batch stay stored.
pub async fn store_images(
  _: ImagesRoute,
  State(state): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
  mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<ImageResponse>>), ApiError> {
  let form = read_upload_form(&mut multipart).await?;

  if form.files.is_empty() {
    return Err(ApiError::validation("images", "At least one image file is required."));
  }

  let mut created = vec![];

  for file in form.files {
    let image = store_uploaded_file(&state, &user, file, form.title.as_deref(), form.description.as_deref()).await?;
    created.push(ImageResponse::from_parts(image, vec![], &state.store));
  }

  info!("User {} uploaded {} image(s)", user.username, created.len());

  Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Serialize)]
pub struct ImageEditData {
  pub image: ImageResponse,
  pub tags: Vec<TagResponse>,
}

/// Data for the edit form: the image with its tags, plus every tag the
/// user could attach.
pub async fn edit_image_data(
  ImageEditRoute { image_id }: ImageEditRoute,
  State(AppState { pool, store }): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
) -> Result<Json<ImageEditData>, ApiError> {
  let Some(image) = db::images::select_image(pool.get().await.unwrap(), image_id).await? else {
    return Err(ApiError::NotFound);
  };

  authorize(&user, &image, "You are not allowed to edit this image")?;

  let tags = db::images::get_image_tags(pool.get().await.unwrap(), image_id).await?;
  let all_tags = db::tags::get_tag_list(pool.get().await.unwrap(), user.id).await?;

  Ok(Json(ImageEditData {
    image: ImageResponse::from_parts(image, tags, &store),
    tags: all_tags.iter().map(TagResponse::from).collect(),
  }))
}

#[derive(Deserialize)]
pub struct ImageUpdateData {
  pub title: String,
  pub filename: String,
  pub description: Option<String>,
  #[serde(default)]
  pub tags: Option<Vec<i32>>,
}

/// Updates an image's metadata. When the filename changed, the stored
/// object is renamed first and the rename is reverted if the database
/// write afterwards fails; storage rename and row update share no
/// transaction, so the revert is a best-effort compensating action.
pub async fn update_image(
  ImageRoute { image_id }: ImageRoute,
  State(AppState { pool, store }): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
  Json(data): Json<ImageUpdateData>,
) -> Result<Json<ImageResponse>, ApiError> {
  let Some(image) = db::images::select_image(pool.get().await.unwrap(), image_id).await? else {
    return Err(ApiError::NotFound);
  };

  authorize(&user, &image, "You are not allowed to edit this image")?;

  let mut errors = FieldErrors::default();

  let title = data.title.trim().to_string();
  if title.is_empty() {
    errors.push("title", "A title is required.");
  } else if title.len() > 255 {
    errors.push("title", "The title may not be longer than 255 characters.");
  }

  let filename = data.filename.trim().to_string();
  validate_filename(&filename, &mut errors);

  if filename != image.filename && store.exists(&filename).await {
    errors.push("filename", format!("A file named '{filename}' already exists in storage."));
  }

  if !store.exists(&image.filename).await {
    errors.push("filename", format!("The original file '{}' is missing from storage.", image.filename));
  }

  if let Some(description) = data.description.as_deref() {
    if description.len() > 255 {
      errors.push("description", "The description may not be longer than 255 characters.");
    }
  }

  let mut target_tags = data.tags.clone().unwrap_or_default();
  target_tags.sort_unstable();
  target_tags.dedup();

  let owned = db::tags::select_owned_ids(pool.get().await.unwrap(), user.id, target_tags.clone()).await?;
  if owned.len() != target_tags.len() {
    errors.push("tags", "One or more tags are invalid.");
  }

  errors.into_result()?;

  // The only external side effect before the row write.
  let rename = store.begin_rename(&image.filename, &filename).await.map_err(|e| {
    error!("Renaming {:?} to {:?} failed: {e}", image.filename, filename);
    ApiError::UpdateFailed
  })?;

  let persisted = match db::images::update_image(
    pool.get().await.unwrap(),
    image_id,
    title,
    filename.clone(),
    data.description.clone(),
  ).await {
    Ok(_) => db::images::sync_tags(pool.get().await.unwrap(), image_id, target_tags).await,
    Err(e) => Err(e),
  };

  if let Err(e) = persisted {
    error!("Persisting image {image_id} failed, rolling back the rename: {e}");

    rename.revert().await;

    // re-assert the original filename in case the row was partially written
    if let Err(e) = db::images::update_filename(pool.get().await.unwrap(), image_id, image.filename.clone()).await {
      error!("Could not re-assert the filename of image {image_id}: {e}");
    }

    return Err(ApiError::UpdateFailed);
  }

  rename.commit();

  let Some(updated) = db::images::select_image(pool.get().await.unwrap(), image_id).await? else {
    return Err(ApiError::NotFound);
  };
  let tags = db::images::get_image_tags(pool.get().await.unwrap(), image_id).await?;

  Ok(Json(ImageResponse::from_parts(updated, tags, &store)))
}

/// Deletes an image: the stored object goes first (an already-missing
/// object is fine), then the row and its association rows.
pub async fn delete_image(
  ImageRoute { image_id }: ImageRoute,
  State(AppState { pool, store }): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
) -> Result<StatusCode, ApiError> {
  let Some(image) = db::images::select_image(pool.get().await.unwrap(), image_id).await? else {
    return Err(ApiError::NotFound);
  };

  authorize(&user, &image, "You are not allowed to delete this image")?;

  store.delete(&image.filename).await?;
  db::images::delete_image(pool.get().await.unwrap(), image_id).await?;

  Ok(StatusCode::NO_CONTENT)
}

fn validate_filename(filename: &str, errors: &mut FieldErrors) {
  if filename.is_empty() {
    errors.push("filename", "A filename is required.");
    return;
  }

  if filename.len() > 255 {
    errors.push("filename", "The filename may not be longer than 255 characters.");
  }

  if filename.contains('/') || filename.contains('\\') || filename == ".." {
    errors.push("filename", "The filename may not contain path separators.");
    return;
  }

  match extension_of(filename) {
    Some(extension) if ALLOWED_IMAGE_EXTENSIONS.contains(&extension.as_str()) => {}
    _ => {
      errors.push(
        "filename",
        format!("The filename must use one of the image extensions ({}).", ALLOWED_IMAGE_EXTENSIONS.join(", ")),
      );
    }
  }
}

fn extension_of(filename: &str) -> Option<String> {
  Path::new(filename)
    .extension()
    .and_then(|extension| extension.to_str())
    .map(|extension| extension.to_lowercase())
}

fn title_from(filename: &str) -> String {
  Path::new(filename)
    .file_stem()
    .and_then(|stem| stem.to_str())
    .unwrap_or(filename)
    .to_string()
}
