use std::sync::Arc;

use axum::extract::{Multipart, State};
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
use crate::models::{Album, Image, NewAlbum, Tag};
use crate::routes::images::{ImageResponse, group_tags, read_upload_form, store_uploaded_file};
use crate::routes::tags::TagResponse;
use crate::storage::FileStore;

#[derive(Serialize)]
pub struct AlbumResponse {
  pub id: i32,
  pub title: String,
  pub description: Option<String>,
  // plain filename pointer, not checked against the album's image set
  pub cover_image: Option<String>,
  pub created_at: NaiveDateTime,
  pub images_count: usize,
  pub tags: Vec<TagResponse>,
  pub images: Vec<ImageResponse>,
}

impl AlbumResponse {
  fn from_parts(album: Album, tags: Vec<Tag>, images: Vec<Image>, store: &FileStore) -> Self {
    AlbumResponse {
      id: album.id,
      title: album.title,
      description: album.description,
      cover_image: album.cover_image,
      created_at: album.created_at,
      images_count: images.len(),
      tags: tags.iter().map(TagResponse::from).collect(),
      images: images.into_iter().map(|image| ImageResponse::from_parts(image, vec![], store)).collect(),
    }
  }
}

#[derive(TypedPath)]
#[typed_path("/albums")]
pub struct AlbumsRoute;

#[derive(TypedPath)]
#[typed_path("/albums/create")]
pub struct AlbumCreateRoute;

#[derive(TypedPath, Deserialize)]
#[typed_path("/albums/{album_id}")]
pub struct AlbumRoute {
  pub album_id: i32,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/albums/{album_id}/edit")]
pub struct AlbumEditRoute {
  pub album_id: i32,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/albums/{album_id}/add")]
pub struct AlbumAddRoute {
  pub album_id: i32,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/albums/{album_id}/images")]
pub struct AlbumImagesRoute {
  pub album_id: i32,
}

/// Lists the user's albums with their tags, images and image counts,
/// newest first.
pub async fn album_list(
  _: AlbumsRoute,
  State(AppState { pool, store }): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
) -> Result<Json<Vec<AlbumResponse>>, ApiError> {
  let albums = db::albums::get_album_list(pool.get().await.unwrap(), user.id).await?;

  let ids = albums.iter().map(|album| album.id).collect::<Vec<i32>>();
  let mut tags_by_album = group_tags(db::albums::get_tags_for_albums(pool.get().await.unwrap(), ids.clone()).await?);

  let mut images_by_album: std::collections::HashMap<i32, Vec<Image>> = std::collections::HashMap::new();
  for (album_id, image) in db::albums::get_images_for_albums(pool.get().await.unwrap(), ids).await? {
    images_by_album.entry(album_id).or_default().push(image);
  }

  let result = albums.into_iter()
    .map(|album| {
      let tags = tags_by_album.remove(&album.id).unwrap_or_default();
      let images = images_by_album.remove(&album.id).unwrap_or_default();
      AlbumResponse::from_parts(album, tags, images, &store)
    })
    .collect::<Vec<AlbumResponse>>();

  Ok(Json(result))
}

#[derive(Serialize)]
pub struct AlbumCreateData {
  pub images: Vec<ImageResponse>,
  pub tags: Vec<TagResponse>,
}

/// Data for the create form: everything the user could put into a new
/// album.
pub async fn create_album_data(
  _: AlbumCreateRoute,
  State(AppState { pool, store }): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
) -> Result<Json<AlbumCreateData>, ApiError> {
  let images = db::images::get_image_list(pool.get().await.unwrap(), user.id).await?;

  let ids = images.iter().map(|image| image.id).collect::<Vec<i32>>();
  let mut tags_by_image = group_tags(db::images::get_tags_for_images(pool.get().await.unwrap(), ids).await?);

  let tags = db::tags::get_tag_list(pool.get().await.unwrap(), user.id).await?;

  Ok(Json(AlbumCreateData {
    images: images.into_iter()
      .map(|image| {
        let tags = tags_by_image.remove(&image.id).unwrap_or_default();
        ImageResponse::from_parts(image, tags, &store)
      })
      .collect(),
    tags: tags.iter().map(TagResponse::from).collect(),
  }))
}

/// Creates an album from the multipart create form: image files are
/// uploaded first, then the album row is created and its tag set and
/// image set are synced to the given tags and the just-created images.
pub async fn store_album(
  _: AlbumsRoute,
  State(state): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
  mut multipart: Multipart,
) -> Result<(StatusCode, Json<AlbumResponse>), ApiError> {
  let form = read_upload_form(&mut multipart).await?;

  let mut errors = FieldErrors::default();
  let title = validate_title(form.title.as_deref(), &mut errors);
  validate_description(form.description.as_deref(), &mut errors);

  let target_tags = normalized(form.tags.clone());
  let owned = db::tags::select_owned_ids(state.pool.get().await.unwrap(), user.id, target_tags.clone()).await?;
  if owned.len() != target_tags.len() {
    errors.push("tags", "One or more tags are invalid.");
  }

  errors.into_result()?;

  let mut image_ids = vec![];
  for file in form.files {
    let image = store_uploaded_file(&state, &user, file, None, None).await?;
    image_ids.push(image.id);
  }

  let album = db::albums::insert_album(state.pool.get().await.unwrap(), NewAlbum::new(user.id, title, form.description.clone())).await?;

  db::albums::sync_tags(state.pool.get().await.unwrap(), album.id, target_tags).await?;
  db::albums::sync_images(state.pool.get().await.unwrap(), album.id, image_ids).await?;

  info!("User {} created album {}", user.username, album.id);

  let response = load_album_response(&state, album.id).await?;
  Ok((StatusCode::CREATED, Json(response)))
}

#[derive(Serialize)]
pub struct AlbumEditData {
  pub album: AlbumResponse,
  pub tags: Vec<TagResponse>,
}

/// Data for the edit form: the album with its tags and images, plus every
/// tag the user could attach. Owner-scoped, so another user's album id
/// reads as missing.
pub async fn edit_album_data(
  AlbumEditRoute { album_id }: AlbumEditRoute,
  State(AppState { pool, store }): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
) -> Result<Json<AlbumEditData>, ApiError> {
  let Some(album) = db::albums::select_album_for(pool.get().await.unwrap(), user.id, album_id).await? else {
    return Err(ApiError::NotFound);
  };

  let tags = db::albums::get_album_tags(pool.get().await.unwrap(), album_id).await?;
  let images = db::albums::get_album_images(pool.get().await.unwrap(), album_id).await?;
  let all_tags = db::tags::get_tag_list(pool.get().await.unwrap(), user.id).await?;

  Ok(Json(AlbumEditData {
    album: AlbumResponse::from_parts(album, tags, images, &store),
    tags: all_tags.iter().map(TagResponse::from).collect(),
  }))
}

/// Data for the upload-into-album form.
pub async fn add_images_data(
  AlbumAddRoute { album_id }: AlbumAddRoute,
  State(AppState { pool, store }): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
) -> Result<Json<AlbumResponse>, ApiError> {
  let Some(album) = db::albums::select_album_for(pool.get().await.unwrap(), user.id, album_id).await? else {
    return Err(ApiError::NotFound);
  };

  let tags = db::albums::get_album_tags(pool.get().await.unwrap(), album_id).await?;
  let images = db::albums::get_album_images(pool.get().await.unwrap(), album_id).await?;

  Ok(Json(AlbumResponse::from_parts(album, tags, images, &store)))
}

/// Uploads new files into an existing album. The album's image set is
/// synced to exactly the just-created images, mirroring how the SPA form
/// sends the full replacement set.
pub async fn upload_into_album(
  AlbumImagesRoute { album_id }: AlbumImagesRoute,
  State(state): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
  mut multipart: Multipart,
) -> Result<Json<AlbumResponse>, ApiError> {
  let Some(album) = db::albums::select_album(state.pool.get().await.unwrap(), album_id).await? else {
    return Err(ApiError::NotFound);
  };

  authorize(&user, &album, "You are not allowed to edit this album")?;

  let form = read_upload_form(&mut multipart).await?;

  if form.files.is_empty() {
    return Err(ApiError::validation("images", "At least one image file is required."));
  }

  let mut image_ids = vec![];
  for file in form.files {
    let image = store_uploaded_file(&state, &user, file, None, None).await?;
    image_ids.push(image.id);
  }

  db::albums::sync_images(state.pool.get().await.unwrap(), album_id, image_ids).await?;

  Ok(Json(load_album_response(&state, album_id).await?))
}

#[derive(Deserialize)]
pub struct AlbumUpdateData {
  pub title: String,
  pub description: Option<String>,
  pub cover_image: Option<String>,
  #[serde(default)]
  pub images: Option<Vec<i32>>,
  #[serde(default)]
  pub tags: Option<Vec<i32>>,
}

/// Updates an album and syncs both association sets to exactly the given
/// id lists.
pub async fn update_album(
  AlbumRoute { album_id }: AlbumRoute,
  State(state): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
  Json(data): Json<AlbumUpdateData>,
) -> Result<Json<AlbumResponse>, ApiError> {
  let Some(album) = db::albums::select_album(state.pool.get().await.unwrap(), album_id).await? else {
    return Err(ApiError::NotFound);
  };

  authorize(&user, &album, "You are not allowed to edit this album")?;

  let mut errors = FieldErrors::default();
  let title = validate_title(Some(data.title.as_str()), &mut errors);
  validate_description(data.description.as_deref(), &mut errors);

  if let Some(cover_image) = data.cover_image.as_deref() {
    if cover_image.len() > 255 {
      errors.push("cover_image", "The cover image may not be longer than 255 characters.");
    }
  }

  let target_tags = normalized(data.tags.clone().unwrap_or_default());
  let owned_tags = db::tags::select_owned_ids(state.pool.get().await.unwrap(), user.id, target_tags.clone()).await?;
  if owned_tags.len() != target_tags.len() {
    errors.push("tags", "One or more tags are invalid.");
  }

  let target_images = normalized(data.images.clone().unwrap_or_default());
  let owned_images = db::images::select_owned_ids(state.pool.get().await.unwrap(), user.id, target_images.clone()).await?;
  if owned_images.len() != target_images.len() {
    errors.push("images", "One or more images are invalid.");
  }

  errors.into_result()?;

  db::albums::update_album(
    state.pool.get().await.unwrap(),
    album_id,
    title,
    data.description.clone(),
    data.cover_image.clone(),
  ).await?;

  db::albums::sync_tags(state.pool.get().await.unwrap(), album_id, target_tags).await?;
  db::albums::sync_images(state.pool.get().await.unwrap(), album_id, target_images).await?;

  Ok(Json(load_album_response(&state, album_id).await?))
}

/// Deletes an album. Its association rows go with it; the images and tags
/// it referenced stay.
pub async fn delete_album(
  AlbumRoute { album_id }: AlbumRoute,
  State(AppState { pool, .. }): State<AppState>,
  Extension(user): Extension<Arc<CurrentUser>>,
) -> Result<StatusCode, ApiError> {
  let Some(album) = db::albums::select_album(pool.get().await.unwrap(), album_id).await? else {
    return Err(ApiError::NotFound);
  };

  authorize(&user, &album, "You are not allowed to delete this album")?;

  db::albums::delete_album(pool.get().await.unwrap(), album_id).await?;

  Ok(StatusCode::NO_CONTENT)
}

async fn load_album_response(state: &AppState, album_id: i32) -> Result<AlbumResponse, ApiError> {
  let Some(album) = db::albums::select_album(state.pool.get().await.unwrap(), album_id).await? else {
    return Err(ApiError::NotFound);
  };

  let tags = db::albums::get_album_tags(state.pool.get().await.unwrap(), album_id).await?;
  let images = db::albums::get_album_images(state.pool.get().await.unwrap(), album_id).await?;

  Ok(AlbumResponse::from_parts(album, tags, images, &state.store))
}

fn validate_title(title: Option<&str>, errors: &mut FieldErrors) -> String {
  let title = title.unwrap_or_default().trim().to_string();

  if title.is_empty() {
    errors.push("title", "A title is required.");
  } else if title.len() > 255 {
    errors.push("title", "The title may not be longer than 255 characters.");
  }

  title
}

fn validate_description(description: Option<&str>, errors: &mut FieldErrors) {
  if let Some(description) = description {
    if description.len() > 255 {
      errors.push("description", "The description may not be longer than 255 characters.");
    }
  }
}

fn normalized(mut ids: Vec<i32>) -> Vec<i32> {
  ids.sort_unstable();
  ids.dedup();
  ids
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::extract::FromRequest;
  use crate::models::{NewImage, NewTag};
  use crate::test_support::{multipart_request, png_bytes, seed_user, test_state};

  async fn seed_image(state: &AppState, owner_id: i32, filename: &str) -> Image {
    crate::db::images::insert_image(
      state.pool.get().await.unwrap(),
      NewImage::new(owner_id, filename.trim_end_matches(".png").to_string(), None, filename.to_string(), 64),
    ).await.unwrap()
  }

  async fn seed_tag(state: &AppState, owner_id: i32, name: &str) -> Tag {
    crate::db::tags::insert_tag(state.pool.get().await.unwrap(), NewTag::new(owner_id, name.to_string())).await.unwrap()
  }

  fn update_data(title: &str, images: Option<Vec<i32>>, tags: Option<Vec<i32>>) -> AlbumUpdateData {
    AlbumUpdateData { title: title.to_string(), description: None, cover_image: None, images, tags }
  }

  #[tokio::test]
  async fn create_with_tags_and_images_records_exact_sets() {
    let state = test_state().await;
    let (_, ana) = seed_user(&state, "ana").await;

    let first_tag = seed_tag(&state, ana.id, "beach").await;
    let second_tag = seed_tag(&state, ana.id, "family").await;
    let first_image = seed_image(&state, ana.id, "playa.png").await;
    let second_image = seed_image(&state, ana.id, "faro.png").await;

    let album = crate::db::albums::insert_album(
      state.pool.get().await.unwrap(),
      NewAlbum::new(ana.id, "Trip".to_string(), None),
    ).await.unwrap();
    crate::db::albums::sync_tags(state.pool.get().await.unwrap(), album.id, vec![first_tag.id, second_tag.id]).await.unwrap();
    crate::db::albums::sync_images(state.pool.get().await.unwrap(), album.id, vec![first_image.id, second_image.id]).await.unwrap();

    let mut tag_ids = crate::db::albums::get_album_tags(state.pool.get().await.unwrap(), album.id).await.unwrap()
      .iter().map(|tag| tag.id).collect::<Vec<i32>>();
    tag_ids.sort_unstable();
    assert_eq!(tag_ids, normalized(vec![first_tag.id, second_tag.id]));

    let mut image_ids = crate::db::albums::get_album_images(state.pool.get().await.unwrap(), album.id).await.unwrap()
      .iter().map(|image| image.id).collect::<Vec<i32>>();
    image_ids.sort_unstable();
    assert_eq!(image_ids, normalized(vec![first_image.id, second_image.id]));
  }

  #[tokio::test]
  async fn create_from_multipart_uploads_and_syncs() {
    let state = test_state().await;
    let (_, ana) = seed_user(&state, "ana").await;
    let tag = seed_tag(&state, ana.id, "beach").await;

    let request = multipart_request(vec![
      ("title", None, b"Trip".to_vec()),
      ("tags[]", None, tag.id.to_string().into_bytes()),
      ("images[]", Some("playa.png"), png_bytes(80)),
      ("images[]", Some("faro.png"), png_bytes(120)),
    ]);
    let multipart = Multipart::from_request(request, &()).await.unwrap();

    let (status, Json(album)) = store_album(AlbumsRoute, State(state.clone()), Extension(Arc::new(ana)), multipart)
      .await
      .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(album.title, "Trip");
    assert_eq!(album.images_count, 2);
    assert_eq!(album.tags.len(), 1);
    assert_eq!(album.tags[0].id, tag.id);

    let mut titles = album.images.iter().map(|image| image.title.clone()).collect::<Vec<String>>();
    titles.sort();
    assert_eq!(titles, ["faro", "playa"]);
    for image in &album.images {
      assert!(state.store.exists(&image.filename).await);
    }
  }

  #[tokio::test]
  async fn update_replaces_both_association_sets() {
    let state = test_state().await;
    let (_, ana) = seed_user(&state, "ana").await;
    let ana = Arc::new(ana);

    let tag = seed_tag(&state, ana.id, "beach").await;
    let first = seed_image(&state, ana.id, "a.png").await;
    let second = seed_image(&state, ana.id, "b.png").await;
    let third = seed_image(&state, ana.id, "c.png").await;

    let album = crate::db::albums::insert_album(
      state.pool.get().await.unwrap(),
      NewAlbum::new(ana.id, "Trip".to_string(), None),
    ).await.unwrap();

    update_album(
      AlbumRoute { album_id: album.id },
      State(state.clone()),
      Extension(ana.clone()),
      Json(update_data("Trip", Some(vec![first.id, second.id]), Some(vec![tag.id]))),
    ).await.unwrap();

    let Json(updated) = update_album(
      AlbumRoute { album_id: album.id },
      State(state.clone()),
      Extension(ana),
      Json(update_data("Trip", Some(vec![second.id, third.id]), Some(vec![]))),
    ).await.unwrap();

    let mut image_ids = updated.images.iter().map(|image| image.id).collect::<Vec<i32>>();
    image_ids.sort_unstable();
    assert_eq!(image_ids, normalized(vec![second.id, third.id]));
    assert!(updated.tags.is_empty());
  }

  #[tokio::test]
  async fn upload_into_album_replaces_the_image_set() {
    let state = test_state().await;
    let (_, ana) = seed_user(&state, "ana").await;

    let existing = seed_image(&state, ana.id, "old.png").await;
    let album = crate::db::albums::insert_album(
      state.pool.get().await.unwrap(),
      NewAlbum::new(ana.id, "Trip".to_string(), None),
    ).await.unwrap();
    crate::db::albums::sync_images(state.pool.get().await.unwrap(), album.id, vec![existing.id]).await.unwrap();

    let request = multipart_request(vec![("images[]", Some("nuevo.png"), png_bytes(96))]);
    let multipart = Multipart::from_request(request, &()).await.unwrap();

    let Json(updated) = upload_into_album(
      AlbumImagesRoute { album_id: album.id },
      State(state.clone()),
      Extension(Arc::new(ana)),
      multipart,
    ).await.unwrap();

    // the set is replaced with the new upload, not appended to
    assert_eq!(updated.images_count, 1);
    assert_eq!(updated.images[0].title, "nuevo");

    // the previous image keeps existing outside the album
    assert!(crate::db::images::select_image(state.pool.get().await.unwrap(), existing.id).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn update_rejects_foreign_ids_before_writing() {
    let state = test_state().await;
    let (_, ana) = seed_user(&state, "ana").await;
    let (_, bruno) = seed_user(&state, "bruno").await;

    let foreign_image = seed_image(&state, bruno.id, "secret.png").await;

    let album = crate::db::albums::insert_album(
      state.pool.get().await.unwrap(),
      NewAlbum::new(ana.id, "Trip".to_string(), None),
    ).await.unwrap();

    let result = update_album(
      AlbumRoute { album_id: album.id },
      State(state.clone()),
      Extension(Arc::new(ana)),
      Json(update_data("Trip", Some(vec![foreign_image.id]), None)),
    ).await;

    assert!(matches!(result, Err(ApiError::Validation(_))));
    let images = crate::db::albums::get_album_images(state.pool.get().await.unwrap(), album.id).await.unwrap();
    assert!(images.is_empty());
  }

  #[tokio::test]
  async fn cross_user_update_is_denied() {
    let state = test_state().await;
    let (_, ana) = seed_user(&state, "ana").await;
    let (_, bruno) = seed_user(&state, "bruno").await;

    let album = crate::db::albums::insert_album(
      state.pool.get().await.unwrap(),
      NewAlbum::new(ana.id, "Trip".to_string(), None),
    ).await.unwrap();

    let result = update_album(
      AlbumRoute { album_id: album.id },
      State(state.clone()),
      Extension(Arc::new(bruno)),
      Json(update_data("Hijacked", None, None)),
    ).await;

    assert!(matches!(result, Err(ApiError::Denied(_))));
    let unchanged = crate::db::albums::select_album(state.pool.get().await.unwrap(), album.id).await.unwrap().unwrap();
    assert_eq!(unchanged.title, "Trip");
  }

  #[tokio::test]
  async fn delete_keeps_the_referenced_images() {
    let state = test_state().await;
    let (_, ana) = seed_user(&state, "ana").await;

    let image = seed_image(&state, ana.id, "kept.png").await;
    let album = crate::db::albums::insert_album(
      state.pool.get().await.unwrap(),
      NewAlbum::new(ana.id, "Trip".to_string(), None),
    ).await.unwrap();
    crate::db::albums::sync_images(state.pool.get().await.unwrap(), album.id, vec![image.id]).await.unwrap();

    let result = delete_album(AlbumRoute { album_id: album.id }, State(state.clone()), Extension(Arc::new(ana))).await;
    assert!(matches!(result, Ok(StatusCode::NO_CONTENT)));

    assert!(crate::db::albums::select_album(state.pool.get().await.unwrap(), album.id).await.unwrap().is_none());
    let pairs = crate::db::albums::get_images_for_albums(state.pool.get().await.unwrap(), vec![album.id]).await.unwrap();
    assert!(pairs.is_empty());

    // the image itself survives the album
    assert!(crate::db::images::select_image(state.pool.get().await.unwrap(), image.id).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn other_users_albums_read_as_missing() {
    let state = test_state().await;
    let (_, ana) = seed_user(&state, "ana").await;
    let (_, bruno) = seed_user(&state, "bruno").await;

    let album = crate::db::albums::insert_album(
      state.pool.get().await.unwrap(),
      NewAlbum::new(ana.id, "Trip".to_string(), None),
    ).await.unwrap();

    let result = edit_album_data(
      AlbumEditRoute { album_id: album.id },
      State(state.clone()),
      Extension(Arc::new(bruno)),
    ).await;

    assert!(matches!(result, Err(ApiError::NotFound)));
  }
}
