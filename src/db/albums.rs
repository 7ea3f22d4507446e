use crate::DbConn;
use crate::models::{Album, Image, NewAlbum, NewAlbumImage, NewAlbumTag, Tag};
use crate::schema::{albums, albums_images, albums_tags, images, tags};
use diesel::BoolExpressionMethods;
use diesel::Connection;
use diesel::ExpressionMethods;
use diesel::OptionalExtension;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::Table;

pub async fn select_album(conn: DbConn, album_id: i32) -> Result<Option<Album>, diesel::result::Error> {
  conn.interact(move |c| {
    albums::table
      .select(albums::table::all_columns())
      .filter(albums::dsl::id.eq(album_id))
      .first::<Album>(c)
      .optional()
  }).await.unwrap()
}

/// Owner-scoped lookup for read endpoints: another user's album id is
/// indistinguishable from a missing one.
pub async fn select_album_for(conn: DbConn, user_id: i32, album_id: i32) -> Result<Option<Album>, diesel::result::Error> {
  conn.interact(move |c| {
    albums::table
      .select(albums::table::all_columns())
      .filter(albums::dsl::id.eq(album_id).and(albums::dsl::owner_id.eq(user_id)))
      .first::<Album>(c)
      .optional()
  }).await.unwrap()
}

pub async fn get_album_list(conn: DbConn, user_id: i32) -> Result<Vec<Album>, diesel::result::Error> {
  conn.interact(move |c| {
    albums::table
      .select(albums::table::all_columns())
      .filter(albums::dsl::owner_id.eq(user_id))
      .order(albums::dsl::created_at.desc())
      .get_results::<Album>(c)
  }).await.unwrap()
}

pub async fn insert_album(conn: DbConn, new_album: NewAlbum) -> Result<Album, diesel::result::Error> {
  conn.interact(move |c| {
    diesel::insert_into(albums::table)
      .values(new_album)
      .get_result::<Album>(c)
  }).await.unwrap()
}

pub async fn update_album(
  conn: DbConn,
  album_id: i32,
  title: String,
  description: Option<String>,
  cover_image: Option<String>,
) -> Result<usize, diesel::result::Error> {
  conn.interact(move |c| {
    diesel::update(albums::table.filter(albums::dsl::id.eq(album_id)))
      .set((
        albums::dsl::title.eq(title),
        albums::dsl::description.eq(description),
        albums::dsl::cover_image.eq(cover_image),
      ))
      .execute(c)
  }).await.unwrap()
}

/// Removes the row together with its association rows. The images and
/// tags the album referenced are untouched.
pub async fn delete_album(conn: DbConn, album_id: i32) -> Result<usize, diesel::result::Error> {
  conn.interact(move |c| {
    c.transaction::<_, diesel::result::Error, _>(|c| {
      diesel::delete(albums_tags::table.filter(albums_tags::dsl::album_id.eq(album_id))).execute(c)?;
      diesel::delete(albums_images::table.filter(albums_images::dsl::album_id.eq(album_id))).execute(c)?;
      diesel::delete(albums::table.filter(albums::dsl::id.eq(album_id))).execute(c)
    })
  }).await.unwrap()
}

pub async fn get_album_images(conn: DbConn, album_id: i32) -> Result<Vec<Image>, diesel::result::Error> {
  conn.interact(move |c| {
    images::table
      .select(images::table::all_columns())
      .filter(images::dsl::id.eq_any(
        albums_images::table
          .select(albums_images::dsl::image_id)
          .filter(albums_images::dsl::album_id.eq(album_id))
      ))
      .get_results::<Image>(c)
  }).await.unwrap()
}

pub async fn get_album_tags(conn: DbConn, album_id: i32) -> Result<Vec<Tag>, diesel::result::Error> {
  conn.interact(move |c| {
    tags::table
      .select(tags::table::all_columns())
      .filter(tags::dsl::id.eq_any(
        albums_tags::table
          .select(albums_tags::dsl::tag_id)
          .filter(albums_tags::dsl::album_id.eq(album_id))
      ))
      .get_results::<Tag>(c)
  }).await.unwrap()
}

/// Tag rows for a whole listing at once, paired with the album they
/// belong to.
pub async fn get_tags_for_albums(conn: DbConn, album_ids: Vec<i32>) -> Result<Vec<(i32, Tag)>, diesel::result::Error> {
  conn.interact(move |c| {
    albums_tags::table
      .inner_join(tags::table)
      .select((albums_tags::dsl::album_id, tags::table::all_columns()))
      .filter(albums_tags::dsl::album_id.eq_any(album_ids))
      .load::<(i32, Tag)>(c)
  }).await.unwrap()
}

pub async fn get_images_for_albums(conn: DbConn, album_ids: Vec<i32>) -> Result<Vec<(i32, Image)>, diesel::result::Error> {
  conn.interact(move |c| {
    albums_images::table
      .inner_join(images::table)
      .select((albums_images::dsl::album_id, images::table::all_columns()))
      .filter(albums_images::dsl::album_id.eq_any(album_ids))
      .load::<(i32, Image)>(c)
  }).await.unwrap()
}

/// Replaces the album's tag set with exactly the target set.
pub async fn sync_tags(conn: DbConn, album_id: i32, target: Vec<i32>) -> Result<(), diesel::result::Error> {
  conn.interact(move |c| {
    c.transaction::<_, diesel::result::Error, _>(|c| {
      let current: Vec<i32> = albums_tags::table
        .select(albums_tags::dsl::tag_id)
        .filter(albums_tags::dsl::album_id.eq(album_id))
        .get_results(c)?;

      let to_remove: Vec<i32> = current.iter().filter(|id| !target.contains(id)).copied().collect();
      let to_add: Vec<NewAlbumTag> = target.iter()
        .filter(|id| !current.contains(id))
        .map(|&tag_id| NewAlbumTag { album_id, tag_id })
        .collect();

      if !to_remove.is_empty() {
        diesel::delete(
          albums_tags::table
            .filter(albums_tags::dsl::album_id.eq(album_id))
            .filter(albums_tags::dsl::tag_id.eq_any(to_remove))
        ).execute(c)?;
      }

      if !to_add.is_empty() {
        diesel::insert_into(albums_tags::table).values(to_add).execute(c)?;
      }

      Ok(())
    })
  }).await.unwrap()
}

/// Replaces the album's image set with exactly the target set.
pub async fn sync_images(conn: DbConn, album_id: i32, target: Vec<i32>) -> Result<(), diesel::result::Error> {
  conn.interact(move |c| {
    c.transaction::<_, diesel::result::Error, _>(|c| {
      let current: Vec<i32> = albums_images::table
        .select(albums_images::dsl::image_id)
        .filter(albums_images::dsl::album_id.eq(album_id))
        .get_results(c)?;

      let to_remove: Vec<i32> = current.iter().filter(|id| !target.contains(id)).copied().collect();
      let to_add: Vec<NewAlbumImage> = target.iter()
        .filter(|id| !current.contains(id))
        .map(|&image_id| NewAlbumImage { album_id, image_id })
        .collect();

      if !to_remove.is_empty() {
        diesel::delete(
          albums_images::table
            .filter(albums_images::dsl::album_id.eq(album_id))
            .filter(albums_images::dsl::image_id.eq_any(to_remove))
        ).execute(c)?;
      }

      if !to_add.is_empty() {
        diesel::insert_into(albums_images::table).values(to_add).execute(c)?;
      }

      Ok(())
    })
  }).await.unwrap()
}
