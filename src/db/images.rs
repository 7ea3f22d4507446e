use crate::DbConn;
use crate::models::{Image, NewImage, NewImageTag, Tag};
use crate::schema::{albums_images, images, images_tags, tags};
use diesel::BoolExpressionMethods;
use diesel::Connection;
use diesel::ExpressionMethods;
use diesel::OptionalExtension;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::Table;

pub async fn select_image(conn: DbConn, image_id: i32) -> Result<Option<Image>, diesel::result::Error> {
  conn.interact(move |c| {
    images::table
      .select(images::table::all_columns())
      .filter(images::dsl::id.eq(image_id))
      .first::<Image>(c)
      .optional()
  }).await.unwrap()
}

pub async fn get_image_list(conn: DbConn, user_id: i32) -> Result<Vec<Image>, diesel::result::Error> {
  conn.interact(move |c| {
    images::table
      .select(images::table::all_columns())
      .filter(images::dsl::owner_id.eq(user_id))
      .order(images::dsl::created_at.desc())
      .get_results::<Image>(c)
  }).await.unwrap()
}

pub async fn insert_image(conn: DbConn, new_image: NewImage) -> Result<Image, diesel::result::Error> {
  conn.interact(move |c| {
    diesel::insert_into(images::table)
      .values(new_image)
      .get_result::<Image>(c)
  }).await.unwrap()
}

pub async fn update_image(
  conn: DbConn,
  image_id: i32,
  title: String,
  filename: String,
  description: Option<String>,
) -> Result<usize, diesel::result::Error> {
  conn.interact(move |c| {
    diesel::update(images::table.filter(images::dsl::id.eq(image_id)))
      .set((
        images::dsl::title.eq(title),
        images::dsl::filename.eq(filename),
        images::dsl::description.eq(description),
      ))
      .execute(c)
  }).await.unwrap()
}

/// Rewrites the filename column alone, used while compensating a failed
/// update.
pub async fn update_filename(conn: DbConn, image_id: i32, filename: String) -> Result<usize, diesel::result::Error> {
  conn.interact(move |c| {
    diesel::update(images::table.filter(images::dsl::id.eq(image_id)))
      .set(images::dsl::filename.eq(filename))
      .execute(c)
  }).await.unwrap()
}

/// Removes the row together with its tag and album association rows.
pub async fn delete_image(conn: DbConn, image_id: i32) -> Result<usize, diesel::result::Error> {
  conn.interact(move |c| {
    c.transaction::<_, diesel::result::Error, _>(|c| {
      diesel::delete(images_tags::table.filter(images_tags::dsl::image_id.eq(image_id))).execute(c)?;
      diesel::delete(albums_images::table.filter(albums_images::dsl::image_id.eq(image_id))).execute(c)?;
      diesel::delete(images::table.filter(images::dsl::id.eq(image_id))).execute(c)
    })
  }).await.unwrap()
}

/// Which of the given image ids exist and belong to the user.
pub async fn select_owned_ids(conn: DbConn, user_id: i32, ids: Vec<i32>) -> Result<Vec<i32>, diesel::result::Error> {
  conn.interact(move |c| {
    images::table
      .select(images::dsl::id)
      .filter(images::dsl::id.eq_any(ids).and(images::dsl::owner_id.eq(user_id)))
      .get_results::<i32>(c)
  }).await.unwrap()
}

pub async fn get_image_tags(conn: DbConn, image_id: i32) -> Result<Vec<Tag>, diesel::result::Error> {
  conn.interact(move |c| {
    tags::table
      .select(tags::table::all_columns())
      .filter(tags::dsl::id.eq_any(
        images_tags::table
          .select(images_tags::dsl::tag_id)
          .filter(images_tags::dsl::image_id.eq(image_id))
      ))
      .get_results::<Tag>(c)
  }).await.unwrap()
}

/// Tag rows for a whole listing at once, paired with the image they
/// belong to.
pub async fn get_tags_for_images(conn: DbConn, image_ids: Vec<i32>) -> Result<Vec<(i32, Tag)>, diesel::result::Error> {
  conn.interact(move |c| {
    images_tags::table
      .inner_join(tags::table)
      .select((images_tags::dsl::image_id, tags::table::all_columns()))
      .filter(images_tags::dsl::image_id.eq_any(image_ids))
      .load::<(i32, Tag)>(c)
  }).await.unwrap()
}

/// Replaces the image's tag set with exactly the target set: missing links
/// are inserted, links outside the target are removed, the intersection is
/// untouched.
pub async fn sync_tags(conn: DbConn, image_id: i32, target: Vec<i32>) -> Result<(), diesel::result::Error> {
  conn.interact(move |c| {
    c.transaction::<_, diesel::result::Error, _>(|c| {
      let current: Vec<i32> = images_tags::table
        .select(images_tags::dsl::tag_id)
        .filter(images_tags::dsl::image_id.eq(image_id))
        .get_results(c)?;

      let to_remove: Vec<i32> = current.iter().filter(|id| !target.contains(id)).copied().collect();
      let to_add: Vec<NewImageTag> = target.iter()
        .filter(|id| !current.contains(id))
        .map(|&tag_id| NewImageTag { image_id, tag_id })
        .collect();

      if !to_remove.is_empty() {
        diesel::delete(
          images_tags::table
            .filter(images_tags::dsl::image_id.eq(image_id))
            .filter(images_tags::dsl::tag_id.eq_any(to_remove))
        ).execute(c)?;
      }

      if !to_add.is_empty() {
        diesel::insert_into(images_tags::table).values(to_add).execute(c)?;
      }

      Ok(())
    })
  }).await.unwrap()
}
