use crate::DbConn;
use crate::models::{NewTag, Tag};
use crate::schema::{albums_tags, images_tags, tags};
use diesel::BoolExpressionMethods;
use diesel::Connection;
use diesel::ExpressionMethods;
use diesel::OptionalExtension;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::Table;

pub async fn select_tag(conn: DbConn, tag_id: i32) -> Result<Option<Tag>, diesel::result::Error> {
  conn.interact(move |c| {
    tags::table
      .select(tags::table::all_columns())
      .filter(tags::dsl::id.eq(tag_id))
      .first::<Tag>(c)
      .optional()
  }).await.unwrap()
}

pub async fn get_tag_list(conn: DbConn, user_id: i32) -> Result<Vec<Tag>, diesel::result::Error> {
  conn.interact(move |c| {
    tags::table
      .select(tags::table::all_columns())
      .filter(tags::dsl::owner_id.eq(user_id))
      .order(tags::dsl::created_at.desc())
      .get_results::<Tag>(c)
  }).await.unwrap()
}

pub async fn insert_tag(conn: DbConn, new_tag: NewTag) -> Result<Tag, diesel::result::Error> {
  conn.interact(move |c| {
    diesel::insert_into(tags::table)
      .values(new_tag)
      .get_result::<Tag>(c)
  }).await.unwrap()
}

pub async fn update_tag(conn: DbConn, tag_id: i32, name: String) -> Result<usize, diesel::result::Error> {
  conn.interact(move |c| {
    diesel::update(tags::table.filter(tags::dsl::id.eq(tag_id)))
      .set(tags::dsl::name.eq(name))
      .execute(c)
  }).await.unwrap()
}

/// Removes the row together with its image and album association rows.
/// The images and albums the tag was attached to are untouched.
pub async fn delete_tag(conn: DbConn, tag_id: i32) -> Result<usize, diesel::result::Error> {
  conn.interact(move |c| {
    c.transaction::<_, diesel::result::Error, _>(|c| {
      diesel::delete(images_tags::table.filter(images_tags::dsl::tag_id.eq(tag_id))).execute(c)?;
      diesel::delete(albums_tags::table.filter(albums_tags::dsl::tag_id.eq(tag_id))).execute(c)?;
      diesel::delete(tags::table.filter(tags::dsl::id.eq(tag_id))).execute(c)
    })
  }).await.unwrap()
}

/// Tag names are unique per owner, not globally; `exclude_id` lets a
/// rename keep its own current name.
pub async fn name_taken(conn: DbConn, user_id: i32, name: String, exclude_id: Option<i32>) -> Result<bool, diesel::result::Error> {
  let existing: Option<i32> = conn.interact(move |c| {
    let mut query = tags::table
      .select(tags::dsl::id)
      .filter(tags::dsl::owner_id.eq(user_id).and(tags::dsl::name.eq(name)))
      .into_boxed();

    if let Some(exclude_id) = exclude_id {
      query = query.filter(tags::dsl::id.ne(exclude_id));
    }

    query.first::<i32>(c).optional()
  }).await.unwrap()?;

  Ok(existing.is_some())
}

/// Which of the given tag ids exist and belong to the user.
pub async fn select_owned_ids(conn: DbConn, user_id: i32, ids: Vec<i32>) -> Result<Vec<i32>, diesel::result::Error> {
  conn.interact(move |c| {
    tags::table
      .select(tags::dsl::id)
      .filter(tags::dsl::id.eq_any(ids).and(tags::dsl::owner_id.eq(user_id)))
      .get_results::<i32>(c)
  }).await.unwrap()
}
