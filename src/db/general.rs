use crate::DbConn;
use crate::schema::{albums, images};
use diesel::ExpressionMethods;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::dsl::sql;
use diesel::sql_types::{BigInt, Nullable};

/// Aggregates shown on the dashboard.
#[derive(Clone, Copy, Debug)]
pub struct UserStats {
  pub images_count: i64,
  pub albums_count: i64,
  pub images_size: i64,
}

pub async fn user_stats(conn: DbConn, user_id: i32) -> Result<UserStats, diesel::result::Error> {
  conn.interact(move |c| {
    let images_count = images::table
      .filter(images::dsl::owner_id.eq(user_id))
      .count()
      .get_result::<i64>(c)?;

    let albums_count = albums::table
      .filter(albums::dsl::owner_id.eq(user_id))
      .count()
      .get_result::<i64>(c)?;

    let images_size: Option<i64> = images::table
      .filter(images::dsl::owner_id.eq(user_id))
      .select(sql::<Nullable<BigInt>>("SUM(size)"))
      .first(c)?;

    Ok(UserStats { images_count, albums_count, images_size: images_size.unwrap_or(0) })
  }).await.unwrap()
}
