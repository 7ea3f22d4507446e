use crate::DbConn;
use crate::models::{NewUser, User};
use crate::schema::users;
use diesel::ExpressionMethods;
use diesel::OptionalExtension;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::Table;

/// Resolves the opaque token the session collaborator hands out.
pub async fn get_user_by_api_token(conn: DbConn, token: String) -> Result<Option<User>, diesel::result::Error> {
  conn.interact(move |c| {
    users::table
      .select(users::table::all_columns())
      .filter(users::dsl::api_token.eq(token))
      .first::<User>(c)
      .optional()
  }).await.unwrap()
}

/// Account provisioning happens outside this service; this exists for
/// seeding and tests.
pub async fn insert_user(conn: DbConn, new_user: NewUser) -> Result<User, diesel::result::Error> {
  conn.interact(move |c| {
    diesel::insert_into(users::table)
      .values(new_user)
      .get_result::<User>(c)
  }).await.unwrap()
}
