use crate::schema::{albums, albums_images, albums_tags, images, images_tags, tags, users};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;

#[derive(Identifiable, Queryable, Clone, Debug)]
#[diesel(table_name = users)]
pub struct User {
  pub id: i32,
  pub username: String,
  pub api_token: String,
  pub created_at: NaiveDateTime,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = users)]
pub struct NewUser {
  pub username: String,
  pub api_token: String,
  pub created_at: NaiveDateTime,
}

impl NewUser {
  pub fn new(username: String, api_token: String) -> Self {
    Self { username, api_token, created_at: Utc::now().naive_utc() }
  }
}

#[derive(Identifiable, Queryable, Clone, Debug)]
#[diesel(table_name = images)]
pub struct Image {
  pub id: i32,
  pub owner_id: i32,
  pub title: String,
  pub description: Option<String>,
  pub filename: String,
  pub size: i64,
  pub created_at: NaiveDateTime,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = images)]
pub struct NewImage {
  pub owner_id: i32,
  pub title: String,
  pub description: Option<String>,
  pub filename: String,
  pub size: i64,
  pub created_at: NaiveDateTime,
}

impl NewImage {
  pub fn new(owner_id: i32, title: String, description: Option<String>, filename: String, size: i64) -> Self {
    Self { owner_id, title, description, filename, size, created_at: Utc::now().naive_utc() }
  }
}

#[derive(Identifiable, Queryable, Clone, Debug)]
#[diesel(table_name = albums)]
pub struct Album {
  pub id: i32,
  pub owner_id: i32,
  pub title: String,
  pub description: Option<String>,
  pub cover_image: Option<String>,
  pub created_at: NaiveDateTime,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = albums)]
pub struct NewAlbum {
  pub owner_id: i32,
  pub title: String,
  pub description: Option<String>,
  pub cover_image: Option<String>,
  pub created_at: NaiveDateTime,
}

impl NewAlbum {
  pub fn new(owner_id: i32, title: String, description: Option<String>) -> Self {
    Self { owner_id, title, description, cover_image: None, created_at: Utc::now().naive_utc() }
  }
}

#[derive(Identifiable, Queryable, Clone, Debug)]
#[diesel(table_name = tags)]
pub struct Tag {
  pub id: i32,
  pub owner_id: i32,
  pub name: String,
  pub created_at: NaiveDateTime,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = tags)]
pub struct NewTag {
  pub owner_id: i32,
  pub name: String,
  pub created_at: NaiveDateTime,
}

impl NewTag {
  pub fn new(owner_id: i32, name: String) -> Self {
    Self { owner_id, name, created_at: Utc::now().naive_utc() }
  }
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = images_tags)]
pub struct NewImageTag {
  pub image_id: i32,
  pub tag_id: i32,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = albums_tags)]
pub struct NewAlbumTag {
  pub album_id: i32,
  pub tag_id: i32,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = albums_images)]
pub struct NewAlbumImage {
  pub album_id: i32,
  pub image_id: i32,
}
