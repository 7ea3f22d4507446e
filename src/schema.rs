diesel::table! {
  users (id) {
    id -> Integer,
    username -> Text,
    api_token -> Text,
    created_at -> Timestamp,
  }
}

diesel::table! {
  images (id) {
    id -> Integer,
    owner_id -> Integer,
    title -> Text,
    description -> Nullable<Text>,
    filename -> Text,
    size -> BigInt,
    created_at -> Timestamp,
  }
}

diesel::table! {
  albums (id) {
    id -> Integer,
    owner_id -> Integer,
    title -> Text,
    description -> Nullable<Text>,
    cover_image -> Nullable<Text>,
    created_at -> Timestamp,
  }
}

diesel::table! {
  tags (id) {
    id -> Integer,
    owner_id -> Integer,
    name -> Text,
    created_at -> Timestamp,
  }
}

diesel::table! {
  images_tags (id) {
    id -> Integer,
    image_id -> Integer,
    tag_id -> Integer,
  }
}

diesel::table! {
  albums_tags (id) {
    id -> Integer,
    album_id -> Integer,
    tag_id -> Integer,
  }
}

diesel::table! {
  albums_images (id) {
    id -> Integer,
    album_id -> Integer,
    image_id -> Integer,
  }
}

diesel::joinable!(images -> users (owner_id));
diesel::joinable!(albums -> users (owner_id));
diesel::joinable!(tags -> users (owner_id));
diesel::joinable!(images_tags -> images (image_id));
diesel::joinable!(images_tags -> tags (tag_id));
diesel::joinable!(albums_tags -> albums (album_id));
diesel::joinable!(albums_tags -> tags (tag_id));
diesel::joinable!(albums_images -> albums (album_id));
diesel::joinable!(albums_images -> images (image_id));

diesel::allow_tables_to_appear_in_same_query!(
  users,
  images,
  albums,
  tags,
  images_tags,
  albums_tags,
  albums_images,
);
