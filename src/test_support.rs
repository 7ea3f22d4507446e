use diesel_migrations::MigrationHarness;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::models::{NewUser, User};
use crate::storage::FileStore;
use crate::{AppState, MIGRATIONS};

/// A fresh application state: migrated in-memory database (single
/// connection, so every interact call sees the same schema) plus a
/// throwaway store under the system temp directory.
pub async fn test_state() -> AppState {
  let manager = deadpool_diesel::sqlite::Manager::new(":memory:", deadpool_diesel::Runtime::Tokio1);
  let pool = deadpool_diesel::sqlite::Pool::builder(manager)
    .max_size(1)
    .build()
    .unwrap();

  {
    let conn = pool.get().await.unwrap();
    conn.interact(|c| {
      c.run_pending_migrations(MIGRATIONS).map(|_| ()).map_err(|e| e.to_string())
    }).await.unwrap().unwrap();
  }

  let root = std::env::temp_dir().join(format!("fototeca-test-{}", Uuid::new_v4()));
  let store = FileStore::open(Some(root), "http://localhost:3030".to_string()).unwrap();

  AppState { pool, store }
}

pub async fn seed_user(state: &AppState, username: &str) -> (User, CurrentUser) {
  let user = crate::db::users::insert_user(
    state.pool.get().await.unwrap(),
    NewUser::new(username.to_string(), format!("token-{username}")),
  ).await.unwrap();

  let current = CurrentUser { id: user.id, username: user.username.clone() };
  (user, current)
}

/// A buffer that sniffs as a PNG; only the signature matters here.
pub fn png_bytes(len: usize) -> Vec<u8> {
  let mut bytes = vec![
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A,
    0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
  ];
  bytes.resize(len.max(bytes.len()), 0);
  bytes
}

const MULTIPART_BOUNDARY: &str = "fototeca-test-boundary";

/// Builds the request an upload form would send. Fields with a filename
/// become file parts, the rest plain text parts.
pub fn multipart_request(fields: Vec<(&str, Option<&str>, Vec<u8>)>) -> axum::http::Request<axum::body::Body> {
  let mut body: Vec<u8> = vec![];

  for (name, filename, bytes) in fields {
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    match filename {
      Some(filename) => body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n").as_bytes(),
      ),
      None => body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes()),
    }
    body.extend_from_slice(&bytes);
    body.extend_from_slice(b"\r\n");
  }
  body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

  axum::http::Request::builder()
    .header("content-type", format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"))
    .body(axum::body::Body::from(body))
    .unwrap()
}
