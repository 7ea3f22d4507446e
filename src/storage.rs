use std::io::ErrorKind;
use std::path::PathBuf;
use directories::ProjectDirs;
use tokio::fs;
use tracing::{error, warn};

/// Flat blob store keyed by bare filename under a single root directory.
/// Keys never contain path separators; anything else is rejected before it
/// can reach the filesystem.
#[derive(Clone, Debug)]
pub struct FileStore {
  root: PathBuf,
  public_url: String,
}

impl FileStore {
  /// Opens the store, creating the root directory when missing. Falls back
  /// to the platform data directory when no root is configured.
  pub fn open(root: Option<PathBuf>, public_url: String) -> anyhow::Result<FileStore> {
    let root = match root {
      Some(root) => root,
      None => default_root()?,
    };

    if !root.is_dir() {
      warn!("Creating missing storage directory at {:?}.", root);
      std::fs::create_dir_all(&root)?;
    }

    Ok(FileStore { root, public_url })
  }

  fn path_of(&self, key: &str) -> std::io::Result<PathBuf> {
    if !valid_key(key) {
      return Err(std::io::Error::new(ErrorKind::InvalidInput, format!("invalid storage key {key:?}")));
    }

    Ok(self.root.join(key))
  }

  pub async fn write(&self, key: &str, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(self.path_of(key)?, bytes).await
  }

  pub async fn exists(&self, key: &str) -> bool {
    match self.path_of(key) {
      Ok(path) => fs::try_exists(path).await.unwrap_or(false),
      Err(_) => false,
    }
  }

  pub async fn rename(&self, old_key: &str, new_key: &str) -> std::io::Result<()> {
    fs::rename(self.path_of(old_key)?, self.path_of(new_key)?).await
  }

  /// Removes the object. An already-absent object is not an error, so
  /// deletion is idempotent from the caller's perspective.
  pub async fn delete(&self, key: &str) -> std::io::Result<()> {
    match fs::remove_file(self.path_of(key)?).await {
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
      result => result,
    }
  }

  pub async fn open_object(&self, key: &str) -> std::io::Result<fs::File> {
    fs::File::open(self.path_of(key)?).await
  }

  /// Link under which `serve_file` exposes the object to clients.
  pub fn url(&self, key: &str) -> String {
    format!("{}/files/{}", self.public_url, key)
  }

  /// Starts a rename that can still be undone until the database write
  /// depending on it has committed. When the keys are equal nothing is
  /// moved and revert is a no-op.
  pub async fn begin_rename(&self, from: &str, to: &str) -> std::io::Result<RenameOp<'_>> {
    let moved = from != to;

    if moved {
      self.rename(from, to).await?;
    }

    Ok(RenameOp { store: self, from: from.to_string(), to: to.to_string(), moved })
  }
}

/// An applied storage rename awaiting its database commit.
pub struct RenameOp<'a> {
  store: &'a FileStore,
  from: String,
  to: String,
  moved: bool,
}

impl RenameOp<'_> {
  /// The database write landed; the rename is final.
  pub fn commit(self) {}

  /// Compensating action: moves the object back to its original key.
  /// Returns false when the object could not be restored, in which case
  /// storage and database are knowingly left inconsistent.
  pub async fn revert(&self) -> bool {
    if !self.moved {
      return true;
    }

    if !self.store.exists(&self.to).await {
      return true;
    }

    match self.store.rename(&self.to, &self.from).await {
      Ok(()) => true,
      Err(e) => {
        error!("Could not restore {:?} back to {:?}, storage is now inconsistent: {e}", self.to, self.from);
        false
      }
    }
  }
}

fn valid_key(key: &str) -> bool {
  !key.is_empty() && key != "." && key != ".." && !key.contains('/') && !key.contains('\\')
}

fn default_root() -> anyhow::Result<PathBuf> {
  let Some(dirs) = ProjectDirs::from("org", "fototeca", "fototeca") else {
    anyhow::bail!("Home directory location is unknown.");
  };

  Ok(dirs.data_dir().join("library"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use uuid::Uuid;

  fn temp_store() -> FileStore {
    let root = std::env::temp_dir().join(format!("fototeca-store-{}", Uuid::new_v4()));
    FileStore::open(Some(root), "http://localhost:3030".to_string()).unwrap()
  }

  #[tokio::test]
  async fn write_then_exists_then_delete() {
    let store = temp_store();

    store.write("a.png", b"pixels").await.unwrap();
    assert!(store.exists("a.png").await);

    store.delete("a.png").await.unwrap();
    assert!(!store.exists("a.png").await);

    // second delete of the same key is not an error
    store.delete("a.png").await.unwrap();
  }

  #[tokio::test]
  async fn rename_moves_the_object() {
    let store = temp_store();
    store.write("old.jpg", b"pixels").await.unwrap();

    store.rename("old.jpg", "new.jpg").await.unwrap();

    assert!(!store.exists("old.jpg").await);
    assert!(store.exists("new.jpg").await);
  }

  #[tokio::test]
  async fn revert_restores_the_original_key() {
    let store = temp_store();
    store.write("old.jpg", b"pixels").await.unwrap();

    let rename = store.begin_rename("old.jpg", "new.jpg").await.unwrap();
    assert!(store.exists("new.jpg").await);

    assert!(rename.revert().await);
    assert!(store.exists("old.jpg").await);
    assert!(!store.exists("new.jpg").await);
  }

  #[tokio::test]
  async fn revert_without_move_is_a_noop() {
    let store = temp_store();
    store.write("same.jpg", b"pixels").await.unwrap();

    let rename = store.begin_rename("same.jpg", "same.jpg").await.unwrap();
    assert!(rename.revert().await);
    assert!(store.exists("same.jpg").await);
  }

  #[tokio::test]
  async fn rejects_keys_with_path_separators() {
    let store = temp_store();

    assert!(store.write("../escape.png", b"pixels").await.is_err());
    assert!(store.write("nested/escape.png", b"pixels").await.is_err());
    assert!(!store.exists("../escape.png").await);
  }

  #[test]
  fn builds_public_urls() {
    let store = temp_store();
    assert_eq!(store.url("a.png"), "http://localhost:3030/files/a.png");
  }
}
