use std::net::SocketAddr;
use std::path::PathBuf;

/// Runtime configuration, read once at startup from the environment
/// (a `.env` file is honoured via dotenv).
#[derive(Clone, Debug)]
pub struct Config {
  pub database_url: String,
  pub bind_addr: SocketAddr,
  pub storage_root: Option<PathBuf>,
  pub public_url: String,
}

impl Config {
  pub fn from_env() -> anyhow::Result<Config> {
    let database_url = env_trimmed("DATABASE_URL").unwrap_or_else(|| "fototeca.db".to_string());

    let bind_addr = env_trimmed("BIND_ADDR")
      .unwrap_or_else(|| "127.0.0.1:3030".to_string())
      .parse::<SocketAddr>()?;

    let storage_root = env_trimmed("STORAGE_ROOT").map(PathBuf::from);

    let public_url = normalise_public_url(
      &env_trimmed("PUBLIC_URL").unwrap_or_else(|| format!("http://{bind_addr}")),
    );

    Ok(Config { database_url, bind_addr, storage_root, public_url })
  }
}

fn env_trimmed(key: &str) -> Option<String> {
  std::env::var(key)
    .ok()
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
}

/// Normalises PUBLIC_URL so stored-object links can be built by plain
/// concatenation with a path.
fn normalise_public_url(raw: &str) -> String {
  raw.trim_end_matches('/').to_string()
}

#[test]
fn keeps_plain_origin() {
  assert_eq!(normalise_public_url("http://localhost:3030"), "http://localhost:3030");
}

#[test]
fn strips_trailing_slashes() {
  assert_eq!(normalise_public_url("https://fototeca.test.local///"), "https://fototeca.test.local");
}

#[test]
fn keeps_path_prefix() {
  assert_eq!(normalise_public_url("https://fototeca.test.local/api/"), "https://fototeca.test.local/api");
}
