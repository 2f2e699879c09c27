use std::path::PathBuf;

use getset::{Getters, Setters, WithSetters};

/// Server-wide configuration: where the data lives, where to listen, and
/// how long tokens stay valid. Populated from a `structopt`-derived CLI
/// struct with environment-variable fallbacks for secrets (see
/// `flatbase-server-cli`), mirroring the teacher's `ServerOptions`/`Opt`
/// split.
#[derive(Getters, Setters, WithSetters, Debug, Clone)]
#[getset(get = "pub", set = "pub", set_with = "pub")]
pub struct ServerOptions {
    host: String,
    port: u16,
    storage_root: PathBuf,
    hmac_secret: Vec<u8>,
    access_token_minutes: i64,
    refresh_token_days: i64,
}

impl ServerOptions {
    pub fn new(storage_root: impl Into<PathBuf>, hmac_secret: impl Into<Vec<u8>>) -> ServerOptions {
        ServerOptions {
            host: "127.0.0.1".to_string(),
            port: 8080,
            storage_root: storage_root.into(),
            hmac_secret: hmac_secret.into(),
            access_token_minutes: 25,
            refresh_token_days: 7,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn user_store_path(&self) -> PathBuf {
        self.storage_root.join("user.csv")
    }
}
