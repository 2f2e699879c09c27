use std::collections::HashMap;
use std::path::{Path, PathBuf};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use log::{info, warn};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone)]
struct UserRecord {
    user_name: String,
    hashed_password: String,
}

/// The `user.csv` credential file: `user_name,hashed_password`. Loaded
/// once into memory and appended to (both the in-memory map and the
/// file) on sign-up; never mutated otherwise. Password hashes are
/// produced and checked through argon2 exclusively — plaintext never
/// touches a comparison.
pub struct UserStore {
    path: PathBuf,
    users: RwLock<HashMap<String, UserRecord>>,
}

impl UserStore {
    /// Load `path` if it exists, or start with an empty store (the file
    /// is created on the first sign-up).
    pub async fn load(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut users = HashMap::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                for (lineno, line) in contents.lines().enumerate() {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let (user_name, hashed_password) = line.split_once(',').ok_or_else(|| {
                        AuthError::operational(format!(
                            "{path:?}:{}: malformed user record",
                            lineno + 1
                        ))
                    })?;
                    users.insert(
                        user_name.to_string(),
                        UserRecord {
                            user_name: user_name.to_string(),
                            hashed_password: hashed_password.to_string(),
                        },
                    );
                }
                info!("loaded {} user(s) from {path:?}", users.len());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("{path:?} does not exist yet; starting with an empty user store");
            }
            Err(e) => {
                return Err(AuthError::operational(format!("reading {path:?}: {e}")));
            }
        }

        Ok(UserStore {
            path,
            users: RwLock::new(users),
        })
    }

    /// Create a new user: rejects empty credentials, rejects a user name
    /// containing the row-file delimiter or a newline (it would corrupt
    /// the credential file), hashes the password, and durably appends
    /// the record.
    pub async fn create_user(&self, user_name: &str, password: &str) -> AuthResult<()> {
        if user_name.is_empty() || password.is_empty() {
            return Err(AuthError::data("username and password must not be empty"));
        }
        if user_name.contains(',') || user_name.contains('\n') {
            return Err(AuthError::data(
                "username contains invalid characters",
            ));
        }

        let mut users = self.users.write().await;
        if users.contains_key(user_name) {
            return Err(AuthError::integrity(format!(
                "user '{user_name}' already exists"
            )));
        }

        let hashed_password = hash_password(password)?;
        append_record(&self.path, user_name, &hashed_password).await?;
        users.insert(
            user_name.to_string(),
            UserRecord {
                user_name: user_name.to_string(),
                hashed_password,
            },
        );
        Ok(())
    }

    /// Verify `password` against the stored hash for `user_name`.
    /// Unknown user and wrong password are indistinguishable to the
    /// caller (both a generic unauthorized), to avoid leaking which
    /// user names exist.
    pub async fn verify(&self, user_name: &str, password: &str) -> AuthResult<()> {
        let users = self.users.read().await;
        let record = users
            .get(user_name)
            .ok_or_else(|| AuthError::unauthorized("incorrect username or password"))?;
        verify_password(password, &record.hashed_password)
            .then_some(())
            .ok_or_else(|| AuthError::unauthorized("incorrect username or password"))
    }

    pub async fn exists(&self, user_name: &str) -> bool {
        self.users.read().await.contains_key(user_name)
    }
}

fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::internal(format!("failed to hash password: {e}")))
}

fn verify_password(password: &str, hashed: &str) -> bool {
    match PasswordHash::new(hashed) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

async fn append_record(path: &Path, user_name: &str, hashed_password: &str) -> AuthResult<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| AuthError::operational(format!("opening {path:?}: {e}")))?;
    file.write_all(format!("{user_name},{hashed_password}\n").as_bytes())
        .await
        .map_err(|e| AuthError::operational(format!("writing {path:?}: {e}")))?;
    Ok(())
}
