use std::path::{Path, PathBuf};

pub const USER_ENV_VAR: &str = "POSEVAULT_USER";

const LIBRARY_FILE_NAME: &str = "library.json";
const REPLICA_FILE_NAME: &str = "replica.sqlite3";

#[derive(Clone, Debug)]
pub struct VaultConfig {
    pub library_path: PathBuf,
    pub replica_path: PathBuf,
    /// Owner of the remote rows. Sync is skipped when unset.
    pub user_id: Option<String>,
}

impl VaultConfig {
    pub fn default() -> Self {
        let dir = default_data_dir();
        Self {
            library_path: dir.join(LIBRARY_FILE_NAME),
            replica_path: dir.join(REPLICA_FILE_NAME),
            user_id: user_from_env(),
        }
    }

    pub fn with_library(mut self, path: PathBuf) -> Self {
        self.library_path = expand_tilde(&path);
        self
    }

    pub fn with_replica(mut self, path: PathBuf) -> Self {
        self.replica_path = expand_tilde(&path);
        self
    }

    pub fn with_user(mut self, user_id: String) -> Self {
        let trimmed = user_id.trim();
        self.user_id = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }
}

pub fn default_data_dir() -> PathBuf {
    if let Some(data) = dirs::data_dir() {
        return data.join("posevault");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".posevault");
    }
    PathBuf::from("./posevault")
}

pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if path_str == "~" || path_str.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let suffix = path_str.trim_start_matches('~');
            return home.join(suffix.trim_start_matches('/'));
        }
    }
    path.to_path_buf()
}

fn user_from_env() -> Option<String> {
    std::env::var(USER_ENV_VAR)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
