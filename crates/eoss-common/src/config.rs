//! Process-wide configuration snapshot.
//!
//! Loaded once at startup (see the `eoss` binary's `main`) and handed to every
//! component constructor as an `Arc<Config>` rather than read from a global.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_version_salt() -> String {
    "snoopy".to_string()
}

fn default_tmp_path() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/tmp/mds.sql")
}

fn default_db_table() -> String {
    "metadata".to_string()
}

fn default_log_backup_count() -> u32 {
    10
}

fn default_log_max_bytes() -> u64 {
    1_073_741_824
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    #[serde(default = "default_version_salt")]
    pub version_salt: String,

    #[serde(default = "default_tmp_path")]
    pub storage_path: PathBuf,

    #[serde(default = "default_db_path")]
    pub metadata_db_path: PathBuf,

    #[serde(default = "default_db_table")]
    pub metadata_db_table: String,

    #[serde(default = "default_tmp_path")]
    pub logging_path: PathBuf,

    #[serde(default = "default_tmp_path")]
    pub object_lock_path: PathBuf,

    #[serde(default = "default_log_backup_count")]
    pub log_backup_count: u32,

    #[serde(default = "default_log_max_bytes")]
    pub log_max_bytes: u64,

    #[serde(default)]
    pub safemode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version_salt: default_version_salt(),
            storage_path: default_tmp_path(),
            metadata_db_path: default_db_path(),
            metadata_db_table: default_db_table(),
            logging_path: default_tmp_path(),
            object_lock_path: default_tmp_path(),
            log_backup_count: default_log_backup_count(),
            log_max_bytes: default_log_max_bytes(),
            safemode: false,
        }
    }
}
