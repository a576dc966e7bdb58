use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::DEFAULT_SEARCH_DEBOUNCE_MS;

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Directory where the note database lives
    pub data_dir: PathBuf,

    /// File name of the database snapshot inside `data_dir`
    pub database_file: String,

    /// Quiet window for debounced search, in milliseconds
    pub search_debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("notedesk");

        Self {
            data_dir,
            database_file: "notedesk.json".to_string(),
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
        }
    }
}

impl Config {
    /// Full path of the database snapshot file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }
}
