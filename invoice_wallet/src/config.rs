use std::path::{Path, PathBuf};

const DB_FILE_NAME: &str = "wallet.db";

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletConfig {
    /// Directory the wallet database lives in. Created on open if missing.
    pub data_dir: PathBuf,
}

impl WalletConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }
}
