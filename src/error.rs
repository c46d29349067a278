use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to open store {path}: {source}")]
    StoreOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed store {path}: {source}")]
    StoreFormat {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write store {path}: {source}")]
    StoreWrite {
        path: PathBuf,
        source: serde_json::Error,
    },
}
