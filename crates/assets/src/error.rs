use std::path::PathBuf;

/// Errors returned synchronously by [`crate::AssetLoader::load`].
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("a load is already in progress")]
    LoadInProgress,
    #[error("failed to start loader worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Why a load request resolved unsuccessfully.
#[derive(Debug, thiserror::Error)]
pub enum AssetLoadFailure {
    #[error("failed to fetch {}: {source}", .path.display())]
    Fetch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("glTF parse error: {0}")]
    Parse(String),
    #[error("buffer {index} is missing or shorter than declared")]
    MissingBuffer { index: usize },
    #[error("buffer {index} has an unsupported data URI")]
    InvalidDataUri { index: usize },
    #[error("model contains no scene")]
    NoScene,
    #[error("load was cancelled")]
    Cancelled,
    #[error("loader worker stopped without a result")]
    WorkerLost,
}
