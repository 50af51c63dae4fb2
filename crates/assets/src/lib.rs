//! Model loading: fetches a glTF description and its buffers, reports byte
//! progress, and produces a detached subtree ready to graft into a scene.
//!
//! Loads run on a worker thread. The owner polls [`AssetLoader`] once per
//! frame; every event is delivered on the polling thread, and each load
//! finishes with exactly one [`LoadEvent::Finished`].

mod error;
mod fetch;
mod import;
mod loader;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use error::{AssetLoadFailure, LoaderError};
pub use fetch::{FETCH_CHUNK_SIZE, Fetcher, FsFetcher, MemoryFetcher};
pub use import::LoadedModel;
pub use loader::{
    AssetLoader, LoadEvent, LoadProgress, LoadRequest, LoadResult, LoaderState, load_blocking,
};
