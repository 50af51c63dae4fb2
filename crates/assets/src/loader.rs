use crate::error::{AssetLoadFailure, LoaderError};
use crate::fetch::{Fetcher, FsFetcher};
use crate::import::{self, BufferSource, LoadedModel};
use orbitview_common::{LoadId, Transform};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;

/// What to load and where to put it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    /// Directory the description file and its relative buffers live in.
    pub base_dir: PathBuf,
    /// Description file name inside `base_dir` (`.gltf` or `.glb`).
    pub file_name: String,
    /// Transform given to the model's root node.
    pub placement: Transform,
}

impl LoadRequest {
    pub fn new(base_dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            file_name: file_name.into(),
            placement: Transform::default(),
        }
    }

    pub fn with_placement(mut self, placement: Transform) -> Self {
        self.placement = placement;
        self
    }

    pub fn description_path(&self) -> PathBuf {
        self.base_dir.join(&self.file_name)
    }

    /// Name for the model's root node: the model directory, else the file stem.
    pub fn model_name(&self) -> String {
        self.base_dir
            .file_name()
            .or_else(|| Path::new(&self.file_name).file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_owned())
    }
}

/// Bytes received so far. `total_bytes` is 0 while the total is unknown;
/// once non-zero it never changes for the rest of the load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded_bytes: u64,
    pub total_bytes: u64,
}

impl LoadProgress {
    /// Completed fraction in `0..=1`, or `None` while indeterminate.
    pub fn fraction(&self) -> Option<f32> {
        (self.total_bytes > 0).then(|| (self.loaded_bytes as f64 / self.total_bytes as f64).min(1.0) as f32)
    }
}

#[derive(Debug)]
pub enum LoadResult {
    Success(LoadedModel),
    Failure(AssetLoadFailure),
}

impl LoadResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[derive(Debug)]
pub enum LoadEvent {
    Progress(LoadProgress),
    /// Delivered exactly once per load, after every progress event.
    Finished(LoadResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    Loading,
    Loaded,
    Failed,
}

struct InFlight {
    id: LoadId,
    events: Receiver<LoadEvent>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

/// Loads one model at a time on a worker thread.
///
/// Results are handed over through [`AssetLoader::poll`], which the render
/// thread calls once per frame; nothing is delivered between polls.
pub struct AssetLoader {
    fetcher: Arc<dyn Fetcher>,
    state: LoaderState,
    in_flight: Option<InFlight>,
    last_progress: Option<LoadProgress>,
}

impl std::fmt::Debug for AssetLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLoader")
            .field("state", &self.state)
            .field("current", &self.current_load())
            .field("last_progress", &self.last_progress)
            .finish()
    }
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new(Arc::new(FsFetcher))
    }
}

impl AssetLoader {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            state: LoaderState::Idle,
            in_flight: None,
            last_progress: None,
        }
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn current_load(&self) -> Option<LoadId> {
        self.in_flight.as_ref().map(|f| f.id)
    }

    pub fn last_progress(&self) -> Option<LoadProgress> {
        self.last_progress
    }

    /// Start loading. Fails with [`LoaderError::LoadInProgress`] while a
    /// previous request is still running; that request is not affected.
    pub fn load(&mut self, request: LoadRequest) -> Result<LoadId, LoaderError> {
        if self.state == LoaderState::Loading {
            return Err(LoaderError::LoadInProgress);
        }

        let id = LoadId::new();
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let fetcher = Arc::clone(&self.fetcher);
        let worker_cancel = Arc::clone(&cancel);

        let worker = std::thread::Builder::new()
            .name(format!("asset-load-{}", id.short()))
            .spawn(move || {
                let span = tracing::info_span!("asset_load", id = %id.short());
                let _enter = span.enter();
                let progress_tx = tx.clone();
                let result = run_pipeline(fetcher.as_ref(), &request, &worker_cancel, &mut |p| {
                    let _ = progress_tx.send(LoadEvent::Progress(p));
                });
                let result = match result {
                    Ok(model) => LoadResult::Success(model),
                    Err(AssetLoadFailure::Cancelled) => {
                        tracing::debug!("load cancelled");
                        return;
                    }
                    Err(e) => LoadResult::Failure(e),
                };
                let _ = tx.send(LoadEvent::Finished(result));
            })?;

        tracing::info!(id = %id.short(), "load started");
        self.in_flight = Some(InFlight {
            id,
            events: rx,
            cancel,
            worker: Some(worker),
        });
        self.state = LoaderState::Loading;
        self.last_progress = None;
        Ok(id)
    }

    /// Drain events produced since the previous poll.
    pub fn poll(&mut self) -> Vec<LoadEvent> {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        let mut finished = false;
        loop {
            match in_flight.events.try_recv() {
                Ok(LoadEvent::Progress(p)) => {
                    self.last_progress = Some(p);
                    events.push(LoadEvent::Progress(p));
                }
                Ok(LoadEvent::Finished(result)) => {
                    self.state = if result.is_success() {
                        LoaderState::Loaded
                    } else {
                        LoaderState::Failed
                    };
                    match &result {
                        LoadResult::Success(model) => tracing::info!(
                            id = %in_flight.id.short(),
                            nodes = model.root.node_count(),
                            meshes = model.meshes.len(),
                            "load finished"
                        ),
                        LoadResult::Failure(e) => {
                            tracing::debug!(id = %in_flight.id.short(), error = %e, "load failed")
                        }
                    }
                    events.push(LoadEvent::Finished(result));
                    finished = true;
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::debug!(id = %in_flight.id.short(), "loader worker exited without a result");
                    self.state = LoaderState::Failed;
                    events.push(LoadEvent::Finished(LoadResult::Failure(
                        AssetLoadFailure::WorkerLost,
                    )));
                    finished = true;
                    break;
                }
            }
        }

        if finished {
            if let Some(mut done) = self.in_flight.take() {
                if let Some(worker) = done.worker.take() {
                    let _ = worker.join();
                }
            }
        }
        events
    }

    /// Abandon the running load. Its result, if any, is discarded.
    ///
    /// Returns without joining the worker: it may still finish the chunk it
    /// is reading before it notices the flag and exits. Nothing it produces
    /// after this call is ever delivered.
    pub fn cancel(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel.store(true, Ordering::Relaxed);
            tracing::info!(id = %in_flight.id.short(), "load cancelled");
            self.state = LoaderState::Idle;
            self.last_progress = None;
        }
    }
}

impl Drop for AssetLoader {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Run a load on the calling thread.
pub fn load_blocking(
    fetcher: &dyn Fetcher,
    request: &LoadRequest,
    mut on_progress: impl FnMut(LoadProgress),
) -> LoadResult {
    let cancel = AtomicBool::new(false);
    match run_pipeline(fetcher, request, &cancel, &mut on_progress) {
        Ok(model) => LoadResult::Success(model),
        Err(e) => LoadResult::Failure(e),
    }
}

struct ProgressTracker<'a, 's> {
    loaded: u64,
    total: u64,
    cancel: &'a AtomicBool,
    sink: &'s mut dyn FnMut(LoadProgress),
}

impl ProgressTracker<'_, '_> {
    fn report(&mut self) {
        let loaded = if self.total > 0 {
            self.loaded.min(self.total)
        } else {
            self.loaded
        };
        (self.sink)(LoadProgress {
            loaded_bytes: loaded,
            total_bytes: self.total,
        });
    }

    fn check_cancel(&self) -> Result<(), AssetLoadFailure> {
        if self.cancel.load(Ordering::Relaxed) {
            Err(AssetLoadFailure::Cancelled)
        } else {
            Ok(())
        }
    }

    fn fetch(&mut self, fetcher: &dyn Fetcher, path: &Path) -> Result<Vec<u8>, AssetLoadFailure> {
        self.check_cancel()?;
        tracing::debug!(path = %path.display(), "fetching");
        let result = fetcher.fetch(path, &mut |n| {
            if self.cancel.load(Ordering::Relaxed) {
                return ControlFlow::Break(());
            }
            self.loaded += n as u64;
            self.report();
            ControlFlow::Continue(())
        });
        result.map_err(|source| {
            if self.cancel.load(Ordering::Relaxed) {
                AssetLoadFailure::Cancelled
            } else {
                AssetLoadFailure::Fetch {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })
    }
}

fn run_pipeline(
    fetcher: &dyn Fetcher,
    request: &LoadRequest,
    cancel: &AtomicBool,
    on_progress: &mut dyn FnMut(LoadProgress),
) -> Result<LoadedModel, AssetLoadFailure> {
    let mut tracker = ProgressTracker {
        loaded: 0,
        total: 0,
        cancel,
        sink: on_progress,
    };

    let description = tracker.fetch(fetcher, &request.description_path())?;
    let gltf::Gltf { document, mut blob } =
        gltf::Gltf::from_slice(&description).map_err(|e| AssetLoadFailure::Parse(e.to_string()))?;
    drop(description);

    let plan = import::plan_buffers(&document, &mut blob, &request.base_dir)?;
    let external: Vec<&Path> = plan
        .iter()
        .filter_map(|s| match s {
            BufferSource::External(path) => Some(path.as_path()),
            BufferSource::Ready(_) => None,
        })
        .collect();
    let hinted: Option<u64> = external.iter().map(|p| fetcher.size_hint(p)).sum();
    if let Some(remaining) = hinted {
        tracker.total = tracker.loaded + remaining;
        tracker.report();
    }
    tracing::debug!(
        buffers = plan.len(),
        external = external.len(),
        total = tracker.total,
        "description parsed"
    );

    let mut buffers = Vec::with_capacity(plan.len());
    for source in plan {
        buffers.push(match source {
            BufferSource::Ready(bytes) => bytes,
            BufferSource::External(path) => tracker.fetch(fetcher, &path)?,
        });
    }
    import::check_buffer_lengths(&document, &buffers)?;
    tracker.check_cancel()?;

    let mut model = import::build_model(&document, &buffers, &request.model_name())?;
    model.root.node.transform = request.placement;
    let shadowed = model.root.enable_shadows_on_meshes();
    tracing::debug!(shadowed, "mesh shadows enabled");

    if tracker.total == 0 {
        tracker.total = tracker.loaded;
        tracker.report();
    }
    Ok(model)
}
