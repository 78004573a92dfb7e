use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

#[allow(unused_imports)]
use log::{debug, info, warn, error};

use crate::atlas::buffer::{AtlasBuffer, AtlasTexture};
use crate::atlas::decode::decode_rgba;
use crate::atlas::fetch::{ImageFetcher, SourceFetcher};
use crate::atlas::key::{ImageKey, ImageRequest};
use crate::atlas::loader::ImageLoader;
use crate::atlas::packer::ShelfPacker;
use crate::atlas::record::{AtlasRect, ImageRecord};
use crate::atlas::subscribers::{AtlasListener, Subscribers, SubscriptionId};
use crate::config::AtlasConfig;
use crate::error::{AtlasError, LoadError};
use crate::utils::timing::{ScopedTimer, TimingStats};

/// Rectangles of every packed image. Keys that are loading, failed or
/// unknown are absent.
pub type AtlasTable = Arc<HashMap<ImageKey, AtlasRect>>;

/// Counters for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtlasStats {
    pub requested: usize,
    pub loading: usize,
    pub pending: usize,
    pub ready: usize,
    pub failed: usize,
    pub flushes: u64,
    pub average_flush_ms: f64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug)]
struct AtlasState {
    loader: ImageLoader,
    packer: ShelfPacker,
    buffer: AtlasBuffer,
    table: AtlasTable,
    flush_timing: TimingStats,
    flushes: u64,
}

/// Owns the image records, the packer and the atlas raster, and tells every
/// subscribed consumer when the atlas changed.
///
/// Share one manager (through [`AtlasRegistry`](crate::atlas::AtlasRegistry))
/// between all consumers built from the same configuration, so remounting a
/// consumer neither downloads nor packs anything again.
pub struct AtlasManager {
    config: AtlasConfig,
    fetcher: Arc<dyn ImageFetcher>,
    runtime: Handle,
    state: Mutex<AtlasState>,
    subscribers: Mutex<Subscribers>,
    flushing: AtomicBool,
    flush_signal: Arc<Notify>,
    in_flight: watch::Sender<usize>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for AtlasManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtlasManager")
            .field("config", &self.config)
            .field("flushing", &self.flushing)
            .finish_non_exhaustive()
    }
}

impl AtlasManager {
    /// Must be called from within a tokio runtime; fetches are spawned on it.
    pub fn new(config: AtlasConfig, fetcher: Arc<dyn ImageFetcher>) -> Result<Arc<Self>, AtlasError> {
        config.validate()?;
        let runtime = Handle::try_current()?;

        let state = AtlasState {
            loader: ImageLoader::new(),
            packer: ShelfPacker::new(config.max_texture_size, config.max_canvas_width),
            buffer: AtlasBuffer::new(),
            table: Arc::new(HashMap::new()),
            flush_timing: TimingStats::new("Atlas flush"),
            flushes: 0,
        };
        let (in_flight, _) = watch::channel(0);

        let manager = Arc::new(Self {
            config,
            fetcher,
            runtime,
            state: Mutex::new(state),
            subscribers: Mutex::new(Subscribers::new()),
            flushing: AtomicBool::new(false),
            flush_signal: Arc::new(Notify::new()),
            in_flight,
            driver: Mutex::new(None),
        });

        if let Some(interval) = manager.config.frame_interval() {
            manager.spawn_driver(interval);
        }

        info!(
            "Created atlas manager (max texture size {}, max canvas width {})",
            manager.config.max_texture_size, manager.config.max_canvas_width
        );
        Ok(manager)
    }

    pub fn with_source_fetcher(config: AtlasConfig) -> Result<Arc<Self>, AtlasError> {
        Self::new(config, Arc::new(SourceFetcher::new()))
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    pub fn atlas(&self) -> AtlasTable {
        Arc::clone(&self.lock_state().table)
    }

    pub fn texture(&self) -> AtlasTexture {
        self.lock_state().buffer.snapshot()
    }

    pub fn record(&self, key: &ImageKey) -> Option<ImageRecord> {
        self.lock_state().loader.record(key)
    }

    /// Starts loading `request` unless its key is already known. Cheap to
    /// call every frame. Returns `true` when a fetch was issued.
    pub fn register_image(self: &Arc<Self>, request: ImageRequest) -> bool {
        if !self.lock_state().loader.request(&request.key) {
            return false;
        }

        debug!("Loading image {} from {}", request.key, request.source);
        let fetch = self.fetcher.fetch(&request.source);
        self.in_flight.send_modify(|count| *count += 1);

        let manager = Arc::downgrade(self);
        self.runtime.spawn(async move {
            // A panicking fetcher counts as a failed load
            let result = AssertUnwindSafe(load_image(fetch))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(LoadError::Task("image fetch panicked".to_string())));
            // A dropped manager has no one left to pack for
            if let Some(manager) = manager.upgrade() {
                manager.complete(request, result);
            }
        });
        true
    }

    fn complete(&self, request: ImageRequest, result: Result<image::RgbaImage, LoadError>) {
        let schedule = self
            .lock_state()
            .loader
            .complete(request.key, result, request.border);
        self.in_flight.send_modify(|count| *count = count.saturating_sub(1));

        if schedule {
            self.flush_signal.notify_one();
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn AtlasListener>) -> SubscriptionId {
        let id = self.lock_subscribers().add(listener);
        debug!("Atlas subscriber {:?} added", id);
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.lock_subscribers().remove(id);
        if removed {
            debug!("Atlas subscriber {:?} removed", id);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    pub fn is_flush_scheduled(&self) -> bool {
        self.lock_state().loader.is_flush_scheduled()
    }

    /// Runs the scheduled flush, if any. For hosts that drive flushing from
    /// their own frame callback.
    pub fn flush_if_scheduled(&self) -> bool {
        if self.is_flush_scheduled() {
            self.flush()
        } else {
            false
        }
    }

    /// Packs every pending image, then notifies subscribers in order.
    ///
    /// Returns `false` when nothing was packed, or when called from inside
    /// a notification; in that case pending images wait for the next cycle.
    pub fn flush(&self) -> bool {
        if self.flushing.swap(true, Ordering::AcqRel) {
            debug!("Flush requested while notifying subscribers, deferring");
            return false;
        }
        let _flushing = FlushGuard(&self.flushing);

        let packed = {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            let batch = state.loader.take_pending();
            if batch.is_empty() {
                return false;
            }

            let _timer = ScopedTimer::new(&mut state.flush_timing);
            let placements = state.packer.pack(batch, &mut state.buffer);
            let table = Arc::make_mut(&mut state.table);
            for placement in &placements {
                state.loader.mark_ready(&placement.key, placement.rect);
                table.insert(placement.key.clone(), placement.rect);
            }
            state.flushes += 1;
            placements.len()
        };

        let listeners = self.lock_subscribers().snapshot();
        info!("Packed {} images, notifying {} subscribers", packed, listeners.len());
        for listener in listeners {
            listener.notify();
        }

        // Completions that arrived while subscribers ran
        if self.is_flush_scheduled() {
            self.flush_signal.notify_one();
        }
        true
    }

    /// Resolves once no fetch is in flight.
    pub async fn wait_idle(&self) {
        let mut receiver = self.in_flight.subscribe();
        let _ = receiver.wait_for(|count| *count == 0).await;
    }

    /// Resolves when the next flush gets scheduled (or right away when a
    /// signal is already stored).
    pub async fn flush_requested(&self) {
        self.flush_signal.notified().await;
    }

    pub fn stats(&self) -> AtlasStats {
        let state = self.lock_state();
        let loader = &state.loader;
        AtlasStats {
            requested: loader.len(),
            loading: loader.count_where(|record| matches!(record, ImageRecord::Loading)),
            pending: loader.count_where(|record| matches!(record, ImageRecord::Pending { .. })),
            ready: loader.count_where(|record| matches!(record, ImageRecord::Ready(_))),
            failed: loader.count_where(|record| matches!(record, ImageRecord::Error)),
            flushes: state.flushes,
            average_flush_ms: state.flush_timing.average_ms(),
            width: state.buffer.width(),
            height: state.buffer.height(),
        }
    }

    /// Coalesces completions for one frame interval after each signal, then
    /// flushes.
    fn spawn_driver(self: &Arc<Self>, interval: Duration) {
        let manager = Arc::downgrade(self);
        let signal = Arc::clone(&self.flush_signal);
        let handle = self.runtime.spawn(async move {
            loop {
                signal.notified().await;
                tokio::time::sleep(interval).await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.flush_if_scheduled();
            }
        });
        *self.driver.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    fn lock_state(&self) -> MutexGuard<'_, AtlasState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AtlasManager {
    fn drop(&mut self) {
        let driver = self.driver.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = driver.take() {
            handle.abort();
        }
    }
}

struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn load_image(
    fetch: BoxFuture<'static, Result<Vec<u8>, LoadError>>,
) -> Result<image::RgbaImage, LoadError> {
    let bytes = fetch.await?;
    tokio::task::spawn_blocking(move || decode_rgba(&bytes))
        .await
        .map_err(|e| LoadError::Task(e.to_string()))?
}
