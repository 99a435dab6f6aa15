//! Reference-counted, single-flight dataset cache.
//!
//! The cache is keyed by source URI rather than by per-frame image id,
//! so that multiple frames of one source document share a single
//! fetch and parse. Concurrent `load` calls for a URI whose load is
//! still in flight all observe the same underlying future.
//!
//! Entries are reference counted: each `load` increments the count,
//! each `unload` decrements it, and the dataset is evicted exactly
//! when the count reaches zero. `purge` bypasses the counts entirely.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use snafu::Snafu;
use tokio::sync::broadcast;

/// The outcome of fetching and parsing one source document.
pub struct LoadedDataSet<D> {
    pub data_set: D,
    /// the size of the fetched source document in bytes
    pub size_in_bytes: usize,
}

/// The fetch-and-parse collaborator driven by the cache.
pub trait DataSetLoader: Send + Sync + 'static {
    type DataSet: Send + Sync + 'static;

    /// Fetch the source document at `uri` and parse it.
    fn load(&self, uri: &str)
        -> BoxFuture<'static, Result<LoadedDataSet<Self::DataSet>, LoadError>>;
}

/// Why a dataset could not be loaded.
///
/// The error is shared between every caller awaiting the same load,
/// so variants carry plain messages.
#[derive(Debug, Clone, Snafu)]
#[non_exhaustive]
pub enum LoadError {
    /// The transport could not produce the document bytes.
    #[snafu(display("Failed to fetch `{uri}`: {message}"))]
    Transport { uri: String, message: String },

    /// The document bytes could not be parsed into a dataset.
    #[snafu(display("Failed to parse dataset from `{uri}`: {message}"))]
    DatasetParseFailure { uri: String, message: String },
}

/// Aggregate cache counters, included in every cache event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheInfo {
    pub cache_size_in_bytes: usize,
    pub number_of_data_sets_cached: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    Loaded,
    Unloaded,
}

/// Notification emitted when a dataset enters or leaves the cache.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    pub uri: String,
    pub action: CacheAction,
    pub info: CacheInfo,
}

struct CachedDataSet<D> {
    data_set: Arc<D>,
    size_in_bytes: usize,
    ref_count: usize,
}

type SharedLoad<D> = Shared<BoxFuture<'static, Result<Arc<D>, LoadError>>>;

struct InflightLoad<D> {
    future: SharedLoad<D>,
    ref_count: usize,
}

struct CacheTables<D> {
    loaded: HashMap<String, CachedDataSet<D>>,
    inflight: HashMap<String, InflightLoad<D>>,
    cache_size_in_bytes: usize,
}

impl<D> CacheTables<D> {
    fn info(&self) -> CacheInfo {
        CacheInfo {
            cache_size_in_bytes: self.cache_size_in_bytes,
            number_of_data_sets_cached: self.loaded.len(),
        }
    }
}

/// A single-flight dataset cache over an injected loader.
pub struct DataSetCache<L: DataSetLoader> {
    loader: Arc<L>,
    tables: Arc<Mutex<CacheTables<L::DataSet>>>,
    events: broadcast::Sender<CacheEvent>,
}

impl<L: DataSetLoader> DataSetCache<L> {
    pub fn new(loader: L) -> Self {
        let (events, _) = broadcast::channel(64);
        DataSetCache {
            loader: Arc::new(loader),
            tables: Arc::new(Mutex::new(CacheTables {
                loaded: HashMap::new(),
                inflight: HashMap::new(),
                cache_size_in_bytes: 0,
            })),
            events,
        }
    }

    fn tables(&self) -> MutexGuard<'_, CacheTables<L::DataSet>> {
        self.tables.lock().expect("cache lock poisoned")
    }

    /// Load the dataset at `uri`, incrementing its reference count.
    ///
    /// If the dataset is already loaded, the cached value is returned
    /// immediately. If a load is in flight, the same pending future
    /// is returned, so at most one fetch and parse runs per URI.
    /// On parse failure nothing is cached and every waiter observes
    /// the error.
    pub fn load(&self, uri: &str) -> BoxFuture<'static, Result<Arc<L::DataSet>, LoadError>> {
        let mut tables = self.tables();

        if let Some(entry) = tables.loaded.get_mut(uri) {
            entry.ref_count += 1;
            let data_set = Arc::clone(&entry.data_set);
            return async move { Ok(data_set) }.boxed();
        }

        if let Some(inflight) = tables.inflight.get_mut(uri) {
            inflight.ref_count += 1;
            return inflight.future.clone().boxed();
        }

        let future = {
            let loader = Arc::clone(&self.loader);
            let shared_tables = Arc::clone(&self.tables);
            let events = self.events.clone();
            let uri = uri.to_string();
            async move {
                let result = loader.load(&uri).await;

                let mut tables = shared_tables.lock().expect("cache lock poisoned");
                // the in-flight entry is removed on success and failure alike,
                // carrying the reference count accumulated while pending
                let pending_refs = tables
                    .inflight
                    .remove(&uri)
                    .map(|p| p.ref_count)
                    .unwrap_or(1);

                match result {
                    Ok(LoadedDataSet {
                        data_set,
                        size_in_bytes,
                    }) => {
                        let data_set = Arc::new(data_set);
                        tables.loaded.insert(
                            uri.clone(),
                            CachedDataSet {
                                data_set: Arc::clone(&data_set),
                                size_in_bytes,
                                ref_count: pending_refs,
                            },
                        );
                        tables.cache_size_in_bytes += size_in_bytes;
                        let info = tables.info();
                        drop(tables);
                        let _ = events.send(CacheEvent {
                            uri,
                            action: CacheAction::Loaded,
                            info,
                        });
                        Ok(data_set)
                    }
                    Err(e) => Err(e),
                }
            }
            .boxed()
            .shared()
        };

        tables.inflight.insert(
            uri.to_string(),
            InflightLoad {
                future: future.clone(),
                ref_count: 1,
            },
        );
        future.boxed()
    }

    /// Decrement the reference count of a loaded dataset,
    /// evicting it when the count reaches zero.
    pub fn unload(&self, uri: &str) {
        let mut tables = self.tables();

        let evict = match tables.loaded.get_mut(uri) {
            Some(entry) => {
                entry.ref_count -= 1;
                entry.ref_count == 0
            }
            None => false,
        };

        if evict {
            if let Some(entry) = tables.loaded.remove(uri) {
                tables.cache_size_in_bytes -= entry.size_in_bytes;
                let info = tables.info();
                drop(tables);
                let _ = self.events.send(CacheEvent {
                    uri: uri.to_string(),
                    action: CacheAction::Unloaded,
                    info,
                });
            }
        }
    }

    /// Whether the dataset at `uri` is fully loaded.
    pub fn is_loaded(&self, uri: &str) -> bool {
        self.tables().loaded.contains_key(uri)
    }

    /// Access an already-loaded dataset without touching
    /// its reference count.
    pub fn get(&self, uri: &str) -> Option<Arc<L::DataSet>> {
        self.tables()
            .loaded
            .get(uri)
            .map(|entry| Arc::clone(&entry.data_set))
    }

    /// Aggregate cache counters.
    pub fn info(&self) -> CacheInfo {
        self.tables().info()
    }

    /// Subscribe to cache-changed notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Unconditionally clear both the loaded and in-flight tables,
    /// bypassing reference counts. Full reset only.
    pub fn purge(&self) {
        let mut tables = self.tables();
        tables.loaded.clear();
        tables.inflight.clear();
        tables.cache_size_in_bytes = 0;
    }
}
