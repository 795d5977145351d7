//! In-process key/value configuration provider.

use crate::error::{ConfigError, Result};
use crate::provider::{ProviderClient, ProviderClientConfig, ProviderFactory, WatchStreams};
use crate::tree::{ConfigTree, ConfigValue, KeyPath, PROVIDER_SEPARATOR, build_base_key};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

struct Watcher {
    client_id: usize,
    section_key: String,
    updates: mpsc::UnboundedSender<ConfigTree>,
    errors: mpsc::UnboundedSender<ConfigError>,
}

struct Store {
    values: BTreeMap<String, ConfigValue>,
    alive: bool,
    watchers: Vec<Watcher>,
}

impl Store {
    fn subtree(&self, section_key: &str) -> ConfigTree {
        let mut tree = ConfigTree::new();
        for (key, value) in self.values.range(section_key.to_string()..) {
            let Some(rest) = relative_to(key, section_key) else {
                if key.starts_with(section_key) {
                    continue;
                }
                break;
            };
            if rest.is_empty() {
                continue;
            }
            let path = KeyPath::from_segments(rest.split(PROVIDER_SEPARATOR));
            tree.insert_path(&path, value.clone());
        }
        tree
    }

    fn keys_under(&self, prefix: &str) -> Vec<String> {
        self.values
            .keys()
            .filter(|key| relative_to(key, prefix).is_some())
            .cloned()
            .collect()
    }

    /// Push the current contents of every section containing one of `changed`.
    fn notify(&mut self, changed: &[String]) {
        let mut dead = Vec::new();
        for (index, watcher) in self.watchers.iter().enumerate() {
            if !changed.iter().any(|key| relative_to(key, &watcher.section_key).is_some()) {
                continue;
            }
            let snapshot = self.subtree(&watcher.section_key);
            if watcher.updates.send(snapshot).is_err() {
                dead.push(index);
            }
        }
        for index in dead.into_iter().rev() {
            self.watchers.remove(index);
        }
    }
}

/// The part of `key` below `prefix`, if `key` is `prefix` itself or lies under it.
fn relative_to<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(key);
    }
    let rest = key.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix(PROVIDER_SEPARATOR)
    }
}

/// A key/value configuration provider held in memory.
///
/// Values are stored flat under fully qualified keys and keep their scalar types.
/// Every client created from the same `MemoryProvider` shares its store, so a
/// private client and a common client see each other's writes. Watches push the
/// current section contents immediately on subscription and again after every
/// write below the section.
///
/// # Examples
///
/// ```rust
/// use layered_config::provider::{MemoryProvider, ProviderClient};
///
/// # async fn example() -> layered_config::error::Result<()> {
/// let provider = MemoryProvider::new();
/// provider.set_value("edgex/v3/core-data/Writable/LogLevel", "INFO");
///
/// let client = provider.client("edgex/v3/core-data");
/// let keys = client.get_configuration_keys("Writable").await?;
/// assert_eq!(keys, vec!["edgex/v3/core-data/Writable/LogLevel".to_string()]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemoryProvider {
    store: Arc<Mutex<Store>>,
    next_client_id: Arc<AtomicUsize>,
}

impl MemoryProvider {
    /// Create an empty, reachable provider.
    pub fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(Store {
                values: BTreeMap::new(),
                alive: true,
                watchers: Vec::new(),
            })),
            next_client_id: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a client bound to `base_path`.
    pub fn client(&self, base_path: &str) -> MemoryClient {
        MemoryClient {
            id: self.next_client_id.fetch_add(1, Ordering::Relaxed),
            base_path: build_base_key(&[base_path]),
            store: Arc::clone(&self.store),
        }
    }

    /// Mark the provider reachable or unreachable.
    pub fn set_alive(&self, alive: bool) {
        self.store.lock().alive = alive;
    }

    /// Store a value at a fully qualified key and notify watchers.
    pub fn set_value(&self, full_key: &str, value: impl Into<ConfigValue>) {
        let key = build_base_key(&[full_key]);
        let mut store = self.store.lock();
        store.values.insert(key.clone(), value.into());
        store.notify(&[key]);
    }

    /// Store every leaf of `tree` under `base_path`, replacing existing values.
    pub fn set_tree(&self, base_path: &str, tree: &ConfigTree) {
        let mut store = self.store.lock();
        let changed = put_leaves(&mut store, &build_base_key(&[base_path]), tree, true);
        store.notify(&changed);
    }

    /// Remove a fully qualified key and notify watchers.
    pub fn remove_value(&self, full_key: &str) {
        let key = build_base_key(&[full_key]);
        let mut store = self.store.lock();
        if store.values.remove(&key).is_some() {
            store.notify(&[key]);
        }
    }

    /// The value stored at a fully qualified key.
    pub fn value(&self, full_key: &str) -> Option<ConfigValue> {
        self.store.lock().values.get(&build_base_key(&[full_key])).cloned()
    }

    /// Every stored key, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.store.lock().values.keys().cloned().collect()
    }

    /// Send a transport error to every watch under `section_key`.
    pub fn inject_watch_error(&self, section_key: &str, message: &str) {
        let section_key = build_base_key(&[section_key]);
        let store = self.store.lock();
        for watcher in store
            .watchers
            .iter()
            .filter(|w| relative_to(&w.section_key, &section_key).is_some())
        {
            let _ = watcher.errors.send(ConfigError::Provider(message.to_string()));
        }
    }

    /// Number of active watches.
    pub fn watcher_count(&self) -> usize {
        self.store.lock().watchers.len()
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderFactory for MemoryProvider {
    fn create_client(&self, config: ProviderClientConfig) -> Result<Arc<dyn ProviderClient>> {
        Ok(Arc::new(self.client(&config.base_path)))
    }
}

fn put_leaves(store: &mut Store, base_path: &str, tree: &ConfigTree, overwrite: bool) -> Vec<String> {
    let mut changed = Vec::new();
    for (path, value) in tree.leaves() {
        let key = build_base_key(&[base_path, &path.to_provider_key()]);
        if !overwrite && store.values.contains_key(&key) {
            continue;
        }
        store.values.insert(key.clone(), value.clone());
        changed.push(key);
    }
    changed
}

/// A [`ProviderClient`] over a [`MemoryProvider`] store.
pub struct MemoryClient {
    id: usize,
    base_path: String,
    store: Arc<Mutex<Store>>,
}

impl MemoryClient {
    /// The base path this client is bound to.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    fn check_alive(&self, store: &Store) -> Result<()> {
        if store.alive {
            Ok(())
        } else {
            Err(ConfigError::ProviderUnavailable(format!(
                "in-memory provider is down (base path {})",
                self.base_path
            )))
        }
    }
}

#[async_trait]
impl ProviderClient for MemoryClient {
    async fn is_alive(&self) -> bool {
        self.store.lock().alive
    }

    async fn get_configuration(&self) -> Result<ConfigTree> {
        let store = self.store.lock();
        self.check_alive(&store)?;
        Ok(store.subtree(&self.base_path))
    }

    async fn get_configuration_value_by_full_path(&self, full_path: &str) -> Result<Vec<u8>> {
        let store = self.store.lock();
        self.check_alive(&store)?;
        store
            .values
            .get(&build_base_key(&[full_path]))
            .map(|value| value.to_raw_string().into_bytes())
            .ok_or_else(|| ConfigError::Provider(format!("key '{}' not found", full_path)))
    }

    async fn get_configuration_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let store = self.store.lock();
        self.check_alive(&store)?;
        Ok(store.keys_under(&build_base_key(&[&self.base_path, prefix])))
    }

    async fn put_configuration_map(&self, tree: &ConfigTree, overwrite: bool) -> Result<()> {
        let mut store = self.store.lock();
        self.check_alive(&store)?;
        let changed = put_leaves(&mut store, &self.base_path, tree, overwrite);
        debug!(base_path = %self.base_path, keys = changed.len(), "Stored configuration");
        store.notify(&changed);
        Ok(())
    }

    async fn has_configuration(&self) -> Result<bool> {
        let store = self.store.lock();
        self.check_alive(&store)?;
        Ok(!store.keys_under(&self.base_path).is_empty())
    }

    async fn has_sub_configuration(&self, name: &str) -> Result<bool> {
        let store = self.store.lock();
        self.check_alive(&store)?;
        Ok(!store.keys_under(&build_base_key(&[&self.base_path, name])).is_empty())
    }

    async fn watch_for_changes(&self, section: &str) -> Result<WatchStreams> {
        let mut store = self.store.lock();
        self.check_alive(&store)?;

        let section_key = build_base_key(&[&self.base_path, section]);
        let (update_tx, updates) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();

        // Initial push, delivered whether or not anything changed.
        let _ = update_tx.send(store.subtree(&section_key));

        store.watchers.push(Watcher {
            client_id: self.id,
            section_key,
            updates: update_tx,
            errors: error_tx,
        });
        Ok(WatchStreams { updates, errors })
    }

    async fn stop_watching(&self) {
        self.store.lock().watchers.retain(|w| w.client_id != self.id);
    }
}
