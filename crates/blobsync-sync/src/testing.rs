//! In-memory test doubles for the engine's ports

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use blobsync_core::domain::upload_target::RemotePrefix;
use blobsync_core::ports::network_state::{INetworkState, NetworkInterface};
use blobsync_core::ports::object_store::{
    IObjectStore, IObjectStoreFactory, ObjectInfo, ObjectReader,
};
use blobsync_core::ports::status::{IStatusObserver, StatusSnapshot};
use tokio::io::AsyncReadExt;

// ============================================================================
// MockObjectStore
// ============================================================================

/// Object store holding blobs in a map keyed by store name
#[derive(Default)]
pub struct MockObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    failing_puts: Mutex<HashSet<String>>,
    fail_exists: AtomicBool,
    put_delay: Mutex<Option<Duration>>,
    puts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: &str, content: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(name.to_string(), content.to_vec());
    }

    pub fn object(&self, name: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn fail_put_for(&self, name: &str) {
        self.failing_puts.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_exists(&self, fail: bool) {
        self.fail_exists.store(fail, Ordering::SeqCst);
    }

    pub fn set_put_delay(&self, delay: Duration) {
        *self.put_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait::async_trait]
impl IObjectStore for MockObjectStore {
    async fn list(&self, prefix: &RemotePrefix) -> Result<Vec<ObjectInfo>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name.starts_with(prefix.as_store_prefix()))
            .map(|(name, content)| ObjectInfo {
                name: name.clone(),
                size: Some(content.len() as u64),
            })
            .collect())
    }

    async fn exists(&self, prefix: &RemotePrefix, file_name: &str) -> Result<bool> {
        if self.fail_exists.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset");
        }
        let wanted = prefix.store_name_for(file_name);
        Ok(self.list(prefix).await?.iter().any(|o| o.name == wanted))
    }

    async fn put(
        &self,
        prefix: &RemotePrefix,
        file_name: &str,
        mut reader: ObjectReader,
        length: u64,
    ) -> Result<()> {
        let name = prefix.store_name_for(file_name);
        if self.failing_puts.lock().unwrap().contains(&name) {
            anyhow::bail!("Server error: injected failure for {name}");
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.put_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut content = Vec::new();
        reader.read_to_end(&mut content).await?;
        assert_eq!(content.len() as u64, length, "declared length mismatch");

        self.objects.lock().unwrap().insert(name, content);
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory that always hands out the same store
pub struct MockStoreFactory {
    store: Arc<MockObjectStore>,
}

impl MockStoreFactory {
    pub fn new(store: Arc<MockObjectStore>) -> Self {
        Self { store }
    }
}

impl IObjectStoreFactory for MockStoreFactory {
    fn open(&self, _container_name: &str, sas_url: &str) -> Result<Arc<dyn IObjectStore>> {
        if !sas_url.starts_with("https://") {
            anyhow::bail!("unsupported scheme");
        }
        Ok(self.store.clone())
    }
}

// ============================================================================
// MockNetworkState
// ============================================================================

/// Network state returning a fixed interface list, or an error
pub struct MockNetworkState {
    interfaces: Option<Vec<NetworkInterface>>,
}

impl MockNetworkState {
    pub fn new(interfaces: Vec<NetworkInterface>) -> Self {
        Self {
            interfaces: Some(interfaces),
        }
    }

    pub fn unavailable() -> Self {
        Self { interfaces: None }
    }

    pub fn offline() -> Self {
        Self::new(Vec::new())
    }

    pub fn wifi_only() -> Self {
        Self::new(vec![wifi()])
    }

    pub fn wifi_and_vpn() -> Self {
        Self::new(vec![
            wifi(),
            NetworkInterface {
                name: "wg0".into(),
                is_up: true,
                is_vpn: true,
                ..Default::default()
            },
        ])
    }
}

fn wifi() -> NetworkInterface {
    NetworkInterface {
        name: "wlan0".into(),
        is_up: true,
        is_wifi: true,
        is_not_vpn: true,
        ..Default::default()
    }
}

impl INetworkState for MockNetworkState {
    fn interfaces(&self) -> Result<Vec<NetworkInterface>> {
        self.interfaces
            .clone()
            .ok_or_else(|| anyhow::anyhow!("network service unavailable"))
    }
}

// ============================================================================
// RecordingObserver
// ============================================================================

/// Observer that keeps every status message it was shown
#[derive(Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<StatusSnapshot>>,
}

impl RecordingObserver {
    pub fn messages(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.last_sync_status.clone())
            .collect()
    }

    pub fn last(&self) -> Option<StatusSnapshot> {
        self.seen.lock().unwrap().last().cloned()
    }
}

impl IStatusObserver for RecordingObserver {
    fn on_status_changed(&self, snapshot: &StatusSnapshot) {
        self.seen.lock().unwrap().push(snapshot.clone());
    }
}
