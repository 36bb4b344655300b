use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::ServerConfig;
use crate::coordinator::{CoordinatorHandle, spawn_coordinator};

pub type SharedIpCounts = Arc<Mutex<HashMap<IpAddr, usize>>>;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: CoordinatorHandle,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub ws_per_ip: SharedIpCounts,
}

impl AppState {
    /// Spawns the coordinator task, so this must run inside a tokio
    /// runtime.
    pub fn new(config: ServerConfig) -> Self {
        let (coordinator, _task) = spawn_coordinator();
        Self {
            coordinator,
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            ws_per_ip: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// RAII guard for the global WebSocket connection counter.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}

/// RAII guard for the per-IP connection counter. Acquisition fails once
/// an address holds `max_per_ip` connections.
pub struct IpConnectionGuard {
    ip: IpAddr,
    counts: SharedIpCounts,
}

impl IpConnectionGuard {
    pub fn try_acquire(ip: IpAddr, counts: SharedIpCounts, max_per_ip: usize) -> Option<Self> {
        {
            let mut map = counts.lock().unwrap();
            let entry = map.entry(ip).or_insert(0);
            if *entry >= max_per_ip {
                return None;
            }
            *entry += 1;
        }
        Some(Self { ip, counts })
    }
}

impl Drop for IpConnectionGuard {
    fn drop(&mut self) {
        let mut map = self.counts.lock().unwrap();
        if let Some(entry) = map.get_mut(&self.ip) {
            *entry -= 1;
            if *entry == 0 {
                map.remove(&self.ip);
            }
        }
    }
}
