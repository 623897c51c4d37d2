//! Process-wide named locks
//!
//! Sub-resources of a load balancer are written by read-modify-write of the
//! parent, so every mutation holds the lock named after the parent for the
//! duration of the operation. The lock is released when the guard drops.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub const LOAD_BALANCER_KIND: &str = "azurerm_lb";
pub const BACKEND_ADDRESS_POOL_KIND: &str = "azurerm_lb_backend_address_pool";

type LockTable = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

fn table() -> &'static LockTable {
    static TABLE: OnceLock<LockTable> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock_for(key: &str) -> Arc<AsyncMutex<()>> {
    // a poisoned table still holds valid entries
    let mut table = table().lock().unwrap_or_else(|e| e.into_inner());
    table
        .entry(key.to_string())
        .or_insert_with(|| Arc::new(AsyncMutex::new(())))
        .clone()
}

/// Held while a named lock is taken
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        tracing::trace!("Unlocking {:?}", self.key);
    }
}

/// Waits for the lock on `name` within the namespace `kind`
pub async fn by_name(name: &str, kind: &str) -> LockGuard {
    by_id(&format!("{}.{}", kind, name)).await
}

/// Waits for the lock keyed by a full resource ID
pub async fn by_id(id: &str) -> LockGuard {
    tracing::trace!("Locking {:?}", id);
    let guard = lock_for(id).lock_owned().await;
    LockGuard {
        key: id.to_string(),
        _guard: guard,
    }
}
