//! Reverse IP→name store (spec §4.D): a `sled`-backed persistent table
//! fronted by an in-memory map, so lookups never wait on disk I/O and
//! writes are durable before `add` returns.

use std::net::IpAddr;
use std::sync::RwLock;
use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Sled(#[from] sled::Error),

    #[error("stored value for {ip} is not valid UTF-8")]
    InvalidEncoding { ip: String },
}

/// Maps canonical IP addresses to the DNS name they were last seen
/// resolving to.
///
/// Reads are served from the in-memory map under a shared lock; a miss
/// falls through to `sled` and promotes the value into memory. Writes take
/// the exclusive lock, write through to `sled` first, then update memory —
/// so a crash between the two never leaves memory ahead of disk.
pub struct Store {
    disk: sled::Db,
    memory: RwLock<HashMap<String, String>>,
}

impl Store {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        let disk = sled::open(path)?;
        Ok(Store {
            disk,
            memory: RwLock::new(HashMap::new()),
        })
    }

    /// Canonicalizes `ip` the way `IpAddr`'s `Display` does (matching
    /// Python's `ipaddress.ip_address(...).compressed`).
    pub fn canonicalize(ip: IpAddr) -> String {
        ip.to_string()
    }

    /// Records that `ip` resolves to `name`, logging a replacement notice
    /// if this overwrites a different prior value.
    pub fn add(&self, ip: IpAddr, name: &str) -> Result<(), StoreError> {
        let key = Self::canonicalize(ip);

        if let Some(previous) = self.disk.get(key.as_bytes())? {
            let previous = String::from_utf8_lossy(&previous);
            if previous != name {
                tracing::info!(ip = %key, old = %previous, new = %name, "replacing stored name");
            }
        }

        self.disk.insert(key.as_bytes(), name.as_bytes())?;
        self.disk.flush()?;

        self.memory
            .write()
            .expect("store memory lock poisoned")
            .insert(key, name.to_string());
        Ok(())
    }

    /// Returns the name last recorded for `ip`, if any.
    pub fn get(&self, ip: IpAddr) -> Result<Option<String>, StoreError> {
        let key = Self::canonicalize(ip);

        if let Some(name) = self.memory.read().expect("store memory lock poisoned").get(&key) {
            return Ok(Some(name.clone()));
        }

        let Some(raw) = self.disk.get(key.as_bytes())? else {
            return Ok(None);
        };
        let name = String::from_utf8(raw.to_vec()).map_err(|_| StoreError::InvalidEncoding {
            ip: key.clone(),
        })?;

        self.memory
            .write()
            .expect("store memory lock poisoned")
            .insert(key, name.clone());
        Ok(Some(name))
    }

    /// Flushes pending writes and drops the handle to the on-disk store.
    pub fn close(self) -> Result<(), StoreError> {
        self.disk.flush()?;
        Ok(())
    }
}
