// SPDX-License-Identifier: Apache-2.0 OR MIT

//! External collaborator traits: raw Ethernet I/O and
//! persistent storage are both owned by the embedding application, not this
//! crate — small `Send + Sync` trait objects wired in at construction rather
//! than a hardcoded backend.

use crate::error::PnetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Up,
    Down,
}

/// Raw Ethernet frame I/O. The embedding application owns the actual NIC
/// (raw socket, DPDK, whatever); this crate only ever hands it fully framed
/// Ethernet payloads to send and receives the same back.
pub trait LinkLayer: Send + Sync {
    fn send(&self, frame: Vec<u8>) -> Result<(), PnetError>;
    fn mac(&self) -> [u8; 6];
    fn link_status(&self) -> LinkStatus;
}

/// Durable key/value storage for the small blobs the stack needs to survive
/// a restart (station name, IP configuration). Every blob is framed with a
/// 4-byte `b"PNET"` magic and a 4-byte version so a foreign or
/// version-mismatched blob is rejected (falls back to defaults) rather than
/// misinterpreted.
pub trait PersistenceStore: Send + Sync {
    fn load(&self, key: &str) -> Option<Vec<u8>>;
    fn save(&self, key: &str, bytes: &[u8]);
}

const PERSISTENCE_MAGIC: [u8; 4] = *b"PNET";
const PERSISTENCE_VERSION: u32 = 1;

pub fn frame_blob(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(&PERSISTENCE_MAGIC);
    out.extend_from_slice(&PERSISTENCE_VERSION.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Strip and validate the magic/version header. Returns `None` on any
/// mismatch so the caller applies its own defaults instead of trusting
/// stale or foreign data.
pub fn unframe_blob(buf: &[u8]) -> Option<&[u8]> {
    if buf.len() < 8 || buf[0..4] != PERSISTENCE_MAGIC {
        return None;
    }
    let version = u32::from_be_bytes(buf[4..8].try_into().ok()?);
    if version != PERSISTENCE_VERSION {
        return None;
    }
    Some(&buf[8..])
}

/// In-memory [`PersistenceStore`] test double, for tests that want a real
/// save/load round trip without touching the filesystem.
#[derive(Default)]
pub struct InMemoryStore {
    entries: parking_lot::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceStore for InMemoryStore {
    fn load(&self, key: &str) -> Option<Vec<u8>> {
        let raw = self.entries.lock().get(key).cloned()?;
        unframe_blob(&raw).map(<[u8]>::to_vec)
    }

    fn save(&self, key: &str, bytes: &[u8]) {
        self.entries.lock().insert(key.to_string(), frame_blob(bytes));
    }
}

/// [`PersistenceStore`] backed by one file per key under a directory. One
/// bad or missing file only loses that key, not the whole store.
pub struct FileStore {
    directory: std::path::PathBuf,
}

impl FileStore {
    pub fn new(directory: impl Into<std::path::PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn path_for(&self, key: &str) -> std::path::PathBuf {
        self.directory.join(key)
    }
}

impl PersistenceStore for FileStore {
    fn load(&self, key: &str) -> Option<Vec<u8>> {
        let raw = std::fs::read(self.path_for(key)).ok()?;
        unframe_blob(&raw).map(<[u8]>::to_vec)
    }

    fn save(&self, key: &str, bytes: &[u8]) {
        if std::fs::create_dir_all(&self.directory).is_err() {
            log::warn!("[persistence] failed to create directory for key={key}");
            return;
        }
        if std::fs::write(self.path_for(key), frame_blob(bytes)).is_err() {
            log::warn!("[persistence] failed to save key={key}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_store_roundtrips() {
        let store = InMemoryStore::new();
        store.save("station_name", b"plc-cell-3");
        assert_eq!(store.load("station_name").as_deref(), Some(&b"plc-cell-3"[..]));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        assert!(unframe_blob(b"XXXX\x00\x00\x00\x01payload").is_none());
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut buf = frame_blob(b"data");
        buf[4..8].copy_from_slice(&999u32.to_be_bytes());
        assert!(unframe_blob(&buf).is_none());
    }

    #[test]
    fn missing_key_returns_none() {
        let store = InMemoryStore::new();
        assert!(store.load("absent").is_none());
    }

    #[test]
    fn file_store_roundtrips_through_a_real_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.save("ip_config", b"192.168.0.10/24");
        assert_eq!(
            store.load("ip_config").as_deref(),
            Some(&b"192.168.0.10/24"[..])
        );
    }

    #[test]
    fn file_store_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.load("never_saved").is_none());
    }

    #[test]
    fn file_store_rejects_foreign_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("corrupt"), b"not a pnet blob").unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.load("corrupt").is_none());
    }
}
