//! Content-addressed blob table for file attachments

use crate::error::ValueError;
use crate::hash::ContentHash;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Suffix of blob entries inside zip containers
pub const XREF_SUFFIX: &str = ".xref";

/// Blobs keyed by the SHA-256 of their bytes
///
/// Identical attachments share one entry. Interior mutability lets encoders
/// add blobs through the shared [`EncodeContext`](super::EncodeContext).
#[derive(Debug, Default)]
pub struct XrefStore {
    blobs: Mutex<BTreeMap<ContentHash, Arc<[u8]>>>,
}

impl XrefStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes and return their address
    pub fn put(&self, bytes: Arc<[u8]>) -> ContentHash {
        let hash = ContentHash::compute(&bytes);
        self.blobs.lock().entry(hash).or_insert(bytes);
        hash
    }

    /// Store bytes read from a container under a claimed address
    ///
    /// # Errors
    /// Returns error if the bytes do not hash to `hash`
    pub fn insert_verified(&self, hash: ContentHash, bytes: Arc<[u8]>) -> Result<(), ValueError> {
        let actual = ContentHash::compute(&bytes);
        if actual != hash {
            return Err(ValueError::invalid(format!(
                "xref {} content hashes to {}",
                hash.short(),
                actual.short()
            )));
        }
        self.blobs.lock().insert(hash, bytes);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, hash: &ContentHash) -> Option<Arc<[u8]>> {
        self.blobs.lock().get(hash).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }

    /// All blobs, ordered by hash
    #[must_use]
    pub fn entries(&self) -> Vec<(ContentHash, Arc<[u8]>)> {
        self.blobs
            .lock()
            .iter()
            .map(|(h, b)| (*h, Arc::clone(b)))
            .collect()
    }

    /// Container entry name for a blob
    #[inline]
    #[must_use]
    pub fn entry_name(hash: &ContentHash) -> String {
        format!("{}{XREF_SUFFIX}", hash.to_hex())
    }

    /// Address encoded in a container entry name, if it is a blob entry
    #[must_use]
    pub fn parse_entry_name(name: &str) -> Option<ContentHash> {
        name.strip_suffix(XREF_SUFFIX)?.parse().ok()
    }
}
